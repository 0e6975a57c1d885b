//! The callback surface a host program provides so the engine never
//! assumes an allocator, a clock, or a thread-parking primitive of its
//! own.
//!
//! The wire shape is a single dispatch function taking a [`HostOp`]
//! discriminant, mirroring an embedded C host's usual single
//! function-pointer callback table. [`HostCallback`] is the ergonomic
//! Rust-facing trait the rest of the crate actually calls through;
//! [`RawHostFn`] adapts a bare `extern "C"` dispatch function to it for
//! hosts that only want to hand over one pointer.

use crate::error::{Error, Result};

/// Discriminant for the single-function host dispatch shape.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Malloc = 0,
    Free = 1,
    Wait = 2,
    Wake = 3,
    Sync = 4,
    Time = 5,
}

/// Raw ABI signature a host's single dispatch function implements.
///
/// Arguments are reused across operations: `a` is a size (Malloc), an
/// address (Free, Wait, Wake), or unused (Sync, Time); `b` is an observed
/// value (Wait) or unused otherwise; `c` is a timeout in milliseconds
/// (Wait, `-1` for infinite) or unused otherwise. Return value is an
/// address (Malloc; `0` on failure), a millisecond timestamp (Time), or
/// `0`/negative-errno status for everything else.
pub type RawDispatchFn = extern "C" fn(op: HostOp, a: i64, b: i64, c: i64) -> i64;

/// Host-provided primitives the engine calls through for everything it
/// cannot do itself in a `no_std`, allocator-free context.
pub trait HostCallback {
    /// Allocates a page-sized, page-aligned scratch buffer for a patch
    /// page. Returns its address.
    fn malloc(&self, size: usize) -> Result<*mut u8>;
    /// Frees a buffer previously returned by `malloc`.
    fn free(&self, ptr: *mut u8, size: usize) -> Result<()>;
    /// Parks the caller while the word at `addr` still equals `observed`,
    /// for at most `timeout_ms` (`None` is infinite).
    fn wait(&self, addr: usize, observed: u64, timeout_ms: Option<u64>) -> Result<()>;
    /// Wakes every waiter parked on the word at `addr`.
    fn wake(&self, addr: usize) -> Result<()>;
    /// Flushes the buffer to durable storage, if the host backs it with
    /// any (a no-op for purely in-memory hosts).
    fn sync(&self) -> Result<()>;
    /// Current time in milliseconds, from whatever clock the host
    /// chooses; only required to be monotonic and consistent across
    /// attachers sharing the buffer.
    fn time_ms(&self) -> Result<u64>;
}

/// Adapts a bare [`RawDispatchFn`] pointer to [`HostCallback`], for hosts
/// that hand the engine a single function pointer rather than linking
/// against it directly.
pub struct RawHostFn(pub RawDispatchFn);

impl HostCallback for RawHostFn {
    fn malloc(&self, size: usize) -> Result<*mut u8> {
        let addr = (self.0)(HostOp::Malloc, size as i64, 0, 0);
        if addr == 0 {
            return Err(Error::Enomem);
        }
        Ok(addr as usize as *mut u8)
    }

    fn free(&self, ptr: *mut u8, size: usize) -> Result<()> {
        let status = (self.0)(HostOp::Free, ptr as usize as i64, size as i64, 0);
        if status != 0 {
            return Err(Error::Esysfree);
        }
        Ok(())
    }

    fn wait(&self, addr: usize, observed: u64, timeout_ms: Option<u64>) -> Result<()> {
        let timeout = timeout_ms.map(|t| t as i64).unwrap_or(-1);
        let status = (self.0)(HostOp::Wait, addr as i64, observed as i64, timeout);
        if status != 0 {
            return Err(Error::Esyswait);
        }
        Ok(())
    }

    fn wake(&self, addr: usize) -> Result<()> {
        let status = (self.0)(HostOp::Wake, addr as i64, 0, 0);
        if status != 0 {
            return Err(Error::Esyswake);
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let status = (self.0)(HostOp::Sync, 0, 0, 0);
        if status != 0 {
            return Err(Error::Esyssync);
        }
        Ok(())
    }

    fn time_ms(&self) -> Result<u64> {
        let now = (self.0)(HostOp::Time, 0, 0, 0);
        if now < 0 {
            return Err(Error::Esystime);
        }
        Ok(now as u64)
    }
}

/// `std`-backed convenience implementation used by the test suite and by
/// host programs that are not themselves embedded.
#[cfg(feature = "std")]
pub mod testing {
    use super::*;
    use std::alloc::{Layout, alloc, dealloc};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::{SystemTime, UNIX_EPOCH};

    /// A clock that can be advanced manually, so lock-timeout and
    /// crash-recovery tests don't depend on wall-clock timing.
    #[derive(Clone)]
    pub struct FakeClock(Arc<Mutex<u64>>);

    impl FakeClock {
        pub fn new(start_ms: u64) -> FakeClock {
            FakeClock(Arc::new(Mutex::new(start_ms)))
        }

        pub fn advance(&self, ms: u64) {
            let mut guard = self.0.lock().unwrap();
            *guard += ms;
        }

        pub fn now(&self) -> u64 {
            *self.0.lock().unwrap()
        }
    }

    /// Host callback implementation backed by `std`, with either the
    /// system clock or a [`FakeClock`].
    pub struct StdHostCallback {
        clock: Option<FakeClock>,
        parked: Arc<(Mutex<()>, Condvar)>,
    }

    impl StdHostCallback {
        pub fn new() -> StdHostCallback {
            StdHostCallback {
                clock: None,
                parked: Arc::new((Mutex::new(()), Condvar::new())),
            }
        }

        pub fn with_clock(clock: FakeClock) -> StdHostCallback {
            StdHostCallback {
                clock: Some(clock),
                parked: Arc::new((Mutex::new(()), Condvar::new())),
            }
        }
    }

    impl Default for StdHostCallback {
        fn default() -> StdHostCallback {
            StdHostCallback::new()
        }
    }

    impl HostCallback for StdHostCallback {
        fn malloc(&self, size: usize) -> Result<*mut u8> {
            let layout = Layout::from_size_align(size, 8).map_err(|_| Error::Einval)?;
            let ptr = unsafe { alloc(layout) };
            if ptr.is_null() {
                return Err(Error::Enomem);
            }
            Ok(ptr)
        }

        fn free(&self, ptr: *mut u8, size: usize) -> Result<()> {
            let layout = Layout::from_size_align(size, 8).map_err(|_| Error::Einval)?;
            unsafe { dealloc(ptr, layout) };
            Ok(())
        }

        fn wait(&self, _addr: usize, _observed: u64, timeout_ms: Option<u64>) -> Result<()> {
            let (lock, cvar) = &*self.parked;
            let guard = lock.lock().unwrap();
            let timeout = timeout_ms.unwrap_or(5).min(5);
            let _ = cvar
                .wait_timeout(guard, std::time::Duration::from_millis(timeout))
                .unwrap();
            Ok(())
        }

        fn wake(&self, _addr: usize) -> Result<()> {
            let (_lock, cvar) = &*self.parked;
            cvar.notify_all();
            Ok(())
        }

        fn sync(&self) -> Result<()> {
            Ok(())
        }

        fn time_ms(&self) -> Result<u64> {
            match &self.clock {
                Some(clock) => Ok(clock.now()),
                None => {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_err(|_| Error::Esystime)?;
                    Ok(now.as_millis() as u64)
                }
            }
        }
    }
}
