//! The timeout-based mutual-exclusion protocol over the root page's lock
//! word.
//!
//! The lock word is a single `u64`: zero means free, any other value is a
//! ticket — a future timestamp (milliseconds) at which the holder's lease
//! expires. Acquisition is a compare-exchange loop parking on the host's
//! wait primitive between attempts, grounded the same way
//! `SpinMutex::lock`'s `compare_exchange`/`spin_loop` loop is, generalized
//! from a spin loop to a host-mediated park/wake loop since this lock is
//! held across process boundaries rather than just across threads.

use core::sync::atomic::{AtomicU64, Ordering, fence};

use crate::error::{Error, Result};
use crate::host::HostCallback;

/// The timestamp value a successful acquirer stored into the lock word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Outcome of a successful [`acquire`].
pub struct Acquired {
    pub ticket: Ticket,
    /// Set when the prior lock value was non-zero: the previous holder
    /// never issued the release store we'd otherwise have observed, so
    /// the buffer must be treated as possibly torn.
    pub crash_detected: bool,
}

/// Returns a `'static`-lifetime-free atomic view over the lock word at
/// `word`.
///
/// SAFETY: `word` must point at a live `u64` for the duration of the
/// returned reference and must not be concurrently accessed through a
/// non-atomic read or write.
pub unsafe fn atomic_view(word: *mut u64) -> &'static AtomicU64 {
    unsafe { AtomicU64::from_ptr(word) }
}

/// Attempts to acquire the lock at `word`, waiting through the host's
/// park primitive between attempts.
///
/// `wait_timeout_ms` bounds the whole call (`None` waits forever);
/// `hold_timeout_ms` is the lease duration granted on success, refreshed
/// periodically by the caller's idle callback via [`refresh`].
pub fn acquire(
    word: *mut u64,
    host: &dyn HostCallback,
    wait_timeout_ms: Option<u64>,
    hold_timeout_ms: u64,
) -> Result<Acquired> {
    let atomic = unsafe { atomic_view(word) };
    let start = host.time_ms()?;
    loop {
        let now = host.time_ms()?;
        let observed = atomic.load(Ordering::Relaxed);
        if observed < now {
            let lease = now + hold_timeout_ms;
            match atomic.compare_exchange(observed, lease, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => {
                    let crash_detected = observed != 0;
                    if crash_detected {
                        fence(Ordering::SeqCst);
                    }
                    return Ok(Acquired {
                        ticket: Ticket(lease),
                        crash_detected,
                    });
                }
                Err(_) => continue,
            }
        }
        if let Some(limit) = wait_timeout_ms {
            if now.saturating_sub(start) >= limit {
                return Err(Error::Etimedout);
            }
        }
        let remaining = observed.saturating_sub(now);
        host.wait(word as usize, observed, Some(remaining))?;
    }
}

/// Releases a held lock, restoring the word to zero (free) if our ticket
/// is still current, then wakes any parked waiters.
///
/// A no-op CAS mismatch (our lease already expired and was stolen) is not
/// an error: the lock is already in someone else's hands.
pub fn release(word: *mut u64, ticket: Ticket, host: &dyn HostCallback) -> Result<()> {
    let atomic = unsafe { atomic_view(word) };
    let _ = atomic.compare_exchange(ticket.value(), 0, Ordering::Release, Ordering::Relaxed);
    host.wake(word as usize)
}

/// Extends a held lock's lease. Fails with [`Error::Etimedout`] if the
/// ticket is no longer current — the caller's lease expired and the lock
/// was stolen out from under it.
pub fn refresh(
    word: *mut u64,
    ticket: &mut Ticket,
    host: &dyn HostCallback,
    hold_timeout_ms: u64,
) -> Result<()> {
    let atomic = unsafe { atomic_view(word) };
    let now = host.time_ms()?;
    let lease = now + hold_timeout_ms;
    match atomic.compare_exchange(ticket.value(), lease, Ordering::AcqRel, Ordering::Relaxed) {
        Ok(_) => {
            ticket.0 = lease;
            Ok(())
        }
        Err(_) => Err(Error::Etimedout),
    }
}

/// True if, as of `now`, the lock word encodes a live (unexpired) holder.
pub fn is_held(word: *const u64, now: u64) -> bool {
    let atomic = unsafe { AtomicU64::from_ptr(word as *mut u64) };
    atomic.load(Ordering::Relaxed) >= now
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::host::testing::{FakeClock, StdHostCallback};

    #[test]
    fn acquire_then_release_round_trips() {
        let mut word: u64 = 0;
        let clock = FakeClock::new(1_000);
        let host = StdHostCallback::with_clock(clock.clone());
        let acquired = acquire(&mut word, &host, Some(100), 50).unwrap();
        assert!(!acquired.crash_detected);
        assert!(word > 0);
        release(&mut word, acquired.ticket, &host).unwrap();
        assert_eq!(word, 0);
    }

    #[test]
    fn stale_lease_is_reported_as_crash() {
        let mut word: u64 = 500; // expired relative to clock below
        let clock = FakeClock::new(1_000);
        let host = StdHostCallback::with_clock(clock.clone());
        let acquired = acquire(&mut word, &host, Some(100), 50).unwrap();
        assert!(acquired.crash_detected);
    }

    #[test]
    fn refresh_fails_once_ticket_is_stale() {
        let mut word: u64 = 0;
        let clock = FakeClock::new(1_000);
        let host = StdHostCallback::with_clock(clock.clone());
        let acquired = acquire(&mut word, &host, Some(100), 50).unwrap();
        let mut ticket = acquired.ticket;
        word = 1; // someone else stole it underneath us
        assert_eq!(
            refresh(&mut word, &mut ticket, &host, 50).unwrap_err(),
            Error::Etimedout
        );
    }
}
