//! The dual-region atomic backup mechanism.
//!
//! When enabled, the caller's buffer is split into two equal halves, each
//! holding a complete copy of every page. The backup flag selects which
//! half is authoritative. The three volatile fields (lock word, backup
//! flag, last-backup-time) are not duplicated: they live once, at a fixed
//! offset within half 0, and are read directly — outside the lock and
//! outside the copy-on-write patch table — regardless of which half is
//! currently active. This is what lets an attacher determine which half
//! to trust before it has decided anything else about the buffer.

use core::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::layout::PAGE_SIZE;
use crate::offset::Offset;

/// Byte offset within half 0's root page where the volatile trio starts.
pub const VOLATILE_START: usize = 8;
/// Byte offset within half 0's root page one past the volatile trio.
pub const VOLATILE_END: usize = 32;

const LOCK_WORD_OFFSET: usize = 8;
const BACKUP_FLAG_OFFSET: usize = 16;
const LAST_BACKUP_TIME_OFFSET: usize = 24;

const _: () = assert!(VOLATILE_START == LOCK_WORD_OFFSET);

/// No backup mode: the buffer is a single region.
pub const FLAG_DISABLED: i32 = -1;

/// Pointer to the lock word, always within half 0 regardless of which
/// half is active.
pub fn lock_word_ptr(buffer: &Buffer) -> *mut u64 {
    unsafe { buffer.half_base(0).add(LOCK_WORD_OFFSET) as *mut u64 }
}

/// Pointer to the backup flag, always within half 0.
pub fn backup_flag_ptr(buffer: &Buffer) -> *mut i32 {
    unsafe { buffer.half_base(0).add(BACKUP_FLAG_OFFSET) as *mut i32 }
}

/// Pointer to the last-backup-time field, always within half 0.
pub fn last_backup_time_ptr(buffer: &Buffer) -> *mut u64 {
    unsafe { buffer.half_base(0).add(LAST_BACKUP_TIME_OFFSET) as *mut u64 }
}

fn flag_atomic(buffer: &Buffer) -> &'static AtomicI32 {
    unsafe { AtomicI32::from_ptr(backup_flag_ptr(buffer)) }
}

fn last_backup_time_atomic(buffer: &Buffer) -> &'static AtomicU64 {
    unsafe { AtomicU64::from_ptr(last_backup_time_ptr(buffer)) }
}

/// Reads the backup flag with a relaxed atomic load, permitted without
/// holding the lock.
pub fn read_flag(buffer: &Buffer) -> i32 {
    flag_atomic(buffer).load(Ordering::Relaxed)
}

/// `true` if the flag marks backup mode as active (as opposed to the
/// disabled sentinel).
pub fn is_enabled(flag: i32) -> bool {
    flag != FLAG_DISABLED
}

/// Which half is currently authoritative for non-volatile content.
pub fn active_half(flag: i32) -> u8 {
    if flag == 1 { 1 } else { 0 }
}

/// Initializes backup mode on a freshly formatted buffer: both halves are
/// identical, so the flag simply starts at 0.
pub fn init_flag(buffer: &Buffer, enabled: bool) {
    flag_atomic(buffer).store(if enabled { 0 } else { FLAG_DISABLED }, Ordering::Relaxed);
}

/// Flips the flag, making the previously inactive half authoritative,
/// then copies the new-active half's non-volatile bytes onto the
/// now-inactive half (the one just-committed writes landed in). Called
/// under the lock at the end of a successful commit.
///
/// The flip comes first so a crash mid-copy leaves the new-inactive half
/// torn, never the half [`restore_backup`] would read from: the flag
/// already points at the just-committed, fully consistent half, and the
/// copy below is only there to keep the mirror current for the *next*
/// commit, not to certify this one.
pub fn perform_backup(buffer: &Buffer, host_time_ms: u64) -> Result<()> {
    let flag = read_flag(buffer);
    if flag == FLAG_DISABLED {
        return Ok(());
    }
    let old_active = active_half(flag);
    let new_active = 1 - old_active;
    flag_atomic(buffer).store(new_active as i32, Ordering::Release);
    copy_half_nonvolatile(buffer, new_active, old_active)?;
    last_backup_time_atomic(buffer).store(host_time_ms, Ordering::Relaxed);
    Ok(())
}

/// Copies the inactive (good) half's non-volatile bytes back over the
/// active (possibly torn) half, without flipping the flag. Called once,
/// immediately after a crash-steal acquire, before any other read.
pub fn restore_backup(buffer: &Buffer) -> Result<()> {
    let flag = read_flag(buffer);
    if flag == FLAG_DISABLED {
        return Err(Error::Ecorrupt);
    }
    let active = active_half(flag);
    let inactive = 1 - active;
    copy_half_nonvolatile(buffer, inactive, active)
}

fn copy_half_nonvolatile(buffer: &Buffer, src_half: u8, dst_half: u8) -> Result<()> {
    let page_count = buffer.page_count();
    for page_idx in 0..page_count {
        let offset: Offset = page_idx * PAGE_SIZE as u32;
        let src = buffer.page_ptr(src_half, offset)?;
        let dst = buffer.page_ptr(dst_half, offset)?;
        if page_idx == 0 {
            unsafe {
                core::ptr::copy_nonoverlapping(src, dst, VOLATILE_START);
                core::ptr::copy_nonoverlapping(
                    src.add(VOLATILE_END),
                    dst.add(VOLATILE_END),
                    PAGE_SIZE - VOLATILE_END,
                );
            }
        } else {
            unsafe { core::ptr::copy_nonoverlapping(src, dst, PAGE_SIZE) };
        }
    }
    Ok(())
}
