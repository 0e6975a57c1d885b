//! Generic page access through the copy-on-write indirection.
//!
//! Every structural operation reads and writes pages exclusively through
//! [`resolve`] and [`resolve_mut`] rather than ever touching the buffer
//! directly, so a transaction's writes land in patch pages until commit
//! copies them back over the shared buffer under the lock.

use bytemuck::Pod;

use crate::error::{Error, Result};
use crate::layout::PAGE_SIZE;
use crate::offset::Offset;
use crate::session::Session;

/// Read-only view of the page at `offset`, reinterpreted as `T`.
///
/// Inside a transaction this is redirected to the patch for `offset` if
/// one exists; outside a transaction it always reads the shared buffer's
/// active half directly.
pub fn resolve<'s, T: Pod>(session: &'s Session, offset: Offset) -> Result<&'s T> {
    debug_assert_eq!(core::mem::size_of::<T>(), PAGE_SIZE);
    let ptr = session.page_ptr_for_read(offset)?;
    Ok(unsafe { &*(ptr as *const T) })
}

/// Mutable view of the page at `offset`, reinterpreted as `T`.
///
/// Requires an open transaction: the first call for a given `offset`
/// allocates and seeds a patch page, and every subsequent call within the
/// same transaction returns the same patch.
pub fn resolve_mut<'s, T: Pod>(session: &'s mut Session, offset: Offset) -> Result<&'s mut T> {
    debug_assert_eq!(core::mem::size_of::<T>(), PAGE_SIZE);
    if !session.transaction_active() {
        return Err(Error::Eperm);
    }
    let ptr = session.page_ptr_for_write(offset)?;
    Ok(unsafe { &mut *(ptr as *mut T) })
}

/// Read-only view of a sub-page record (an `Inode`, `Link`, `Handle`, or
/// `User`) at an exact byte offset, not necessarily page-aligned.
pub fn resolve_sub<'s, T: Pod>(session: &'s Session, byte_offset: Offset) -> Result<&'s T> {
    let page_base = byte_offset - (byte_offset % PAGE_SIZE as u32);
    let within = (byte_offset - page_base) as usize;
    let page_ptr = session.page_ptr_for_read(page_base)?;
    Ok(unsafe { &*(page_ptr.add(within) as *const T) })
}

/// Mutable view of a sub-page record at an exact byte offset. Requires an
/// open transaction, same as [`resolve_mut`].
pub fn resolve_sub_mut<'s, T: Pod>(session: &'s mut Session, byte_offset: Offset) -> Result<&'s mut T> {
    if !session.transaction_active() {
        return Err(Error::Eperm);
    }
    let page_base = byte_offset - (byte_offset % PAGE_SIZE as u32);
    let within = (byte_offset - page_base) as usize;
    let page_ptr = session.page_ptr_for_write(page_base)?;
    Ok(unsafe { &mut *(page_ptr.add(within) as *mut T) })
}
