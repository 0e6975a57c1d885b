//! The copy-on-write patch table: a session's private, host-allocated
//! shadow copies of pages it has mutated inside an open transaction.
//!
//! A transaction never mutates the shared buffer directly. The first
//! write to a given page allocates a page-sized scratch buffer from the
//! host, copies the original page into it, and records the mapping here;
//! every subsequent access to that page within the transaction is
//! redirected to the patch. Commit copies every patch back over its
//! original offset under the lock and frees the scratch pages; rollback
//! frees them without copying.

use heapless::Vec;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::host::HostCallback;
use crate::layout::{PATCH_TABLE_CAPACITY, PAGE_SIZE};
use crate::offset::Offset;

#[derive(Clone, Copy)]
struct PatchEntry {
    original_offset: Offset,
    ptr: *mut u8,
}

/// Per-session table of in-flight page patches. Fixed capacity, matching
/// the bounded-resource design used throughout the rest of the engine
/// (the handle table, the path-component list).
pub struct PatchTable {
    entries: Vec<PatchEntry, PATCH_TABLE_CAPACITY>,
}

impl PatchTable {
    pub fn new() -> PatchTable {
        PatchTable { entries: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, original_offset: Offset) -> Option<*mut u8> {
        self.entries
            .iter()
            .find(|entry| entry.original_offset == original_offset)
            .map(|entry| entry.ptr)
    }

    /// Read-only lookup of an existing patch, without allocating one.
    pub(crate) fn peek(&self, original_offset: Offset) -> Option<*mut u8> {
        self.find(original_offset)
    }

    /// Returns the patch for `original_offset`, allocating and seeding one
    /// from the buffer's active half if none exists yet.
    pub fn patch_for(
        &mut self,
        buffer: &Buffer,
        active_half: u8,
        original_offset: Offset,
        host: &dyn HostCallback,
    ) -> Result<*mut u8> {
        if let Some(ptr) = self.find(original_offset) {
            return Ok(ptr);
        }
        if self.entries.is_full() {
            return Err(Error::Enomem);
        }
        let src = buffer.page_ptr(active_half, original_offset)?;
        let dst = host.malloc(PAGE_SIZE)?;
        unsafe {
            core::ptr::copy_nonoverlapping(src, dst, PAGE_SIZE);
        }
        self.entries
            .push(PatchEntry {
                original_offset,
                ptr: dst,
            })
            .map_err(|_| Error::Enomem)?;
        Ok(dst)
    }

    /// Copies every patch back over its original offset in `buffer` and
    /// frees the host scratch pages. Called with the lock held.
    pub fn commit(&mut self, buffer: &Buffer, active_half: u8, host: &dyn HostCallback) -> Result<()> {
        for entry in self.entries.iter() {
            let dst = buffer.page_ptr(active_half, entry.original_offset)?;
            unsafe {
                core::ptr::copy_nonoverlapping(entry.ptr, dst, PAGE_SIZE);
            }
        }
        self.free_all(host)
    }

    /// Discards every patch without copying it back.
    pub fn rollback(&mut self, host: &dyn HostCallback) -> Result<()> {
        self.free_all(host)
    }

    fn free_all(&mut self, host: &dyn HostCallback) -> Result<()> {
        let mut first_err = None;
        for entry in self.entries.iter() {
            if let Err(e) = host.free(entry.ptr, PAGE_SIZE) {
                first_err.get_or_insert(e);
            }
        }
        self.entries.clear();
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for PatchTable {
    fn default() -> PatchTable {
        PatchTable::new()
    }
}
