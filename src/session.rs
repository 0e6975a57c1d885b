//! A single attacher's view of the buffer: the lock ticket it currently
//! holds (if any), its open transaction's patch table, and the timeouts
//! it was configured with.

use smart_default::SmartDefault;

use crate::backup;
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::host::HostCallback;
use crate::layout::PAGE_SIZE;
use crate::lock::{self, Ticket};
use crate::offset::{NONE, Offset};
use crate::page::free::FreePage;
use crate::page::root::RootPage;
use crate::patch::PatchTable;

/// Configuration for [`Session::init`] and [`Session::attach`].
#[derive(Debug, Clone, Copy, SmartDefault)]
pub struct Options {
    #[default = true]
    pub backup: bool,
    #[default(Some(5_000))]
    pub wait_timeout_ms: Option<u64>,
    #[default = 2_000]
    pub hold_timeout_ms: u64,
}

/// An attached session. Holds no allocator, no thread, and no static
/// state: everything it needs is the buffer, the host callback, and its
/// own fields.
pub struct Session<'h> {
    buffer: Buffer,
    host: &'h dyn HostCallback,
    lock_ticket: Option<Ticket>,
    pub(crate) patches: PatchTable,
    wait_timeout_ms: Option<u64>,
    hold_timeout_ms: u64,
}

impl<'h> Session<'h> {
    /// Formats a fresh buffer: writes a new root page (and its mirror, if
    /// backup mode is on) and chains every remaining page onto the free
    /// list.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes for `len` bytes for as
    /// long as the returned session (and anything derived from it) is
    /// used, and must not be accessed by anything else concurrently.
    pub unsafe fn init(
        base: *mut u8,
        len: usize,
        host: &'h dyn HostCallback,
        opts: Options,
    ) -> Result<Session<'h>> {
        let buffer = unsafe { Buffer::new(base, len, opts.backup)? };
        let page_count = buffer.page_count();
        if page_count < 2 {
            return Err(Error::Einval);
        }

        format_half(&buffer, 0, page_count)?;
        backup::init_flag(&buffer, opts.backup);
        if opts.backup {
            format_half(&buffer, 1, page_count)?;
        }

        Ok(Session {
            buffer,
            host,
            lock_ticket: None,
            patches: PatchTable::new(),
            wait_timeout_ms: opts.wait_timeout_ms,
            hold_timeout_ms: opts.hold_timeout_ms,
        })
    }

    /// Attaches to an existing, already-formatted buffer without wiping
    /// it ("refresh-only init").
    ///
    /// # Safety
    /// Same obligations as [`Session::init`].
    pub unsafe fn attach(
        base: *mut u8,
        len: usize,
        host: &'h dyn HostCallback,
        opts: Options,
    ) -> Result<Session<'h>> {
        let buffer = unsafe { Buffer::new(base, len, opts.backup)? };
        let flag = backup::read_flag(&buffer);
        let active = backup::active_half(flag);
        let root_ptr = buffer.page_ptr(active, 0)?;
        let root: &RootPage = unsafe { &*(root_ptr as *const RootPage) };
        if !root.has_valid_stamp() {
            return Err(Error::Ecorrupt);
        }

        Ok(Session {
            buffer,
            host,
            lock_ticket: None,
            patches: PatchTable::new(),
            wait_timeout_ms: opts.wait_timeout_ms,
            hold_timeout_ms: opts.hold_timeout_ms,
        })
    }

    pub fn transaction_active(&self) -> bool {
        self.lock_ticket.is_some()
    }

    /// Acquires the lock (waiting through the host's park primitive if
    /// it's held), restoring from backup first if the prior holder
    /// crashed, and opens a transaction.
    pub fn transaction_begin(&mut self) -> Result<()> {
        if self.transaction_active() {
            return Err(Error::Ebusy);
        }
        let word = backup::lock_word_ptr(&self.buffer);
        let acquired = lock::acquire(word, self.host, self.wait_timeout_ms, self.hold_timeout_ms)?;
        if acquired.crash_detected {
            log::warn!("cozyfs: prior holder crashed while holding the lock, restoring backup");
            if let Err(e) = backup::restore_backup(&self.buffer) {
                log::error!("cozyfs: crash detected but backup mode is disabled");
                let _ = lock::release(word, acquired.ticket, self.host);
                return Err(e);
            }
        }
        self.lock_ticket = Some(acquired.ticket);
        Ok(())
    }

    /// Copies every patch back over the shared buffer, performs a backup
    /// rotation if enabled, and releases the lock.
    pub fn commit(&mut self) -> Result<()> {
        let ticket = self.lock_ticket.ok_or(Error::Eperm)?;
        let word = backup::lock_word_ptr(&self.buffer);
        let active = self.active_half();
        let result = self.patches.commit(&self.buffer, active, self.host);
        if result.is_ok() && backup::is_enabled(backup::read_flag(&self.buffer)) {
            let now = self.host.time_ms().unwrap_or(0);
            if let Err(e) = backup::perform_backup(&self.buffer, now) {
                log::error!("cozyfs: post-commit backup rotation failed");
                let _ = lock::release(word, ticket, self.host);
                self.lock_ticket = None;
                return Err(e);
            }
        }
        lock::release(word, ticket, self.host)?;
        self.lock_ticket = None;
        result
    }

    /// Discards every patch without copying it back, and releases the
    /// lock.
    pub fn rollback(&mut self) -> Result<()> {
        let ticket = self.lock_ticket.ok_or(Error::Eperm)?;
        let word = backup::lock_word_ptr(&self.buffer);
        let result = self.patches.rollback(self.host);
        lock::release(word, ticket, self.host)?;
        self.lock_ticket = None;
        result
    }

    /// Refreshes the held lock's lease, if a transaction is open. Called
    /// from the host's idle loop so a long-running transaction survives
    /// past one hold-timeout window.
    pub fn idle(&mut self) -> Result<()> {
        if let Some(mut ticket) = self.lock_ticket {
            let word = backup::lock_word_ptr(&self.buffer);
            lock::refresh(word, &mut ticket, self.host, self.hold_timeout_ms)?;
            self.lock_ticket = Some(ticket);
        }
        Ok(())
    }

    pub fn host(&self) -> &dyn HostCallback {
        self.host
    }

    fn active_half(&self) -> u8 {
        backup::active_half(backup::read_flag(&self.buffer))
    }

    pub(crate) fn page_ptr_for_read(&self, offset: Offset) -> Result<*mut u8> {
        if self.transaction_active() {
            if let Some(ptr) = self.patches.peek(offset) {
                return Ok(ptr);
            }
        }
        self.buffer.page_ptr(self.active_half(), offset)
    }

    pub(crate) fn page_ptr_for_write(&mut self, offset: Offset) -> Result<*mut u8> {
        let active = self.active_half();
        self.patches.patch_for(&self.buffer, active, offset, self.host)
    }

    /// Claims a page from the free list. Fails with `ENOMEM` once the
    /// free list is exhausted: buffers never grow past their attached
    /// size.
    pub fn alloc_page(&mut self) -> Result<Offset> {
        let offset = {
            let root: &RootPage = crate::txn::resolve(self, 0)?;
            root.free_list_head
        };
        if offset == NONE {
            return Err(Error::Enomem);
        }
        let next = {
            let free: &FreePage = crate::txn::resolve(self, offset)?;
            free.header.next
        };
        let root: &mut RootPage = crate::txn::resolve_mut(self, 0)?;
        root.free_list_head = next;
        root.inuse_pages += 1;
        Ok(offset)
    }

    /// Returns a page to the free list.
    pub fn free_page(&mut self, offset: Offset) -> Result<()> {
        let old_head = {
            let root: &RootPage = crate::txn::resolve(self, 0)?;
            root.free_list_head
        };
        {
            let page: &mut FreePage = crate::txn::resolve_mut(self, offset)?;
            *page = FreePage::new(old_head);
        }
        let root: &mut RootPage = crate::txn::resolve_mut(self, 0)?;
        root.free_list_head = offset;
        root.inuse_pages -= 1;
        Ok(())
    }
}

fn format_half(buffer: &Buffer, half: u8, page_count: u32) -> Result<()> {
    let root_ptr = buffer.page_ptr(half, 0)?;
    let mut root = RootPage::default();
    root.total_pages = page_count;
    root.inuse_pages = 1;
    root.free_list_head = if page_count > 1 {
        PAGE_SIZE as u32
    } else {
        NONE
    };
    unsafe { core::ptr::write(root_ptr as *mut RootPage, root) };

    for idx in 1..page_count {
        let offset = idx * PAGE_SIZE as u32;
        let next = if idx + 1 < page_count {
            (idx + 1) * PAGE_SIZE as u32
        } else {
            NONE
        };
        let page = FreePage::new(next);
        let ptr = buffer.page_ptr(half, offset)?;
        unsafe { core::ptr::write(ptr as *mut FreePage, page) };
    }
    Ok(())
}
