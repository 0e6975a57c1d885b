//! The open-file-descriptor table: the root page's inline handle array,
//! overflowing into chained handle-overflow pages, each slot guarded by a
//! generation counter packed into the descriptor so a closed-then-reused
//! slot rejects a stale `Fd`.

use crate::entity::{self, InodeRef};
use crate::error::{Error, Result};
use crate::layout::HANDLES_PER_OVERFLOW_PAGE;
use crate::offset::{NONE, Offset};
use crate::page::handle::Handle;
use crate::page::handle_overflow::HandleOverflowPage;
use crate::page::inode::Inode;
use crate::page::root::RootPage;
use crate::session::Session;
use crate::txn;

/// A packed, generation-guarded file descriptor: the upper 16 bits are
/// the slot's generation at the time it was opened, the lower 16 the
/// slot index (into the inline array, then into the overflow chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fd(u32);

impl Fd {
    fn pack(generation: u16, index: u32) -> Fd {
        Fd(((generation as u32) << 16) | (index & 0xffff))
    }

    fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    fn index(self) -> u32 {
        self.0 & 0xffff
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Fd {
        Fd(raw)
    }
}

enum SlotAddr {
    Inline(u32),
    Overflow { page: Offset, slot: u32 },
}

fn slot_addr(root: &RootPage, global_index: u32) -> SlotAddr {
    let inline_cap = root.handles.len() as u32;
    if global_index < inline_cap {
        SlotAddr::Inline(global_index)
    } else {
        let rest = global_index - inline_cap;
        let page_idx = rest / HANDLES_PER_OVERFLOW_PAGE as u32;
        let slot = rest % HANDLES_PER_OVERFLOW_PAGE as u32;
        SlotAddr::Overflow {
            page: page_idx,
            slot,
        }
    }
}

/// Walks the overflow chain to the `nth` page (0-based), allocating and
/// chaining fresh pages as needed.
fn overflow_page_at(session: &mut Session, nth: u32) -> Result<Offset> {
    let mut head = {
        let root: &RootPage = txn::resolve(session, 0)?;
        root.handle_overflow_head
    };
    let mut prev: Option<Offset> = None;
    let mut current = head;
    for _ in 0..nth {
        if current == NONE {
            let new_page = session.alloc_page()?;
            let page: &mut HandleOverflowPage = txn::resolve_mut(session, new_page)?;
            *page = HandleOverflowPage::new();
            if let Some(prev_offset) = prev {
                let prev_page: &mut HandleOverflowPage = txn::resolve_mut(session, prev_offset)?;
                prev_page.header.next = new_page;
            } else {
                head = new_page;
                let root: &mut RootPage = txn::resolve_mut(session, 0)?;
                root.handle_overflow_head = new_page;
            }
            prev = Some(new_page);
            current = new_page;
        } else {
            prev = Some(current);
            let page: &HandleOverflowPage = txn::resolve(session, current)?;
            current = page.header.next;
        }
    }
    if current == NONE {
        let new_page = session.alloc_page()?;
        let page: &mut HandleOverflowPage = txn::resolve_mut(session, new_page)?;
        *page = HandleOverflowPage::new();
        if let Some(prev_offset) = prev {
            let prev_page: &mut HandleOverflowPage = txn::resolve_mut(session, prev_offset)?;
            prev_page.header.next = new_page;
        } else {
            let root: &mut RootPage = txn::resolve_mut(session, 0)?;
            root.handle_overflow_head = new_page;
        }
        current = new_page;
    }
    Ok(current)
}

/// Finds the first unused handle slot, searching the inline array first
/// and then walking (and extending) the overflow chain.
fn find_free_slot(session: &mut Session) -> Result<(u32, u16)> {
    {
        let root: &RootPage = txn::resolve(session, 0)?;
        if let Some(idx) = root.handles.iter().position(|h| !h.is_used()) {
            return Ok((idx as u32, root.handles[idx].generation));
        }
    }
    let inline_cap = {
        let root: &RootPage = txn::resolve(session, 0)?;
        root.handles.len() as u32
    };
    let mut page_idx = 0;
    loop {
        let page_offset = overflow_page_at(session, page_idx)?;
        let found = {
            let page: &HandleOverflowPage = txn::resolve(session, page_offset)?;
            page.handles.iter().position(|h| !h.is_used())
        };
        if let Some(slot) = found {
            let page: &HandleOverflowPage = txn::resolve(session, page_offset)?;
            let generation = page.handles[slot].generation;
            let global = inline_cap + page_idx * HANDLES_PER_OVERFLOW_PAGE as u32 + slot as u32;
            return Ok((global, generation));
        }
        page_idx += 1;
        if page_idx > 1 << 16 {
            return Err(Error::Enfile);
        }
    }
}

fn handle_mut<'s>(session: &'s mut Session, global_index: u32) -> Result<&'s mut Handle> {
    let kind = {
        let root: &RootPage = txn::resolve(session, 0)?;
        slot_addr(root, global_index)
    };
    match kind {
        SlotAddr::Inline(idx) => {
            let root: &mut RootPage = txn::resolve_mut(session, 0)?;
            Ok(&mut root.handles[idx as usize])
        }
        SlotAddr::Overflow { page, slot } => {
            let page_offset = overflow_page_at(session, page)?;
            let overflow: &mut HandleOverflowPage = txn::resolve_mut(session, page_offset)?;
            Ok(&mut overflow.handles[slot as usize])
        }
    }
}

fn handle_ref<'s>(session: &'s Session, global_index: u32) -> Result<Handle> {
    let root: &RootPage = txn::resolve(session, 0)?;
    match slot_addr(root, global_index) {
        SlotAddr::Inline(idx) => Ok(root.handles[idx as usize]),
        SlotAddr::Overflow { page, slot } => {
            let mut page_offset = root.handle_overflow_head;
            for _ in 0..page {
                if page_offset == NONE {
                    return Err(Error::Ebadf);
                }
                let overflow: &HandleOverflowPage = txn::resolve(session, page_offset)?;
                page_offset = overflow.header.next;
            }
            if page_offset == NONE {
                return Err(Error::Ebadf);
            }
            let overflow: &HandleOverflowPage = txn::resolve(session, page_offset)?;
            Ok(overflow.handles[slot as usize])
        }
    }
}

/// Opens `inode` for the caller, returning a generation-guarded
/// descriptor. Fails with `ENFILE`/`ENOMEM` if no slot is available.
pub fn open(session: &mut Session, inode_ref: InodeRef) -> Result<Fd> {
    let inode_addr = match inode_ref {
        InodeRef::Root => return Err(Error::Eisdir),
        InodeRef::At(addr) => addr,
    };
    let (index, _expected_generation) = find_free_slot(session)?;
    let mut inode = entity::get_inode(session, InodeRef::At(inode_addr))?;
    inode.refcount += 1;
    entity::set_inode(session, InodeRef::At(inode_addr), inode)?;

    let handle = handle_mut(session, index)?;
    handle.open(inode_addr);
    let generation = handle.generation;
    Ok(Fd::pack(generation, index))
}

/// Closes `fd`. Fails with `EBADF` if the slot's generation no longer
/// matches, i.e. the descriptor is stale.
pub fn close(session: &mut Session, fd: Fd) -> Result<()> {
    let current = handle_ref(session, fd.index())?;
    if !current.is_used() || current.generation != fd.generation() {
        return Err(Error::Ebadf);
    }
    let inode_addr = current.inode;
    let mut inode = entity::get_inode(session, InodeRef::At(inode_addr))?;
    if inode.refcount > 0 {
        inode.refcount -= 1;
    }
    if inode.refcount == 0 {
        entity::free_entity_content(session, &inode)?;
        inode = Inode::free();
    }
    entity::set_inode(session, InodeRef::At(inode_addr), inode)?;
    let handle = handle_mut(session, fd.index())?;
    handle.close();
    Ok(())
}

/// Resolves `fd` to its handle, checking the generation guard.
pub fn lookup(session: &Session, fd: Fd) -> Result<Handle> {
    let current = handle_ref(session, fd.index())?;
    if !current.is_used() || current.generation != fd.generation() {
        return Err(Error::Ebadf);
    }
    Ok(current)
}

pub(crate) fn set_cursor(session: &mut Session, fd: Fd, cursor: u32) -> Result<()> {
    let current = handle_ref(session, fd.index())?;
    if !current.is_used() || current.generation != fd.generation() {
        return Err(Error::Ebadf);
    }
    let handle = handle_mut(session, fd.index())?;
    handle.cursor = cursor;
    Ok(())
}
