//! Byte-level read and write over a regular file's data-page chain.

use crate::entity::{self, InodeRef};
use crate::error::{Error, Result};
use crate::handle_table::{self, Fd};
use crate::offset::NONE;
use crate::page::filedata::{FILE_PAGE_PAYLOAD, FileDataPage};
use crate::page::inode::Inode;
use crate::session::Session;
use crate::txn;

/// Live byte range within one page of the chain, inclusive of the head
/// and tail trimming invariant (I4): the head page starts at
/// `head_cursor`, the tail page ends at `tail_end`, every page strictly
/// between them is entirely live.
fn live_range(inode: &Inode, page_offset: u32, single_page: bool) -> (usize, usize) {
    let is_head = page_offset == inode.head;
    let is_tail = page_offset == inode.tail;
    let start = if is_head { inode.head_cursor as usize } else { 0 };
    let end = if is_tail {
        inode.tail_end as usize
    } else {
        FILE_PAGE_PAYLOAD
    };
    let _ = single_page;
    (start, end)
}

/// Reads up to `dst.len()` bytes starting at `fd`'s cursor (or from byte
/// zero if `restart`). If `consume`, the bytes read are removed from the
/// front of the file and fully-drained pages are freed.
pub fn read(session: &mut Session, fd: Fd, dst: &mut [u8], restart: bool, consume: bool) -> Result<usize> {
    let handle = handle_table::lookup(session, fd)?;
    let inode_addr = handle.inode;
    let inode = entity::get_inode(session, InodeRef::At(inode_addr))?;
    if !inode.is_regular() {
        return Err(Error::Eisdir);
    }

    let start_cursor = if restart { 0 } else { handle.cursor as u64 };
    let mut skip = start_cursor;
    let mut written = 0usize;
    let mut page_offset = inode.head;

    while page_offset != NONE && written < dst.len() {
        let (start, end) = live_range(&inode, page_offset, inode.head == inode.tail);
        let page_len = end.saturating_sub(start) as u64;

        if skip >= page_len {
            skip -= page_len;
        } else {
            let page: &FileDataPage = txn::resolve(session, page_offset)?;
            let live = &page.data[start..end];
            let live = &live[skip as usize..];
            let take = live.len().min(dst.len() - written);
            dst[written..written + take].copy_from_slice(&live[..take]);
            written += take;
            skip = 0;
            if take < live.len() {
                break;
            }
        }

        let page: &FileDataPage = txn::resolve(session, page_offset)?;
        page_offset = page.header.next;
    }

    let new_cursor = start_cursor + written as u64;
    if consume && written > 0 {
        consume_front(session, inode_addr, written as u64)?;
        handle_table::set_cursor(session, fd, 0)?;
    } else {
        handle_table::set_cursor(session, fd, new_cursor as u32)?;
    }
    Ok(written)
}

/// Removes `count` live bytes from the front of the file, freeing any
/// page that becomes fully drained.
fn consume_front(session: &mut Session, inode_addr: u32, mut count: u64) -> Result<()> {
    let mut inode = entity::get_inode(session, InodeRef::At(inode_addr))?;
    while count > 0 && inode.head != NONE {
        let (start, end) = live_range(&inode, inode.head, inode.head == inode.tail);
        let live = (end - start) as u64;
        if count < live {
            inode.head_cursor = (start as u64 + count) as u32;
            count = 0;
        } else {
            count -= live;
            let drained = inode.head;
            let next = {
                let page: &FileDataPage = txn::resolve(session, drained)?;
                page.header.next
            };
            if drained == inode.tail {
                inode.head = NONE;
                inode.tail = NONE;
                inode.head_cursor = 0;
                inode.tail_end = 0;
            } else {
                inode.head = next;
                inode.head_cursor = 0;
                if next != NONE {
                    let next_page: &mut FileDataPage = txn::resolve_mut(session, next)?;
                    next_page.header.prev = NONE;
                }
            }
            session.free_page(drained)?;
        }
    }
    entity::set_inode(session, InodeRef::At(inode_addr), inode)
}

/// Appends `src` to the file's logical tail, allocating and chaining new
/// data pages as needed.
pub fn write(session: &mut Session, fd: Fd, src: &[u8]) -> Result<usize> {
    let handle = handle_table::lookup(session, fd)?;
    let inode_addr = handle.inode;
    let mut inode = entity::get_inode(session, InodeRef::At(inode_addr))?;
    if !inode.is_regular() {
        return Err(Error::Eisdir);
    }

    let mut written = 0usize;
    while written < src.len() {
        if inode.tail == NONE {
            let new_page = session.alloc_page()?;
            let page: &mut FileDataPage = txn::resolve_mut(session, new_page)?;
            *page = FileDataPage::new();
            inode.head = new_page;
            inode.tail = new_page;
            inode.head_cursor = 0;
            inode.tail_end = 0;
        }

        let space = FILE_PAGE_PAYLOAD - inode.tail_end as usize;
        if space == 0 {
            let new_page = session.alloc_page()?;
            {
                let page: &mut FileDataPage = txn::resolve_mut(session, new_page)?;
                *page = FileDataPage::new();
                page.header.prev = inode.tail;
            }
            let prev: &mut FileDataPage = txn::resolve_mut(session, inode.tail)?;
            prev.header.next = new_page;
            inode.tail = new_page;
            inode.tail_end = 0;
            continue;
        }

        let take = space.min(src.len() - written);
        let tail = inode.tail;
        let tail_end = inode.tail_end as usize;
        let page: &mut FileDataPage = txn::resolve_mut(session, tail)?;
        page.data[tail_end..tail_end + take].copy_from_slice(&src[written..written + take]);
        inode.tail_end += take as u32;
        written += take;
    }

    entity::set_inode(session, InodeRef::At(inode_addr), inode)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_range_single_page_uses_both_cursors() {
        let mut inode = Inode::new_regular();
        inode.head = 4096;
        inode.tail = 4096;
        inode.head_cursor = 3;
        inode.tail_end = 10;
        let (start, end) = live_range(&inode, 4096, true);
        assert_eq!((start, end), (3, 10));
    }

    #[test]
    fn live_range_middle_page_is_fully_live() {
        let mut inode = Inode::new_regular();
        inode.head = 4096;
        inode.tail = 12288;
        let (start, end) = live_range(&inode, 8192, false);
        assert_eq!((start, end), (0, FILE_PAGE_PAYLOAD));
    }
}
