//! Directory and inode management: the engine's `find`, `create`, and
//! `remove` primitives every higher-level operation (mkdir, rmdir, link,
//! unlink, open) is built from.

use crate::error::{Error, Result};
use crate::layout::{DIR_INODES_PER_PAGE, PAGE_SIZE};
use crate::offset::{NONE, Offset};
use crate::page::directory::DirectoryPage;
use crate::page::inode::Inode;
use crate::page::link::Link;
use crate::page::root::RootPage;
use crate::session::Session;
use crate::txn;

/// Addresses one inode: either the root directory (embedded in the root
/// page) or an ordinary inode living in some directory page's pool,
/// addressed by the exact byte offset of its `Inode` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeRef {
    Root,
    At(Offset),
}

/// Where a link was found: the directory page holding it and its index
/// within that page's `links` array.
#[derive(Debug, Clone, Copy)]
pub struct LinkLocation {
    pub page: Offset,
    pub index: usize,
}

pub fn inode_offset_in_page(page: Offset, slot: usize) -> Offset {
    let inodes_offset = memoffset::offset_of!(DirectoryPage, inodes);
    page + (inodes_offset + slot * core::mem::size_of::<Inode>()) as Offset
}

pub fn get_inode(session: &Session, iref: InodeRef) -> Result<Inode> {
    match iref {
        InodeRef::Root => {
            let root: &RootPage = txn::resolve(session, 0)?;
            Ok(root.root_inode)
        }
        InodeRef::At(addr) => {
            let inode: &Inode = txn::resolve_sub(session, addr)?;
            Ok(*inode)
        }
    }
}

pub fn set_inode(session: &mut Session, iref: InodeRef, value: Inode) -> Result<()> {
    match iref {
        InodeRef::Root => {
            let root: &mut RootPage = txn::resolve_mut(session, 0)?;
            root.root_inode = value;
        }
        InodeRef::At(addr) => {
            let inode: &mut Inode = txn::resolve_sub_mut(session, addr)?;
            *inode = value;
        }
    }
    Ok(())
}

/// Searches `dir`'s content chain for `name`, returning its link value and
/// location if found.
pub fn find_link(session: &Session, dir: &Inode, name: &[u8]) -> Result<Option<(Link, LinkLocation)>> {
    let mut page_offset = dir.head;
    while page_offset != NONE {
        let page: &DirectoryPage = txn::resolve(session, page_offset)?;
        for i in 0..page.link_count as usize {
            if page.links[i].matches(name) {
                return Ok(Some((
                    page.links[i],
                    LinkLocation {
                        page: page_offset,
                        index: i,
                    },
                )));
            }
        }
        page_offset = page.header.next;
    }
    Ok(None)
}

/// Finds a free inode-pool slot in `dir`'s tail directory page, per the
/// allocation policy: only the tail page is ever searched, new capacity
/// comes from chaining a fresh directory page.
fn alloc_inode_slot(session: &mut Session, dir: &mut Inode) -> Result<Offset> {
    if dir.tail == NONE {
        let new_page_offset = session.alloc_page()?;
        link_new_tail_page(session, dir, new_page_offset)?;
        return Ok(inode_offset_in_page(dir.tail, 0));
    }

    let tail = dir.tail;
    let slot = {
        let page: &DirectoryPage = txn::resolve(session, tail)?;
        page.free_inode_slot()
    };
    let slot = match slot {
        Some(slot) => slot,
        None => {
            let new_page_offset = session.alloc_page()?;
            link_new_tail_page(session, dir, new_page_offset)?;
            0
        }
    };
    Ok(inode_offset_in_page(dir.tail, slot))
}

fn link_new_tail_page(session: &mut Session, dir: &mut Inode, new_page_offset: Offset) -> Result<()> {
    let new_page = DirectoryPage::new();
    let page: &mut DirectoryPage = txn::resolve_mut(session, new_page_offset)?;
    *page = new_page;
    page.header.prev = dir.tail;

    if dir.tail != NONE {
        let prev_page: &mut DirectoryPage = txn::resolve_mut(session, dir.tail)?;
        prev_page.header.next = new_page_offset;
    } else {
        dir.head = new_page_offset;
    }
    dir.tail = new_page_offset;
    Ok(())
}

/// Appends `link` to `dir`'s tail page, chaining a fresh page first if the
/// tail is full or the directory has no content yet.
fn append_link(session: &mut Session, dir: &mut Inode, link: Link) -> Result<()> {
    if dir.tail == NONE {
        let new_page_offset = session.alloc_page()?;
        link_new_tail_page(session, dir, new_page_offset)?;
    } else {
        let full = {
            let page: &DirectoryPage = txn::resolve(session, dir.tail)?;
            page.is_full()
        };
        if full {
            let new_page_offset = session.alloc_page()?;
            link_new_tail_page(session, dir, new_page_offset)?;
        }
    }
    let page: &mut DirectoryPage = txn::resolve_mut(session, dir.tail)?;
    let idx = page.link_count as usize;
    page.links[idx] = link;
    page.link_count += 1;
    Ok(())
}

/// Implements the `create entity under parent, name, kind, target` op.
pub fn create_entity(
    session: &mut Session,
    parent: InodeRef,
    name: &[u8],
    directory: bool,
    target: Option<InodeRef>,
) -> Result<InodeRef> {
    if name.is_empty() || name.len() > crate::layout::LINK_NAME_CAP {
        return Err(Error::Einval);
    }
    let mut parent_inode = get_inode(session, parent)?;
    if !parent_inode.is_directory() {
        return Err(Error::Eisdir);
    }
    if find_link(session, &parent_inode, name)?.is_some() {
        return Err(Error::Einval);
    }

    let child_ref = match target {
        Some(existing) => {
            let mut inode = get_inode(session, existing)?;
            inode.refcount += 1;
            set_inode(session, existing, inode)?;
            existing
        }
        None => {
            let addr = alloc_inode_slot(session, &mut parent_inode)?;
            let inode = if directory {
                Inode::new_directory()
            } else {
                Inode::new_regular()
            };
            set_inode(session, InodeRef::At(addr), inode)?;
            InodeRef::At(addr)
        }
    };

    let link_value = match child_ref {
        InodeRef::Root => return Err(Error::Einval),
        InodeRef::At(addr) => Link::new(name, addr)?,
    };
    append_link(session, &mut parent_inode, link_value)?;
    set_inode(session, parent, parent_inode)?;
    Ok(child_ref)
}

/// Implements the `remove entity under parent, name` op.
pub fn remove_entity(session: &mut Session, parent: InodeRef, name: &[u8]) -> Result<()> {
    let mut parent_inode = get_inode(session, parent)?;
    let (link, location) = find_link(session, &parent_inode, name)?.ok_or(Error::Enoent)?;

    let child_ref = InodeRef::At(link.inode);
    let mut child_inode = get_inode(session, child_ref)?;

    if child_inode.is_directory() && child_inode.head != NONE {
        if directory_has_children(session, &child_inode)? {
            return Err(Error::Einval);
        }
    }

    swap_remove_link(session, &mut parent_inode, location)?;

    child_inode.refcount -= 1;
    if child_inode.refcount == 0 {
        free_entity_content(session, &child_inode)?;
        child_inode = Inode::free();
    }
    set_inode(session, child_ref, child_inode)?;
    set_inode(session, parent, parent_inode)?;
    Ok(())
}

fn directory_has_children(session: &Session, dir: &Inode) -> Result<bool> {
    let mut page_offset = dir.head;
    while page_offset != NONE {
        let page: &DirectoryPage = txn::resolve(session, page_offset)?;
        if page.link_count > 0 {
            return Ok(true);
        }
        page_offset = page.header.next;
    }
    Ok(false)
}

/// Swap-removes the link at `location`: the chain's tail page's last
/// occupied link slot is moved into the freed slot, and the tail page is
/// freed back to the page pool if it becomes empty (and is not the sole
/// remaining page).
fn swap_remove_link(session: &mut Session, dir: &mut Inode, location: LinkLocation) -> Result<()> {
    let tail = dir.tail;
    let (last_link, tail_count_after) = {
        let page: &DirectoryPage = txn::resolve(session, tail)?;
        let count = page.link_count as usize;
        debug_assert!(count > 0);
        (page.links[count - 1], count - 1)
    };

    if tail == location.page && tail_count_after == location.index {
        // Removing the tail's own last link: nothing to move.
        let page: &mut DirectoryPage = txn::resolve_mut(session, tail)?;
        page.links[location.index] = Link::empty();
        page.link_count = tail_count_after as u32;
    } else {
        {
            let page: &mut DirectoryPage = txn::resolve_mut(session, location.page)?;
            page.links[location.index] = last_link;
        }
        let page: &mut DirectoryPage = txn::resolve_mut(session, tail)?;
        page.links[tail_count_after] = Link::empty();
        page.link_count = tail_count_after as u32;
    }

    let tail_empty_and_poolless = {
        let page: &DirectoryPage = txn::resolve(session, tail)?;
        page.link_count == 0 && all_pool_slots_free(page)
    };

    if tail_empty_and_poolless && dir.head != tail {
        let prev = {
            let page: &DirectoryPage = txn::resolve(session, tail)?;
            page.header.prev
        };
        if prev != NONE {
            let prev_page: &mut DirectoryPage = txn::resolve_mut(session, prev)?;
            prev_page.header.next = NONE;
        }
        dir.tail = prev;
        if dir.tail == NONE {
            dir.head = NONE;
        }
        session.free_page(tail)?;
    }
    Ok(())
}

fn all_pool_slots_free(page: &DirectoryPage) -> bool {
    page.inodes.iter().all(|inode| inode.is_free())
}

/// Frees every data/directory page in `inode`'s chain back to the page
/// pool. Called once an inode's refcount hits zero.
pub(crate) fn free_entity_content(session: &mut Session, inode: &Inode) -> Result<()> {
    let mut page_offset = inode.head;
    while page_offset != NONE {
        let next = if inode.is_directory() {
            let page: &DirectoryPage = txn::resolve(session, page_offset)?;
            page.header.next
        } else {
            let page: &crate::page::filedata::FileDataPage = txn::resolve(session, page_offset)?;
            page.header.next
        };
        session.free_page(page_offset)?;
        page_offset = next;
    }
    Ok(())
}

const _: () = assert!(DIR_INODES_PER_PAGE > 0);
const _: () = assert!(PAGE_SIZE > 0);
