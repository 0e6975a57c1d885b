use bytemuck::{Pod, Zeroable};

use crate::layout::{DIR_INODES_PER_PAGE, DIR_LINKS_PER_PAGE, PAGE_SIZE};
use crate::offset::PageKind;
use crate::page::header::PageHeader;
use crate::page::inode::Inode;
use crate::page::link::Link;

/// One page of a directory's content chain.
///
/// Invariant: every page in the chain except the tail has `link_count ==
/// DIR_LINKS_PER_PAGE`. Removal always swaps the tail chain's last
/// occupied link into the freed slot, so only the tail ever has spare
/// capacity; this keeps link lookup and removal O(chain length) without a
/// separate free list for link slots.
///
/// The inode pool is independent of the link array: a pool slot is free
/// exactly when its `refcount` is zero, found by a linear scan rather than
/// a count, because pool slots cannot be swap-compacted (other links
/// reference them by offset).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectoryPage {
    pub header: PageHeader,
    pub link_count: u32,
    pub links: [Link; DIR_LINKS_PER_PAGE],
    pub inodes: [Inode; DIR_INODES_PER_PAGE],
    _padding: [u8; DIRECTORY_PAGE_TAIL_PAD],
}

const DIRECTORY_PAGE_FIXED: usize = core::mem::size_of::<PageHeader>() + 4;
const DIRECTORY_PAGE_LINKS: usize = DIR_LINKS_PER_PAGE * core::mem::size_of::<Link>();
const DIRECTORY_PAGE_INODES: usize = DIR_INODES_PER_PAGE * core::mem::size_of::<Inode>();
const DIRECTORY_PAGE_TAIL_PAD: usize =
    PAGE_SIZE - DIRECTORY_PAGE_FIXED - DIRECTORY_PAGE_LINKS - DIRECTORY_PAGE_INODES;

impl DirectoryPage {
    pub fn new() -> DirectoryPage {
        let mut page = DirectoryPage::zeroed();
        page.header = PageHeader::new(PageKind::Directory);
        page.link_count = 0;
        for inode in page.inodes.iter_mut() {
            *inode = Inode::free();
        }
        page
    }

    pub fn is_full(&self) -> bool {
        self.link_count as usize == DIR_LINKS_PER_PAGE
    }

    pub fn free_inode_slot(&self) -> Option<usize> {
        self.inodes.iter().position(|inode| inode.is_free())
    }
}

impl Default for DirectoryPage {
    fn default() -> DirectoryPage {
        DirectoryPage::new()
    }
}

const _: () = assert!(core::mem::size_of::<DirectoryPage>() == PAGE_SIZE);
