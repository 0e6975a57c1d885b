use bytemuck::{Pod, Zeroable};

use crate::layout::PAGE_SIZE;
use crate::offset::PageKind;
use crate::page::header::PageHeader;

/// A page on the free list. Singly linked through `header.next`;
/// `header.prev` is unused and left at the sentinel. Content beyond the
/// header is never read.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct FreePage {
    pub header: PageHeader,
    _unused: [u8; PAGE_SIZE - core::mem::size_of::<PageHeader>()],
}

impl FreePage {
    pub fn new(next: crate::offset::Offset) -> FreePage {
        let mut page = FreePage::zeroed();
        page.header = PageHeader::new(PageKind::Free);
        page.header.next = next;
        page
    }
}

impl core::fmt::Debug for FreePage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FreePage").field("header", &self.header).finish()
    }
}

const _: () = assert!(core::mem::size_of::<FreePage>() == PAGE_SIZE);
