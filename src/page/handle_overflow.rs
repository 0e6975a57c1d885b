use bytemuck::{Pod, Zeroable};

use crate::layout::{HANDLES_PER_OVERFLOW_PAGE, PAGE_SIZE};
use crate::offset::PageKind;
use crate::page::handle::Handle;
use crate::page::header::PageHeader;

/// Overflow storage for open-file handles once the root page's inline
/// array fills up. Slots are found by scanning for `!used`, the same way
/// the root page's inline array is searched.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct HandleOverflowPage {
    pub header: PageHeader,
    pub handles: [Handle; HANDLES_PER_OVERFLOW_PAGE],
    _padding: [u8; HANDLE_OVERFLOW_TAIL_PAD],
}

const HANDLE_OVERFLOW_FIXED: usize = core::mem::size_of::<PageHeader>();
const HANDLE_OVERFLOW_HANDLES: usize = HANDLES_PER_OVERFLOW_PAGE * core::mem::size_of::<Handle>();
const HANDLE_OVERFLOW_TAIL_PAD: usize =
    PAGE_SIZE - HANDLE_OVERFLOW_FIXED - HANDLE_OVERFLOW_HANDLES;

impl HandleOverflowPage {
    pub fn new() -> HandleOverflowPage {
        let mut page = HandleOverflowPage::zeroed();
        page.header = PageHeader::new(PageKind::HandleOverflow);
        page
    }
}

impl Default for HandleOverflowPage {
    fn default() -> HandleOverflowPage {
        HandleOverflowPage::new()
    }
}

const _: () = assert!(core::mem::size_of::<HandleOverflowPage>() == PAGE_SIZE);
