use bytemuck::{Pod, Zeroable};

use crate::layout::PAGE_SIZE;
use crate::offset::PageKind;
use crate::page::header::PageHeader;

/// Usable payload bytes per file-data page.
pub const FILE_PAGE_PAYLOAD: usize = PAGE_SIZE - core::mem::size_of::<PageHeader>();

/// One page of a regular file's byte content chain.
///
/// `Inode::head_cursor`/`Inode::tail_end` give the live byte range within
/// the head and tail pages; every page strictly between head and tail is
/// entirely live.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct FileDataPage {
    pub header: PageHeader,
    pub data: [u8; FILE_PAGE_PAYLOAD],
}

impl FileDataPage {
    pub fn new() -> FileDataPage {
        let mut page = FileDataPage::zeroed();
        page.header = PageHeader::new(PageKind::FileData);
        page
    }
}

impl Default for FileDataPage {
    fn default() -> FileDataPage {
        FileDataPage::new()
    }
}

impl core::fmt::Debug for FileDataPage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileDataPage")
            .field("header", &self.header)
            .field("data_len", &self.data.len())
            .finish()
    }
}

const _: () = assert!(core::mem::size_of::<FileDataPage>() == PAGE_SIZE);
