use bytemuck::{Pod, Zeroable};

use crate::layout::{PAGE_SIZE, ROOT_HANDLE_SLOTS};
use crate::offset::{NONE, Offset};
use crate::page::handle::Handle;
use crate::page::inode::Inode;

/// Magic stamp identifying a buffer as one this crate formatted. Distinct
/// from the version tail so a future format revision can keep the magic
/// and bump the version alone.
pub const GENERATION_MAGIC: u32 = 0x434f_5a31; // "COZ1"
pub const FORMAT_VERSION: u32 = 1;

/// Page zero. Holds the fields every other page kind chains off of, plus
/// the three volatile fields excluded from inter-half copies in backup
/// mode (`lock_word`, `backup_flag`, `last_backup_time`).
///
/// Field order follows the persisted layout exactly; `_pad0` reproduces
/// the four bytes a real C compiler would insert between `backup_flag`
/// and `last_backup_time` to align the latter, made explicit here because
/// `bytemuck`'s `Pod` derive rejects implicit padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RootPage {
    pub generation_stamp: u64,
    pub lock_word: u64,
    pub backup_flag: i32,
    _pad0: [u8; 4],
    pub last_backup_time: u64,
    pub next_account_id: u32,
    pub free_list_head: Offset,
    pub total_pages: u32,
    pub inuse_pages: u32,
    /// Head of the handle-overflow page chain, consulted once the inline
    /// `handles` array is full.
    pub handle_overflow_head: Offset,
    /// Head of the account-table page chain.
    pub user_table_head: Offset,
    pub root_inode: Inode,
    pub handles: [Handle; ROOT_HANDLE_SLOTS],
    _padding: [u8; ROOT_PAGE_TAIL_PAD],
}

const ROOT_PAGE_FIXED: usize =
    8 + 8 + 4 + 4 + 8 + 4 + 4 + 4 + 4 + 4 + 4 + core::mem::size_of::<Inode>();
const ROOT_PAGE_HANDLES: usize = ROOT_HANDLE_SLOTS * core::mem::size_of::<Handle>();
const ROOT_PAGE_TAIL_PAD: usize = PAGE_SIZE - ROOT_PAGE_FIXED - ROOT_PAGE_HANDLES;

impl RootPage {
    pub fn stamp(&mut self) {
        self.generation_stamp = ((FORMAT_VERSION as u64) << 32) | GENERATION_MAGIC as u64;
    }

    pub fn has_valid_stamp(&self) -> bool {
        (self.generation_stamp & 0xffff_ffff) == GENERATION_MAGIC as u64
    }

    pub fn format_version(&self) -> u32 {
        (self.generation_stamp >> 32) as u32
    }
}

impl Default for RootPage {
    fn default() -> RootPage {
        let mut page = RootPage::zeroed();
        page.stamp();
        page.lock_word = 0;
        page.backup_flag = 0;
        page.last_backup_time = 0;
        page.next_account_id = 1;
        page.free_list_head = NONE;
        page.handle_overflow_head = NONE;
        page.user_table_head = NONE;
        page.root_inode = Inode::new_directory();
        page.root_inode.owner_uid = 0;
        page
    }
}

const _: () = assert!(core::mem::size_of::<RootPage>() == PAGE_SIZE);

#[cfg(test)]
mod tests {
    use super::*;
    use memoffset::offset_of;

    #[test]
    fn root_page_is_exactly_one_page() {
        assert_eq!(core::mem::size_of::<RootPage>(), PAGE_SIZE);
    }

    #[test]
    fn volatile_fields_sit_at_the_front() {
        assert_eq!(offset_of!(RootPage, generation_stamp), 0);
        assert_eq!(offset_of!(RootPage, lock_word), 8);
        assert_eq!(offset_of!(RootPage, backup_flag), 16);
        assert_eq!(offset_of!(RootPage, last_backup_time), 24);
    }

    #[test]
    fn default_page_has_valid_stamp_and_fresh_root_dir() {
        let page = RootPage::default();
        assert!(page.has_valid_stamp());
        assert_eq!(page.format_version(), FORMAT_VERSION);
        assert!(page.root_inode.is_directory());
        assert_eq!(page.next_account_id, 1);
        assert_eq!(page.free_list_head, NONE);
    }
}
