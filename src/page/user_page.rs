use bytemuck::{Pod, Zeroable};

use crate::layout::{PAGE_SIZE, USERS_PER_PAGE};
use crate::offset::PageKind;
use crate::page::header::PageHeader;
use crate::page::user::User;

/// One page of the account table, chained off the root the same way
/// directory and file-data pages are.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct UserPage {
    pub header: PageHeader,
    pub users: [User; USERS_PER_PAGE],
    _padding: [u8; USER_PAGE_TAIL_PAD],
}

const USER_PAGE_FIXED: usize = core::mem::size_of::<PageHeader>();
const USER_PAGE_USERS: usize = USERS_PER_PAGE * core::mem::size_of::<User>();
const USER_PAGE_TAIL_PAD: usize = PAGE_SIZE - USER_PAGE_FIXED - USER_PAGE_USERS;

impl UserPage {
    pub fn new() -> UserPage {
        let mut page = UserPage::zeroed();
        page.header = PageHeader::new(PageKind::User);
        page
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.users.iter().position(|u| u.is_free())
    }
}

impl Default for UserPage {
    fn default() -> UserPage {
        UserPage::new()
    }
}

const _: () = assert!(core::mem::size_of::<UserPage>() == PAGE_SIZE);
