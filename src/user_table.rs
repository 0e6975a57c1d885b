//! The flat account table: `mkusr`/`rmusr`/`chown`/`chmod`.
//!
//! Per the source this grew out of, owner and mode enforcement are
//! declared but never checked — `chown`/`chmod` here update an inode's
//! fields unconditionally, same as upstream.

use crate::entity::{self, InodeRef};
use crate::error::{Error, Result};
use crate::offset::NONE;
use crate::page::root::RootPage;
use crate::page::user_page::UserPage;
use crate::page::user::User;
use crate::session::Session;
use crate::txn;

/// Creates a new account, returning its id. Ids are handed out
/// sequentially starting at 1; 0 marks an empty slot.
pub fn mkusr(session: &mut Session, name: &[u8]) -> Result<u32> {
    let account_id = {
        let root: &RootPage = txn::resolve(session, 0)?;
        root.next_account_id
    };
    let user = User::new(account_id, name)?;

    let mut head = {
        let root: &RootPage = txn::resolve(session, 0)?;
        root.user_table_head
    };
    let mut prev: Option<u32> = None;
    let mut slot_page = None;

    loop {
        if head == NONE {
            let new_page = session.alloc_page()?;
            {
                let page: &mut UserPage = txn::resolve_mut(session, new_page)?;
                *page = UserPage::new();
            }
            match prev {
                Some(prev_offset) => {
                    let prev_page: &mut UserPage = txn::resolve_mut(session, prev_offset)?;
                    prev_page.header.next = new_page;
                }
                None => {
                    let root: &mut RootPage = txn::resolve_mut(session, 0)?;
                    root.user_table_head = new_page;
                }
            }
            slot_page = Some(new_page);
            break;
        }
        let free_slot = {
            let page: &UserPage = txn::resolve(session, head)?;
            page.free_slot()
        };
        if free_slot.is_some() {
            slot_page = Some(head);
            break;
        }
        prev = Some(head);
        let page: &UserPage = txn::resolve(session, head)?;
        head = page.header.next;
    }

    let page_offset = slot_page.expect("a user page was allocated or found above");
    let page: &mut UserPage = txn::resolve_mut(session, page_offset)?;
    let slot = page.free_slot().unwrap_or(0);
    page.users[slot] = user;

    let root: &mut RootPage = txn::resolve_mut(session, 0)?;
    root.next_account_id += 1;
    Ok(account_id)
}

/// Removes the account with id `account_id`. Does not touch any inode
/// that names it as owner — owner ids are never validated against the
/// table, matching the declared-but-unenforced design.
pub fn rmusr(session: &mut Session, account_id: u32) -> Result<()> {
    let mut page_offset = {
        let root: &RootPage = txn::resolve(session, 0)?;
        root.user_table_head
    };
    while page_offset != NONE {
        let slot = {
            let page: &UserPage = txn::resolve(session, page_offset)?;
            page.users.iter().position(|u| u.account_id == account_id)
        };
        if let Some(slot) = slot {
            let page: &mut UserPage = txn::resolve_mut(session, page_offset)?;
            page.users[slot] = User::empty();
            return Ok(());
        }
        let page: &UserPage = txn::resolve(session, page_offset)?;
        page_offset = page.header.next;
    }
    Err(Error::Enoent)
}

/// Sets `inode`'s owner unconditionally.
pub fn chown(session: &mut Session, inode: InodeRef, owner_uid: u32) -> Result<()> {
    let mut value = entity::get_inode(session, inode)?;
    value.owner_uid = owner_uid;
    entity::set_inode(session, inode, value)
}

/// Sets `inode`'s mode bits unconditionally.
pub fn chmod(session: &mut Session, inode: InodeRef, mode: u32) -> Result<()> {
    let mut value = entity::get_inode(session, inode)?;
    value.mode = mode;
    entity::set_inode(session, inode, value)
}
