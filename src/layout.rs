//! Page sizing and capacity constants shared by every page kind.
//!
//! Page struct sizes are asserted against [`PAGE_SIZE`] at the bottom of
//! each `page::*` module so a mis-sized struct fails to build rather than
//! silently corrupting the buffer at runtime.

use core::mem::size_of;

use crate::page::header::PageHeader;
use crate::page::inode::Inode;
use crate::page::link::Link;
use crate::page::handle::Handle;
use crate::page::user::User;

/// Size in bytes of every page, including the header.
pub const PAGE_SIZE: usize = 4096;

/// Fixed capacity of a link name: long enough for most path components,
/// NUL-padded when shorter.
pub const LINK_NAME_CAP: usize = 128;

/// Fixed capacity of a user name.
pub const USER_NAME_CAP: usize = 64;

/// Links held by one directory page. Every directory page except the tail
/// of its chain is always full to this capacity.
pub const DIR_LINKS_PER_PAGE: usize = 24;

/// Inode slots held by one directory page's inode pool. A slot is free when
/// its `refcount` is zero; pool slots are never swap-compacted because
/// links elsewhere reference them by offset.
pub const DIR_INODES_PER_PAGE: usize = 12;

/// Handle slots held by one handle-overflow page.
pub const HANDLES_PER_OVERFLOW_PAGE: usize =
    (PAGE_SIZE - size_of::<PageHeader>()) / size_of::<Handle>();

/// User-table slots held by one user page.
pub const USERS_PER_PAGE: usize = (PAGE_SIZE - size_of::<PageHeader>()) / size_of::<User>();

/// Handle slots embedded directly in the root page, searched before any
/// handle-overflow page is consulted.
pub const ROOT_HANDLE_SLOTS: usize = 333;

/// Maximum number of path components accepted by the path parser.
pub const PATH_MAX_COMPONENTS: usize = 32;

/// Fixed capacity of the per-session copy-on-write patch table.
pub const PATCH_TABLE_CAPACITY: usize = 128;

const _: () = assert!(size_of::<Link>() == LINK_NAME_CAP + 4);
const _: () = assert!(size_of::<Inode>() % 4 == 0);
