use bitfield::bitfield;
use bytemuck::{Pod, Zeroable};

use crate::offset::{NONE, Offset};

bitfield! {
    /// Ergonomic view over [`Inode::flags`]. Kept separate from the raw
    /// `u8` stored in the page so the on-disk struct stays `Pod` with no
    /// bitfield-crate wrapper type embedded in it.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct InodeFlags(u8);
    impl Debug;
    pub directory, set_directory: 0;
    pub regular, set_regular: 1;
}

impl From<u8> for InodeFlags {
    fn from(v: u8) -> InodeFlags {
        InodeFlags(v)
    }
}

impl From<InodeFlags> for u8 {
    fn from(v: InodeFlags) -> u8 {
        v.0
    }
}

/// One file-system entity: a directory or a regular file.
///
/// Reused for both kinds, the way a Unix inode is; `head_cursor` and
/// `tail_end` are only meaningful when `flags.regular()` is set, since
/// directory content is addressed by link/pool slot rather than by byte
/// offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Inode {
    pub refcount: u32,
    pub flags: u8,
    _reserved: [u8; 3],
    pub owner_uid: u32,
    /// Permission bits. Stored and returned by `chmod` but never enforced
    /// — declared in the source this crate grew out of but left
    /// unimplemented there, and left that way here too.
    pub mode: u32,
    pub head: Offset,
    pub tail: Offset,
    /// First live byte within the head page's payload (regular files only).
    pub head_cursor: u32,
    /// One past the last live byte within the tail page's payload (regular
    /// files only).
    pub tail_end: u32,
}

impl Inode {
    pub fn free() -> Inode {
        Inode {
            refcount: 0,
            flags: 0,
            _reserved: [0; 3],
            owner_uid: 0,
            mode: 0,
            head: NONE,
            tail: NONE,
            head_cursor: 0,
            tail_end: 0,
        }
    }

    pub fn new_directory() -> Inode {
        let mut inode = Inode::free();
        inode.refcount = 1;
        inode.flags = InodeFlags(0).tap_directory().into();
        inode
    }

    pub fn new_regular() -> Inode {
        let mut inode = Inode::free();
        inode.refcount = 1;
        inode.flags = InodeFlags(0).tap_regular().into();
        inode
    }

    pub fn is_free(&self) -> bool {
        self.refcount == 0
    }

    pub fn is_directory(&self) -> bool {
        InodeFlags::from(self.flags).directory()
    }

    pub fn is_regular(&self) -> bool {
        InodeFlags::from(self.flags).regular()
    }
}

impl InodeFlags {
    fn tap_directory(mut self) -> Self {
        self.set_directory(true);
        self
    }

    fn tap_regular(mut self) -> Self {
        self.set_regular(true);
        self
    }
}

const _: () = assert!(core::mem::size_of::<Inode>() == 32);
const _: () = assert!(core::mem::size_of::<Inode>() % 4 == 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_directory_inode_has_refcount_one() {
        let inode = Inode::new_directory();
        assert_eq!(inode.refcount, 1);
        assert!(inode.is_directory());
        assert!(!inode.is_regular());
    }

    #[test]
    fn free_inode_has_no_chain() {
        let inode = Inode::free();
        assert!(inode.is_free());
        assert_eq!(inode.head, NONE);
        assert_eq!(inode.tail, NONE);
    }
}
