use bytemuck::{Pod, Zeroable};

use crate::offset::{NONE, Offset, PageKind};

/// Leading bytes of every non-root page: a kind tag and the chain links
/// used by pages that form a doubly linked list (directory and file-data
/// chains) or a singly linked one (the free list, via `next` only).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PageHeader {
    pub kind: u8,
    _reserved: [u8; 3],
    pub prev: Offset,
    pub next: Offset,
}

impl PageHeader {
    pub fn new(kind: PageKind) -> PageHeader {
        PageHeader {
            kind: kind as u8,
            _reserved: [0; 3],
            prev: NONE,
            next: NONE,
        }
    }

    pub fn kind(&self) -> Option<PageKind> {
        PageKind::from_u8(self.kind)
    }
}

const _: () = assert!(core::mem::size_of::<PageHeader>() == 12);
