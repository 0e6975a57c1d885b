//! Position-independent addressing. Every pointer-like value in the buffer
//! is a byte offset from the start of the buffer, never a host pointer.

/// A byte offset from the start of the buffer. Always either [`NONE`] or
/// the start of a page (a multiple of [`crate::layout::PAGE_SIZE`]).
pub type Offset = u32;

/// Sentinel meaning "no page" — used for unset chain links, an empty free
/// list, and an owner-less inode.
pub const NONE: Offset = u32::MAX;

/// The kind tag stored in every page header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Root = 0,
    Directory = 1,
    FileData = 2,
    HandleOverflow = 3,
    User = 4,
    Free = 5,
}

impl PageKind {
    pub const fn from_u8(v: u8) -> Option<PageKind> {
        Some(match v {
            0 => PageKind::Root,
            1 => PageKind::Directory,
            2 => PageKind::FileData,
            3 => PageKind::HandleOverflow,
            4 => PageKind::User,
            5 => PageKind::Free,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for kind in [
            PageKind::Root,
            PageKind::Directory,
            PageKind::FileData,
            PageKind::HandleOverflow,
            PageKind::User,
            PageKind::Free,
        ] {
            assert_eq!(PageKind::from_u8(kind as u8), Some(kind));
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(PageKind::from_u8(250), None);
    }
}
