use bytemuck::{Pod, Zeroable};

use crate::offset::{NONE, Offset};

/// One open-file-descriptor slot, embedded inline in the root page or in a
/// handle-overflow page.
///
/// `generation` is bumped every time the slot is closed so a file
/// descriptor packed from a now-stale generation (see
/// [`crate::handle_table::Fd`]) is rejected instead of silently
/// addressing whatever reuses the slot next. `0` and `0xffff` are never
/// assigned: `0` marks a slot that has never been opened.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Handle {
    pub used: u8,
    _reserved: [u8; 1],
    pub generation: u16,
    pub inode: Offset,
    pub cursor: u32,
}

impl Handle {
    pub fn empty() -> Handle {
        Handle {
            used: 0,
            _reserved: [0; 1],
            generation: 0,
            inode: NONE,
            cursor: 0,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used != 0
    }

    pub fn open(&mut self, inode: Offset) {
        self.used = 1;
        self.inode = inode;
        self.cursor = 0;
    }

    pub fn close(&mut self) {
        self.used = 0;
        self.inode = NONE;
        self.cursor = 0;
        self.generation = match self.generation.wrapping_add(1) {
            0 | 0xffff => 1,
            g => g,
        };
    }
}

const _: () = assert!(core::mem::size_of::<Handle>() == 12);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_bumps_generation_and_clears_inode() {
        let mut handle = Handle::empty();
        handle.open(4096);
        assert!(handle.is_used());
        assert_eq!(handle.generation, 0);
        handle.close();
        assert!(!handle.is_used());
        assert_eq!(handle.inode, NONE);
        assert_eq!(handle.generation, 1);
        handle.open(8192);
        assert_eq!(handle.generation, 1);
        handle.close();
        assert_eq!(handle.generation, 2);
    }

    #[test]
    fn generation_skips_zero_and_all_ones_on_wraparound() {
        let mut handle = Handle::empty();
        handle.generation = 0xfffe;
        handle.close();
        assert_eq!(handle.generation, 1);
        handle.close();
        assert_eq!(handle.generation, 2);
    }
}
