use bytemuck::{Pod, Zeroable};

use crate::error::Error;
use crate::layout::LINK_NAME_CAP;
use crate::offset::{NONE, Offset};

/// One directory entry: a name bound to an inode.
///
/// The name is NUL-padded to [`LINK_NAME_CAP`] bytes rather than
/// length-prefixed, so the struct stays a plain fixed-size `Pod` record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Link {
    pub inode: Offset,
    name: [u8; LINK_NAME_CAP],
}

impl Link {
    pub fn empty() -> Link {
        Link {
            inode: NONE,
            name: [0; LINK_NAME_CAP],
        }
    }

    pub fn new(name: &[u8], inode: Offset) -> Result<Link, Error> {
        if name.is_empty() || name.len() > LINK_NAME_CAP {
            return Err(Error::Einval);
        }
        let mut padded = [0u8; LINK_NAME_CAP];
        padded[..name.len()].copy_from_slice(name);
        Ok(Link { inode, name: padded })
    }

    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LINK_NAME_CAP);
        &self.name[..len]
    }

    pub fn matches(&self, name: &[u8]) -> bool {
        self.name() == name
    }
}

const _: () = assert!(core::mem::size_of::<Link>() == LINK_NAME_CAP + 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_short_name() {
        let link = Link::new(b"etc", 4096).unwrap();
        assert_eq!(link.name(), b"etc");
        assert_eq!(link.inode, 4096);
    }

    #[test]
    fn rejects_empty_or_oversize_names() {
        assert_eq!(Link::new(b"", 0).unwrap_err(), Error::Einval);
        let too_long = [b'a'; LINK_NAME_CAP + 1];
        assert_eq!(Link::new(&too_long, 0).unwrap_err(), Error::Einval);
    }

    #[test]
    fn full_width_name_has_no_trailing_nul() {
        let full = [b'a'; LINK_NAME_CAP];
        let link = Link::new(&full, 0).unwrap();
        assert_eq!(link.name(), &full[..]);
    }
}
