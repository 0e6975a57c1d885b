//! Flat errno-style error taxonomy for the file system surface.
//!
//! Every public operation returns `Result<T, Error>`. `Error` round-trips
//! through the small negative integers a caller embedded in a different
//! language would expect at an FFI boundary via [`Error::to_errno`] and
//! [`Error::from_errno`].

use thiserror::Error;

/// Errors produced by the file system.
///
/// Variants are deliberately flat (no nested causes) so the whole type stays
/// `Copy` and maps onto a single negative integer at the FFI boundary.
#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument")]
    Einval,
    #[error("out of memory")]
    Enomem,
    #[error("no such file or directory")]
    Enoent,
    #[error("operation not permitted")]
    Eperm,
    #[error("resource busy")]
    Ebusy,
    #[error("is a directory")]
    Eisdir,
    #[error("too many open files")]
    Enfile,
    #[error("bad file descriptor")]
    Ebadf,
    #[error("lock acquisition timed out")]
    Etimedout,
    #[error("on-disk structure is corrupt")]
    Ecorrupt,
    #[error("host free callback failed")]
    Esysfree,
    #[error("host sync callback failed")]
    Esyssync,
    #[error("host time callback failed")]
    Esystime,
    #[error("host wait callback failed")]
    Esyswait,
    #[error("host wake callback failed")]
    Esyswake,
}

impl Error {
    /// Maps to the small negative integer a host program embeds this crate
    /// through an FFI boundary would expect.
    pub const fn to_errno(self) -> i32 {
        match self {
            Error::Einval => -1,
            Error::Enomem => -2,
            Error::Enoent => -3,
            Error::Eperm => -4,
            Error::Ebusy => -5,
            Error::Eisdir => -6,
            Error::Enfile => -7,
            Error::Ebadf => -8,
            Error::Etimedout => -9,
            Error::Ecorrupt => -10,
            Error::Esysfree => -11,
            Error::Esyssync => -12,
            Error::Esystime => -13,
            Error::Esyswait => -14,
            Error::Esyswake => -15,
        }
    }

    /// Inverse of [`Error::to_errno`]. Returns `None` for any value this
    /// crate never produces.
    pub const fn from_errno(code: i32) -> Option<Error> {
        Some(match code {
            -1 => Error::Einval,
            -2 => Error::Enomem,
            -3 => Error::Enoent,
            -4 => Error::Eperm,
            -5 => Error::Ebusy,
            -6 => Error::Eisdir,
            -7 => Error::Enfile,
            -8 => Error::Ebadf,
            -9 => Error::Etimedout,
            -10 => Error::Ecorrupt,
            -11 => Error::Esysfree,
            -12 => Error::Esyssync,
            -13 => Error::Esystime,
            -14 => Error::Esyswait,
            -15 => Error::Esyswake,
            _ => return None,
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_round_trips() {
        let variants = [
            Error::Einval,
            Error::Enomem,
            Error::Enoent,
            Error::Eperm,
            Error::Ebusy,
            Error::Eisdir,
            Error::Enfile,
            Error::Ebadf,
            Error::Etimedout,
            Error::Ecorrupt,
            Error::Esysfree,
            Error::Esyssync,
            Error::Esystime,
            Error::Esyswait,
            Error::Esyswake,
        ];
        for e in variants {
            assert_eq!(Error::from_errno(e.to_errno()), Some(e));
        }
    }

    #[test]
    fn unknown_errno_is_none() {
        assert_eq!(Error::from_errno(1), None);
        assert_eq!(Error::from_errno(0), None);
    }
}
