use bytemuck::{Pod, Zeroable};

use crate::error::Error;
use crate::layout::USER_NAME_CAP;

/// One account record in the user table. `account_id` zero means the slot
/// is free; account ids handed out by [`crate::user::mkusr`] start at one.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct User {
    pub account_id: u32,
    name: [u8; USER_NAME_CAP],
}

impl User {
    pub fn empty() -> User {
        User {
            account_id: 0,
            name: [0; USER_NAME_CAP],
        }
    }

    pub fn new(account_id: u32, name: &[u8]) -> Result<User, Error> {
        if account_id == 0 || name.is_empty() || name.len() > USER_NAME_CAP {
            return Err(Error::Einval);
        }
        let mut padded = [0u8; USER_NAME_CAP];
        padded[..name.len()].copy_from_slice(name);
        Ok(User {
            account_id,
            name: padded,
        })
    }

    pub fn is_free(&self) -> bool {
        self.account_id == 0
    }

    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(USER_NAME_CAP);
        &self.name[..len]
    }
}

const _: () = assert!(core::mem::size_of::<User>() == USER_NAME_CAP + 4);
