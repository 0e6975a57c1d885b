//! The public surface: path-addressed operations built on top of
//! [`crate::entity`], [`crate::handle_table`], and [`crate::io`], each
//! following the acquire-perform-release pattern around a single
//! transaction.

use crate::entity::{self, InodeRef};
use crate::error::{Error, Result};
use crate::handle_table::{self, Fd};
use crate::path;
use crate::session::Session;
use crate::user_table;

/// Walks `components` from `root`, following only directory links.
/// Fails with `ENOENT` on a missing component and `EISDIR`... actually
/// `ENOTDIR`-shaped failures are reported as `EISDIR`'s complement: a
/// non-directory in a non-leaf position is `ENOENT`, since this crate
/// has no distinct "not a directory" variant.
fn resolve_dir(session: &Session, components: &[&[u8]]) -> Result<InodeRef> {
    let mut current = InodeRef::Root;
    for name in components {
        let inode = entity::get_inode(session, current)?;
        if !inode.is_directory() {
            return Err(Error::Enoent);
        }
        let (link, _) = entity::find_link(session, &inode, name)?.ok_or(Error::Enoent)?;
        current = InodeRef::At(link.inode);
    }
    Ok(current)
}

/// Resolves `path` to the inode it names.
pub fn lookup(session: &Session, path: &[u8]) -> Result<InodeRef> {
    let parsed = path::parse(path)?;
    resolve_dir(session, parsed.as_slice())
}

/// Resolves `path` to its parent directory and leaf name. Fails with
/// `EPERM` for the root itself, which has no parent: the root can
/// neither be removed nor addressed as a link target by its own path.
fn resolve_parent<'a>(session: &Session, path: &'a [u8]) -> Result<(InodeRef, &'a [u8])> {
    let parsed = path::parse(path)?;
    let (parent_components, leaf) = parsed.split_leaf().ok_or(Error::Eperm)?;
    let parent = resolve_dir(session, parent_components)?;
    Ok((parent, leaf))
}

/// Creates a directory at `path`.
pub fn mkdir(session: &mut Session, path: &[u8]) -> Result<()> {
    session.transaction_begin()?;
    let result = (|| {
        let (parent, name) = resolve_parent(session, path)?;
        entity::create_entity(session, parent, name, true, None)?;
        Ok(())
    })();
    finish(session, result)
}

/// Removes the empty directory at `path`.
pub fn rmdir(session: &mut Session, path: &[u8]) -> Result<()> {
    session.transaction_begin()?;
    let result = (|| {
        let (parent, name) = resolve_parent(session, path)?;
        let target = {
            let parent_inode = entity::get_inode(session, parent)?;
            entity::find_link(session, &parent_inode, name)?.ok_or(Error::Enoent)?.0.inode
        };
        let inode = entity::get_inode(session, InodeRef::At(target))?;
        if !inode.is_directory() {
            return Err(Error::Einval);
        }
        entity::remove_entity(session, parent, name)
    })();
    finish(session, result)
}

/// Creates a regular file at `path`, or hard-links `existing` at `path`
/// if given.
pub fn link(session: &mut Session, path: &[u8], existing: Option<&[u8]>) -> Result<()> {
    session.transaction_begin()?;
    let result = (|| {
        let target = match existing {
            Some(existing_path) => {
                let target = lookup(session, existing_path)?;
                let inode = entity::get_inode(session, target)?;
                if inode.is_directory() {
                    return Err(Error::Eperm);
                }
                Some(target)
            }
            None => None,
        };
        let (parent, name) = resolve_parent(session, path)?;
        entity::create_entity(session, parent, name, false, target)?;
        Ok(())
    })();
    finish(session, result)
}

/// Removes the link at `path`, freeing its target once its refcount
/// reaches zero.
pub fn unlink(session: &mut Session, path: &[u8]) -> Result<()> {
    session.transaction_begin()?;
    let result = (|| {
        let (parent, name) = resolve_parent(session, path)?;
        entity::remove_entity(session, parent, name)
    })();
    finish(session, result)
}

/// Opens `path` for reading and writing, returning a descriptor.
pub fn open(session: &mut Session, path: &[u8]) -> Result<Fd> {
    session.transaction_begin()?;
    let result = (|| {
        let target = lookup(session, path)?;
        let inode = entity::get_inode(session, target)?;
        if inode.is_directory() {
            return Err(Error::Eisdir);
        }
        handle_table::open(session, target)
    })();
    finish(session, result)
}

/// Closes `fd`.
pub fn close(session: &mut Session, fd: Fd) -> Result<()> {
    session.transaction_begin()?;
    let result = handle_table::close(session, fd);
    finish(session, result)
}

/// Reads up to `dst.len()` bytes from `fd` into `dst`.
pub fn read(session: &mut Session, fd: Fd, dst: &mut [u8], restart: bool, consume: bool) -> Result<usize> {
    session.transaction_begin()?;
    let result = crate::io::read(session, fd, dst, restart, consume);
    finish(session, result)
}

/// Appends `src` to the file `fd` addresses.
pub fn write(session: &mut Session, fd: Fd, src: &[u8]) -> Result<usize> {
    session.transaction_begin()?;
    let result = crate::io::write(session, fd, src);
    finish(session, result)
}

/// Creates an account in the flat user table, returning its id.
pub fn mkusr(session: &mut Session, name: &[u8]) -> Result<u32> {
    session.transaction_begin()?;
    let result = user_table::mkusr(session, name);
    finish(session, result)
}

/// Removes the account with id `account_id`.
pub fn rmusr(session: &mut Session, account_id: u32) -> Result<()> {
    session.transaction_begin()?;
    let result = user_table::rmusr(session, account_id);
    finish(session, result)
}

/// Sets the owner of the entity at `path`, unconditionally and without
/// any enforcement at read/write time.
pub fn chown(session: &mut Session, path: &[u8], owner_uid: u32) -> Result<()> {
    session.transaction_begin()?;
    let result = (|| {
        let target = lookup(session, path)?;
        user_table::chown(session, target, owner_uid)
    })();
    finish(session, result)
}

/// Sets the mode bits of the entity at `path`, unconditionally and
/// without any enforcement at read/write time.
pub fn chmod(session: &mut Session, path: &[u8], mode: u32) -> Result<()> {
    session.transaction_begin()?;
    let result = (|| {
        let target = lookup(session, path)?;
        user_table::chmod(session, target, mode)
    })();
    finish(session, result)
}

/// Commits on success, rolls back on failure, and returns the original
/// result either way.
fn finish<T>(session: &mut Session, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(e) => {
            let _ = session.rollback();
            Err(e)
        }
    }
}
