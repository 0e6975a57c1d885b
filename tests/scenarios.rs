//! End-to-end behavior over the public surface, backed by the
//! std-only testing host.

#![cfg(feature = "std")]

use cozyfs::api;
use cozyfs::entity::{self, InodeRef};
use cozyfs::host::testing::{FakeClock, StdHostCallback};
use cozyfs::{Error, Options, Session};

fn fresh_buffer(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

unsafe fn init<'h>(buf: &mut [u8], host: &'h StdHostCallback, opts: Options) -> Session<'h> {
    unsafe { Session::init(buf.as_mut_ptr(), buf.len(), host, opts).unwrap() }
}

#[test]
fn empty_round_trip() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    assert!(api::mkdir(&mut session, b"/a").is_ok());
    assert!(api::mkdir(&mut session, b"/a/b").is_ok());
    assert_eq!(api::open(&mut session, b"/a/b").unwrap_err(), Error::Eisdir);
    assert!(api::rmdir(&mut session, b"/a/b").is_ok());
    assert!(api::rmdir(&mut session, b"/a").is_ok());
    assert_eq!(api::rmdir(&mut session, b"/a").unwrap_err(), Error::Enoent);
}

#[test]
fn hard_link_and_refcount() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    api::mkdir(&mut session, b"/d").unwrap();
    api::link(&mut session, b"/d/f", None).unwrap();
    let fd = api::open(&mut session, b"/d/f").unwrap();
    api::write(&mut session, fd, b"hello").unwrap();
    api::close(&mut session, fd).unwrap();

    api::link(&mut session, b"/d/g", Some(b"/d/f")).unwrap();
    api::unlink(&mut session, b"/d/f").unwrap();

    let fd = api::open(&mut session, b"/d/g").unwrap();
    let mut dst = [0u8; 5];
    let n = api::read(&mut session, fd, &mut dst, true, false).unwrap();
    assert_eq!(n, 5);
    assert_eq!(&dst, b"hello");
    api::close(&mut session, fd).unwrap();
}

#[test]
fn path_normalization() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    api::mkdir(&mut session, b"/x").unwrap();
    api::mkdir(&mut session, b"/x/./y").unwrap();
    assert_eq!(api::rmdir(&mut session, b"/x/y/..").unwrap_err(), Error::Einval);
    api::rmdir(&mut session, b"/x/y").unwrap();
    api::rmdir(&mut session, b"/x").unwrap();
}

#[test]
fn transaction_rollback_hides_the_mutation() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    api::mkdir(&mut session, b"/t").unwrap();

    session.transaction_begin().unwrap();
    let parent = api::lookup(&session, b"/t").unwrap();
    entity::create_entity(&mut session, parent, b"a", true, None).unwrap();
    session.rollback().unwrap();

    assert_eq!(api::open(&mut session, b"/t/a").unwrap_err(), Error::Enoent);
}

#[test]
fn transaction_commit_is_visible_to_a_later_attempt() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    session.transaction_begin().unwrap();
    let root = InodeRef::Root;
    entity::create_entity(&mut session, root, b"s", true, None).unwrap();
    session.commit().unwrap();

    assert_eq!(api::mkdir(&mut session, b"/s").unwrap_err(), Error::Einval);
}

#[test]
fn crash_recovery_discards_the_uncommitted_transaction() {
    let mut buf = fresh_buffer(1024 * 1024);
    let clock = FakeClock::new(1_000);
    let host = StdHostCallback::with_clock(clock.clone());
    let opts = Options {
        backup: true,
        wait_timeout_ms: Some(200),
        hold_timeout_ms: 50,
    };

    {
        let mut session = unsafe { init(&mut buf, &host, opts) };
        api::mkdir(&mut session, b"/persisted").unwrap();

        session.transaction_begin().unwrap();
        let root = InodeRef::Root;
        entity::create_entity(&mut session, root, b"lost", true, None).unwrap();
        clock.advance(1_000);
        // session dropped here without commit or rollback: simulates the
        // holder's process dying mid-transaction. Its lease is now well
        // past expiry.
    }

    let mut session = unsafe { Session::attach(buf.as_mut_ptr(), buf.len(), &host, opts).unwrap() };
    session.transaction_begin().unwrap();
    assert!(entity::get_inode(&session, InodeRef::Root).is_ok());
    assert!(api::lookup(&session, b"/persisted").is_ok());
    assert_eq!(api::lookup(&session, b"/lost").unwrap_err(), Error::Enoent);
    session.rollback().unwrap();
}

#[test]
fn position_independence() {
    let mut buf_a = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    {
        let mut session = unsafe { init(&mut buf_a, &host, Options::default()) };
        api::mkdir(&mut session, b"/moved").unwrap();
        api::link(&mut session, b"/moved/f", None).unwrap();
        let fd = api::open(&mut session, b"/moved/f").unwrap();
        api::write(&mut session, fd, b"payload").unwrap();
        api::close(&mut session, fd).unwrap();
    }

    let mut buf_b = buf_a.clone();
    let session_b =
        unsafe { Session::attach(buf_b.as_mut_ptr(), buf_b.len(), &host, Options::default()).unwrap() };
    assert!(api::lookup(&session_b, b"/moved").is_ok());
    assert!(api::lookup(&session_b, b"/moved/f").is_ok());
}

#[test]
fn round_trip_write_then_read() {
    let mut buf = fresh_buffer(128 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    api::link(&mut session, b"/blob", None).unwrap();
    let fd = api::open(&mut session, b"/blob").unwrap();
    let payload: Vec<u8> = (0..9000u32).map(|i| (i % 251) as u8).collect();
    let written = api::write(&mut session, fd, &payload).unwrap();
    assert_eq!(written, payload.len());

    let mut dst = vec![0u8; payload.len()];
    let read = api::read(&mut session, fd, &mut dst, true, false).unwrap();
    assert_eq!(read, payload.len());
    assert_eq!(dst, payload);
    api::close(&mut session, fd).unwrap();
}

#[test]
fn descriptor_staleness_after_close() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    api::link(&mut session, b"/f", None).unwrap();
    let fd = api::open(&mut session, b"/f").unwrap();
    api::close(&mut session, fd).unwrap();

    let mut dst = [0u8; 1];
    assert_eq!(api::read(&mut session, fd, &mut dst, false, false).unwrap_err(), Error::Ebadf);
    assert_eq!(api::write(&mut session, fd, b"x").unwrap_err(), Error::Ebadf);
    assert_eq!(api::close(&mut session, fd).unwrap_err(), Error::Ebadf);
}

#[test]
fn chown_and_chmod_apply_unconditionally() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    api::mkdir(&mut session, b"/owned").unwrap();
    api::chown(&mut session, b"/owned", 42).unwrap();
    api::chmod(&mut session, b"/owned", 0o755).unwrap();

    let inode_ref = api::lookup(&session, b"/owned").unwrap();
    let inode = entity::get_inode(&session, inode_ref).unwrap();
    assert_eq!(inode.owner_uid, 42);
    assert_eq!(inode.mode, 0o755);
}

#[test]
fn root_and_directory_link_restrictions_are_rejected() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    assert_eq!(api::unlink(&mut session, b"/").unwrap_err(), Error::Eperm);
    assert_eq!(api::link(&mut session, b"/", None).unwrap_err(), Error::Eperm);

    api::mkdir(&mut session, b"/dir").unwrap();
    assert_eq!(api::link(&mut session, b"/alias", Some(b"/dir")).unwrap_err(), Error::Eperm);
}

#[test]
fn mkusr_and_rmusr_round_trip() {
    let mut buf = fresh_buffer(64 * 1024);
    let host = StdHostCallback::new();
    let mut session = unsafe { init(&mut buf, &host, Options::default()) };

    let id = api::mkusr(&mut session, b"alice").unwrap();
    assert!(id > 0);
    api::rmusr(&mut session, id).unwrap();
    assert_eq!(api::rmusr(&mut session, id).unwrap_err(), Error::Enoent);
}
