//! Real file-descriptor tests for the native release strategy.

#![cfg(unix)]

use oshandle::fd::SafeFileHandle;

#[test]
fn test_write_then_read_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("round-trip.txt");

    let file = SafeFileHandle::create(&path).expect("create should succeed");
    let written = file.write(b"guaranteed release").expect("write");
    assert_eq!(written, 18);
    file.close();
    assert!(file.is_closed());

    let file = SafeFileHandle::open(&path).expect("open should succeed");
    let mut buf = [0u8; 64];
    let read = file.read(&mut buf).expect("read");
    assert_eq!(&buf[..read], b"guaranteed release");
}

#[test]
fn test_io_after_close_is_disposed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("closed.txt");

    let file = SafeFileHandle::create(&path).expect("create");
    file.close();

    let err = file.write(b"late").unwrap_err();
    assert!(err.is_disposed(), "write after close must signal ObjectDisposed");
    let err = file.read(&mut [0u8; 8]).unwrap_err();
    assert!(err.is_disposed(), "read after close must signal ObjectDisposed");
}

#[test]
fn test_open_missing_file_captures_last_error() {
    let err = SafeFileHandle::open("/nonexistent/path/definitely-missing").unwrap_err();
    match err {
        oshandle::Error::Native { call, source } => {
            assert_eq!(call, "open");
            assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
        }
        other => panic!("expected a native error, got {other:?}"),
    }
}

#[test]
fn test_unowned_fd_survives_wrapper_drop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("borrowed.txt");

    let owner = SafeFileHandle::create(&path).expect("create");
    let raw = {
        let pinned = owner.as_resource().pin().expect("pin");
        pinned.as_raw() as libc::c_int
    };

    {
        let borrower = SafeFileHandle::from_raw_fd(raw, false);
        borrower.close();
    }

    // The owner's descriptor must still be usable.
    assert_eq!(owner.write(b"still open").expect("write"), 10);
}
