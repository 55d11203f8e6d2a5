//! # Advisory Byte-Range Locking
//!
//! Cross-process write coordination uses POSIX advisory record locks:
//! `fcntl(F_SETLK)` with `F_WRLCK` over the byte range being written,
//! released with `F_UNLCK`. Acquisition retries forever on `EAGAIN`
//! with a fixed 10 ms sleep; any other errno aborts the operation.
//!
//! The locks are advisory only. They coordinate cooperating writers of
//! the same table across processes and provide no protection against a
//! process that ignores them.
//!
//! ## Platform Support
//!
//! The `RangeLock` trait has two implementations selected at compile
//! time: `PosixRangeLock` on Unix targets and `NoopRangeLock`
//! everywhere else, where writes simply proceed unlocked.
//!
//! ## Scoped Release
//!
//! `with_range_lock` runs an operation inside an acquired lock and
//! guarantees release on every exit path. A release failure supersedes
//! the operation's result only when the operation itself succeeded.

use eyre::Result;
use std::fs::File;

/// Byte-range lock over an open file.
pub(crate) trait RangeLock {
    /// Takes a write lock over `[start, start + length)`, blocking in
    /// 10 ms retry steps while another process holds the range.
    fn lock_range(&self, file: &File, start: u64, length: u64) -> Result<()>;

    /// Releases a previously taken range.
    fn unlock_range(&self, file: &File, start: u64, length: u64) -> Result<()>;
}

#[cfg(unix)]
pub(crate) use posix::PosixRangeLock as DefaultRangeLock;

#[cfg(not(unix))]
pub(crate) use noop::NoopRangeLock as DefaultRangeLock;

#[cfg(unix)]
mod posix {
    use super::*;
    use eyre::WrapErr;
    use std::os::unix::io::AsRawFd;
    use std::thread;
    use std::time::Duration;

    const RETRY_DELAY: Duration = Duration::from_millis(10);

    #[derive(Debug, Default)]
    pub(crate) struct PosixRangeLock;

    fn fcntl_setlk(
        file: &File,
        lock_type: libc::c_short,
        start: u64,
        length: u64,
    ) -> std::io::Result<()> {
        let mut flock: libc::flock = unsafe { std::mem::zeroed() };
        flock.l_type = lock_type;
        flock.l_whence = libc::SEEK_SET as libc::c_short;
        flock.l_start = start as libc::off_t;
        flock.l_len = length as libc::off_t;

        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &flock) };
        if rc == -1 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    impl RangeLock for PosixRangeLock {
        fn lock_range(&self, file: &File, start: u64, length: u64) -> Result<()> {
            loop {
                match fcntl_setlk(file, libc::F_WRLCK as libc::c_short, start, length) {
                    Ok(()) => return Ok(()),
                    Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => {
                        thread::sleep(RETRY_DELAY);
                    }
                    Err(e) => {
                        return Err(e).wrap_err_with(|| {
                            format!("taking write lock over [{start}, {})", start + length)
                        })
                    }
                }
            }
        }

        fn unlock_range(&self, file: &File, start: u64, length: u64) -> Result<()> {
            fcntl_setlk(file, libc::F_UNLCK as libc::c_short, start, length).wrap_err_with(|| {
                format!("releasing write lock over [{start}, {})", start + length)
            })
        }
    }
}

#[cfg(not(unix))]
mod noop {
    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct NoopRangeLock;

    impl RangeLock for NoopRangeLock {
        fn lock_range(&self, _file: &File, _start: u64, _length: u64) -> Result<()> {
            Ok(())
        }

        fn unlock_range(&self, _file: &File, _start: u64, _length: u64) -> Result<()> {
            Ok(())
        }
    }
}

/// Runs `operation` with a write lock held over `[start, start +
/// length)` of `file`. When `enabled` is false the operation runs
/// unlocked. Release always targets the file that was locked; a
/// release error is returned only if the operation succeeded.
pub(crate) fn with_range_lock<T>(
    enabled: bool,
    file: &File,
    start: u64,
    length: u64,
    operation: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if !enabled {
        return operation();
    }

    let lock = DefaultRangeLock::default();
    lock.lock_range(file, start, length)?;
    let result = operation();
    match lock.unlock_range(file, start, length) {
        Ok(()) => result,
        Err(release_err) => match result {
            Ok(_) => Err(release_err),
            Err(op_err) => Err(op_err),
        },
    }
}
