//! Advisory single-writer lock on a store directory.
//!
//! The engine has no internal concurrency control; correctness depends on
//! exactly one store instance owning a directory at a time. The lock makes
//! that ownership explicit: a second opener fails fast instead of silently
//! interleaving writes.
#![allow(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::{GraphError, Result};

const LOCK_FILE: &str = "LOCK";

/// Exclusive advisory lock held for the lifetime of a file-backed store.
///
/// Released on drop; the `LOCK` file itself is left in place.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Takes the exclusive lock for `root`.
    ///
    /// Fails with [`GraphError::Locked`] when another process holds it.
    pub fn acquire(root: &Path) -> Result<StoreLock> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(root.join(LOCK_FILE))?;
        match try_lock_exclusive(&file) {
            Ok(true) => Ok(StoreLock { file }),
            Ok(false) => Err(GraphError::Locked(root.display().to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = unlock(&self.file);
    }
}

fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        unix::lock_exclusive(file)
    }
    #[cfg(windows)]
    {
        windows::lock_exclusive(file)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = file;
        Err(io::Error::new(
            io::ErrorKind::Other,
            "file locking unsupported on this platform",
        ))
    }
}

fn unlock(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        unix::unlock(file)
    }
    #[cfg(windows)]
    {
        windows::unlock(file)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = file;
        Ok(())
    }
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::io::AsRawFd;

    // flock rather than fcntl: fcntl record locks never conflict between
    // two descriptors of the same process, so they cannot guard against
    // a second store instance opened in-process.
    pub fn lock_exclusive(file: &File) -> io::Result<bool> {
        let fd = file.as_raw_fd();
        loop {
            let res = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
            if res == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EWOULDBLOCK) => return Ok(false),
                _ => return Err(err),
            }
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let res = unsafe { libc::flock(fd, libc::LOCK_UN) };
        if res == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use std::mem::zeroed;
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, UnlockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    pub fn lock_exclusive(file: &File) -> io::Result<bool> {
        unsafe {
            let handle = file.as_raw_handle();
            let mut overlapped: OVERLAPPED = zeroed();
            let flags = LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY;
            let res = LockFileEx(
                handle as isize,
                flags,
                0,
                u32::MAX,
                u32::MAX,
                &mut overlapped,
            );
            if res != 0 {
                Ok(true)
            } else {
                let err = io::Error::last_os_error();
                if matches!(err.raw_os_error(), Some(code) if code == ERROR_LOCK_VIOLATION as i32)
                {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        unsafe {
            let handle = file.as_raw_handle();
            let mut overlapped: OVERLAPPED = zeroed();
            let res = UnlockFileEx(handle as isize, 0, u32::MAX, u32::MAX, &mut overlapped);
            if res != 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}
