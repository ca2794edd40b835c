//! The mount contracts.
//!
//! Every path handed to a mount has already been normalised with
//! [`crate::sanitize_path`] and made relative to the mount point, so
//! implementations never see leading slashes or `..` components.

use std::io::{Read, Seek, Write};
use std::time::SystemTime;

use crate::error::{FileErrorKind, FileOperationError, Result};

/// Files smaller than this are charged as if they were this size, as is
/// every directory.
pub const MINIMUM_FILE_SIZE: u64 = 500;

/// An open file. Reads and writes share one position.
pub trait FileChannel: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> FileChannel for T {}

/// Metadata for a file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    pub is_directory: bool,
    /// Zero for directories.
    pub size: u64,
    /// `UNIX_EPOCH` when the backend does not record times.
    pub created: SystemTime,
    pub modified: SystemTime,
}

impl FileAttributes {
    /// Attributes for a backend with no timestamps.
    pub fn without_times(is_directory: bool, size: u64) -> Self {
        Self {
            is_directory,
            size,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
        }
    }
}

/// How a file should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenOptions {
    pub const READ: OpenOptions = OpenOptions {
        read: true,
        write: false,
        create: false,
        truncate: false,
        append: false,
    };

    pub const WRITE: OpenOptions = OpenOptions {
        read: false,
        write: true,
        create: true,
        truncate: true,
        append: false,
    };

    pub const APPEND: OpenOptions = OpenOptions {
        read: false,
        write: true,
        create: true,
        truncate: false,
        append: true,
    };

    /// Classify these options, rejecting combinations mounts do not support.
    ///
    /// `read` may be combined with either write mode.
    pub fn mode(&self, path: &str) -> Result<OpenMode> {
        let unsupported = || FileOperationError::new(path, FileErrorKind::UnsupportedMode);
        match (self.write, self.create, self.truncate, self.append) {
            (false, false, false, false) if self.read => Ok(OpenMode::Read),
            (true, true, true, false) => Ok(OpenMode::Write { read: self.read }),
            (true, true, false, true) => Ok(OpenMode::Append { read: self.read }),
            _ => Err(unsupported()),
        }
    }
}

/// A validated set of [`OpenOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create or truncate.
    Write { read: bool },
    /// Create or open, positioned at the end.
    Append { read: bool },
}

impl OpenMode {
    pub fn writes(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// A read-only tree of files.
pub trait Mount: Send + Sync {
    fn exists(&self, path: &str) -> Result<bool>;

    fn is_directory(&self, path: &str) -> Result<bool>;

    /// Names of the direct children of a directory, in no particular order.
    fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Size of a file in bytes. Directories report zero.
    fn size(&self, path: &str) -> Result<u64>;

    fn attributes(&self, path: &str) -> Result<FileAttributes>;

    /// Open a file for seekable reading.
    fn open_for_read(&self, path: &str) -> Result<Box<dyn FileChannel>>;
}

/// A mount which may also be modified, within a fixed capacity.
///
/// `capacity` minus the space charged for every file and directory is always
/// `remaining_space`. A file is charged `max(size, MINIMUM_FILE_SIZE)` and a
/// directory `MINIMUM_FILE_SIZE`. Writes that would exceed the capacity fail
/// before any byte lands.
pub trait WritableMount: Mount {
    /// Create a directory and any missing parents. Existing directories are fine.
    fn make_directory(&self, path: &str) -> Result<()>;

    /// Delete a file or directory tree. Deleting a missing path is not an error.
    fn delete(&self, path: &str) -> Result<()>;

    /// Move `source` to `dest`. `dest` must not exist and its parent must.
    /// Remaining space is unchanged.
    fn rename(&self, source: &str, dest: &str) -> Result<()>;

    fn open_file(&self, path: &str, options: OpenOptions) -> Result<Box<dyn FileChannel>>;

    fn open_for_write(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        self.open_file(path, OpenOptions::WRITE)
    }

    fn open_for_append(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        self.open_file(path, OpenOptions::APPEND)
    }

    /// Bytes still available. Never negative.
    fn remaining_space(&self) -> Result<u64>;

    fn capacity(&self) -> u64;

    /// Whether `path` (which need not exist) lies in a read-only region.
    fn is_read_only(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Space charged for a file of `size` bytes.
pub(crate) fn charged_size(size: u64) -> u64 {
    size.max(MINIMUM_FILE_SIZE)
}

/// Extra space needed to grow a file from `len` to cover `position + n`.
pub(crate) fn growth_charge(len: u64, position: u64, n: u64) -> u64 {
    let new_len = len.max(position.saturating_add(n));
    charged_size(new_len) - charged_size(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_modes() {
        assert_eq!(OpenOptions::READ.mode("f").unwrap(), OpenMode::Read);
        assert_eq!(
            OpenOptions::WRITE.mode("f").unwrap(),
            OpenMode::Write { read: false }
        );
        assert_eq!(
            OpenOptions::APPEND.mode("f").unwrap(),
            OpenMode::Append { read: false }
        );
        let rw = OpenOptions {
            read: true,
            ..OpenOptions::WRITE
        };
        assert_eq!(rw.mode("f").unwrap(), OpenMode::Write { read: true });
    }

    #[test]
    fn unsupported_modes() {
        let truncate_append = OpenOptions {
            truncate: true,
            ..OpenOptions::APPEND
        };
        let write_no_create = OpenOptions {
            create: false,
            ..OpenOptions::WRITE
        };
        for options in [OpenOptions::default(), truncate_append, write_no_create] {
            let err = options.mode("f").unwrap_err();
            assert_eq!(err.kind(), Some(FileErrorKind::UnsupportedMode));
            assert_eq!(err.path(), Some("f"));
        }
    }

    #[test]
    fn growth_is_charged_past_minimum() {
        assert_eq!(growth_charge(0, 0, 100), 0);
        assert_eq!(growth_charge(0, 0, 600), 100);
        assert_eq!(growth_charge(600, 0, 10), 0);
        assert_eq!(growth_charge(600, 600, 10), 10);
        assert_eq!(growth_charge(0, 2700, 4), 2204);
    }
}
