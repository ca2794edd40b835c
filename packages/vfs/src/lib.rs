//! Virtual filesystems for emulated computers.
//!
//! A computer sees a single [`FileSystem`] assembled from [`Mount`]s attached
//! at locations. Paths are normalised by [`path::sanitize_path`] before they
//! reach a mount, so backends only ever see relative, slash separated paths
//! where the empty string is the root.
//!
//! Writable backends share a space accounting scheme: every file costs at
//! least [`MINIMUM_FILE_SIZE`] bytes and every directory costs exactly that,
//! and writes which would exceed the remaining space fail before anything is
//! written.
//!
//! ```
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//!
//! use cubicle_vfs::{FileSystem, MemoryMount};
//!
//! let fs = FileSystem::with_root("hdd", Arc::new(MemoryMount::new(10_000)));
//! fs.open_for_write("docs/hello.txt", false)?.write_all(b"hello")?;
//!
//! let mut contents = String::new();
//! fs.open_for_read("docs/hello.txt")?.read_to_string(&mut contents)?;
//! assert_eq!(contents, "hello");
//! assert_eq!(fs.get_free_space("")?, 10_000 - 500 - 500);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod file_mount;
pub mod filesystem;
pub mod memory;
pub mod mount;
pub mod path;

#[cfg(any(test, feature = "test-utils"))]
pub mod mount_test_suite;

pub use error::{FileErrorKind, FileOperationError, Result};
pub use file_mount::{FileMount, WritableFileMount};
pub use filesystem::{FileSystem, MAX_COPY_DEPTH};
pub use memory::MemoryMount;
pub use mount::{
    FileAttributes, FileChannel, Mount, OpenMode, OpenOptions, WritableMount, MINIMUM_FILE_SIZE,
};
