//! Mounts backed by a directory on the host filesystem.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::error::{FileErrorKind, FileOperationError, Result};
use crate::mount::{
    charged_size, growth_charge, FileAttributes, FileChannel, Mount, OpenMode, OpenOptions,
    WritableMount, MINIMUM_FILE_SIZE,
};

/// A read-only view of a host directory.
///
/// A root directory that does not exist (yet) behaves like an empty one.
#[derive(Debug, Clone)]
pub struct FileMount {
    root: PathBuf,
}

impl FileMount {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn created(&self) -> bool {
        self.root.exists()
    }

    /// Host path for a mount path. Rejects anything that could escape the root.
    pub(crate) fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FileOperationError::new(path, FileErrorKind::AccessDenied));
        }
        Ok(self.root.join(relative))
    }

    fn metadata(&self, path: &str) -> Result<Option<fs::Metadata>> {
        if !self.created() {
            return Ok(None);
        }
        match fs::metadata(self.resolve(path)?) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileOperationError::from(e).with_path(path)),
        }
    }
}

impl Mount for FileMount {
    fn exists(&self, path: &str) -> Result<bool> {
        if path.is_empty() {
            return Ok(true);
        }
        Ok(self.metadata(path)?.is_some())
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        if path.is_empty() {
            return Ok(true);
        }
        Ok(self.metadata(path)?.is_some_and(|m| m.is_dir()))
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        if !self.created() {
            return if path.is_empty() {
                Ok(Vec::new())
            } else {
                Err(FileOperationError::new(path, FileErrorKind::NoSuchFile))
            };
        }
        match self.metadata(path)? {
            None => return Err(FileOperationError::new(path, FileErrorKind::NoSuchFile)),
            Some(meta) if !meta.is_dir() => {
                return Err(FileOperationError::new(path, FileErrorKind::NotADirectory))
            }
            Some(_) => {}
        }

        let mut names = Vec::new();
        let entries = fs::read_dir(self.resolve(path)?)
            .map_err(|e| FileOperationError::from(e).with_path(path))?;
        for entry in entries {
            let entry = entry.map_err(|e| FileOperationError::from(e).with_path(path))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn size(&self, path: &str) -> Result<u64> {
        if path.is_empty() {
            return Ok(0);
        }
        match self.metadata(path)? {
            Some(meta) if meta.is_dir() => Ok(0),
            Some(meta) => Ok(meta.len()),
            None => Err(FileOperationError::new(path, FileErrorKind::NoSuchFile)),
        }
    }

    fn attributes(&self, path: &str) -> Result<FileAttributes> {
        match self.metadata(path)? {
            Some(meta) => Ok(FileAttributes {
                is_directory: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
                created: meta.created().unwrap_or(SystemTime::UNIX_EPOCH),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            }),
            None if path.is_empty() => Ok(FileAttributes::without_times(true, 0)),
            None => Err(FileOperationError::new(path, FileErrorKind::NoSuchFile)),
        }
    }

    fn open_for_read(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        match self.metadata(path)? {
            Some(meta) if meta.is_dir() => Err(FileOperationError::new(path, FileErrorKind::NotAFile)),
            Some(_) => {
                let file = File::open(self.resolve(path)?)
                    .map_err(|e| FileOperationError::from(e).with_path(path))?;
                Ok(Box::new(file))
            }
            None if path.is_empty() => Err(FileOperationError::new(path, FileErrorKind::NotAFile)),
            None => Err(FileOperationError::new(path, FileErrorKind::NoSuchFile)),
        }
    }
}

/// Space accounting shared between a mount and its open channels.
#[derive(Debug)]
struct Quota {
    /// Includes the allowance for the root directory.
    capacity: u64,
    used: Mutex<u64>,
}

impl Quota {
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.used.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(*self.lock())
    }

    fn try_charge(&self, n: u64) -> bool {
        let mut used = self.lock();
        if self.capacity.saturating_sub(*used) < n {
            return false;
        }
        *used += n;
        true
    }

    fn refund(&self, n: u64) {
        let mut used = self.lock();
        *used = used.saturating_sub(n);
    }
}

/// A quota-limited, writable host directory.
///
/// The root directory is created lazily on the first write.
#[derive(Debug, Clone)]
pub struct WritableFileMount {
    inner: FileMount,
    quota: Arc<Quota>,
}

impl WritableFileMount {
    pub fn new(root: impl Into<PathBuf>, capacity: u64) -> Self {
        let inner = FileMount::new(root);
        let used = if inner.created() {
            measure_used_space(&inner.root)
        } else {
            MINIMUM_FILE_SIZE
        };
        Self {
            inner,
            quota: Arc::new(Quota {
                capacity: capacity + MINIMUM_FILE_SIZE,
                used: Mutex::new(used),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }

    fn create_root(&self) -> Result<()> {
        fs::create_dir_all(&self.inner.root)
            .map_err(|_| FileOperationError::from_kind(FileErrorKind::AccessDenied))
    }

    fn check_writable(&self, path: &str) -> Result<()> {
        if self.is_read_only(path)? {
            Err(FileOperationError::new(path, FileErrorKind::AccessDenied))
        } else {
            Ok(())
        }
    }

    fn delete_recursively(&self, file: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(file)?;
        if meta.is_dir() {
            for entry in fs::read_dir(file)? {
                self.delete_recursively(&entry?.path())?;
            }
            fs::remove_dir(file)
                .map_err(|_| FileOperationError::from_kind(FileErrorKind::AccessDenied))?;
            self.quota.refund(MINIMUM_FILE_SIZE);
        } else {
            fs::remove_file(file)
                .map_err(|_| FileOperationError::from_kind(FileErrorKind::AccessDenied))?;
            self.quota.refund(charged_size(meta.len()));
        }
        Ok(())
    }
}

impl Mount for WritableFileMount {
    fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path)
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        self.inner.is_directory(path)
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        self.inner.list(path)
    }

    fn size(&self, path: &str) -> Result<u64> {
        self.inner.size(path)
    }

    fn attributes(&self, path: &str) -> Result<FileAttributes> {
        self.inner.attributes(path)
    }

    fn open_for_read(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        self.inner.open_for_read(path)
    }
}

impl WritableMount for WritableFileMount {
    fn make_directory(&self, path: &str) -> Result<()> {
        self.check_writable(path)?;
        self.create_root()?;
        let file = self.inner.resolve(path)?;
        if file.exists() {
            if !file.is_dir() {
                return Err(FileOperationError::new(path, FileErrorKind::FileExists));
            }
            return Ok(());
        }

        let mut dirs_to_create = 1;
        let mut parent = file.parent();
        while let Some(dir) = parent {
            if dir.exists() {
                break;
            }
            dirs_to_create += 1;
            parent = dir.parent();
        }

        let required = dirs_to_create * MINIMUM_FILE_SIZE;
        if !self.quota.try_charge(required) {
            tracing::debug!(path, required, "out of space creating directory");
            return Err(FileOperationError::new(path, FileErrorKind::OutOfSpace));
        }
        if let Err(e) = fs::create_dir_all(&file) {
            self.quota.refund(required);
            tracing::debug!(path, error = %e, "failed to create directory");
            return Err(FileOperationError::new(path, FileErrorKind::AccessDenied));
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(FileOperationError::new(path, FileErrorKind::AccessDenied));
        }
        self.check_writable(path)?;
        if !self.inner.created() {
            return Ok(());
        }
        let file = self.inner.resolve(path)?;
        if fs::symlink_metadata(&file).is_ok() {
            self.delete_recursively(&file)
                .map_err(|e| e.or_path(path))?;
        }
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        self.check_writable(source)?;
        self.check_writable(dest)?;
        let source_file = self.inner.resolve(source)?;
        let dest_file = self.inner.resolve(dest)?;
        if !source_file.exists() {
            return Err(FileOperationError::new(source, FileErrorKind::NoSuchFile));
        }
        if dest_file.exists() {
            return Err(FileOperationError::new(dest, FileErrorKind::FileExists));
        }
        if dest_file.starts_with(&source_file) {
            return Err(FileOperationError::other(
                Some(source.to_string()),
                "Cannot move a directory inside itself",
            ));
        }
        match dest_file.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => {
                return Err(FileOperationError::other(
                    Some(dest.to_string()),
                    "Parent directory does not exist",
                ))
            }
        }

        fs::rename(&source_file, &dest_file)
            .map_err(|e| FileOperationError::from(e).with_path(source))
    }

    fn open_file(&self, path: &str, options: OpenOptions) -> Result<Box<dyn FileChannel>> {
        let mode = options.mode(path)?;
        if mode == OpenMode::Read {
            return self.inner.open_for_read(path);
        }
        if path.is_empty() {
            return Err(FileOperationError::new(path, FileErrorKind::CannotWriteToDirectory));
        }
        self.check_writable(path)?;
        self.create_root()?;

        let file = self.inner.resolve(path)?;
        let existing = match fs::metadata(&file) {
            Ok(meta) if meta.is_dir() => {
                return Err(FileOperationError::new(path, FileErrorKind::CannotWriteToDirectory))
            }
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(FileOperationError::from(e).with_path(path)),
        };

        if existing.is_none() && !self.quota.try_charge(MINIMUM_FILE_SIZE) {
            return Err(FileOperationError::new(path, FileErrorKind::OutOfSpace));
        }

        let (read, append) = match mode {
            OpenMode::Write { read } => (read, false),
            OpenMode::Append { read } => (read, true),
            OpenMode::Read => (true, false),
        };
        let mut handle = fs::OpenOptions::new();
        handle.read(read).write(true).create(true);
        if append {
            handle.append(true);
        } else {
            handle.truncate(true);
        }
        let mut opened = match handle.open(&file) {
            Ok(f) => f,
            Err(e) => {
                if existing.is_none() {
                    self.quota.refund(MINIMUM_FILE_SIZE);
                }
                return Err(FileOperationError::from(e).with_path(path));
            }
        };
        // Truncation releases the old contents, keeping the minimum charge.
        if let (Some(size), OpenMode::Write { .. }) = (existing, mode) {
            self.quota.refund(charged_size(size) - MINIMUM_FILE_SIZE);
        }
        if append {
            opened
                .seek(SeekFrom::End(0))
                .map_err(|e| FileOperationError::from(e).with_path(path))?;
        }

        Ok(Box::new(CountingChannel {
            file: opened,
            quota: self.quota.clone(),
            append,
        }))
    }

    fn remaining_space(&self) -> Result<u64> {
        Ok(self.quota.remaining())
    }

    fn capacity(&self) -> u64 {
        self.quota.capacity - MINIMUM_FILE_SIZE
    }

    fn is_read_only(&self, path: &str) -> Result<bool> {
        let mut file = self.inner.resolve(path)?;
        loop {
            match fs::metadata(&file) {
                Ok(meta) => return Ok(meta.permissions().readonly()),
                Err(_) if file == self.inner.root => return Ok(false),
                Err(_) => {}
            }
            if !file.pop() {
                return Ok(false);
            }
        }
    }
}

/// A host file whose growth is charged against the mount's quota before any
/// byte is written.
struct CountingChannel {
    file: File,
    quota: Arc<Quota>,
    append: bool,
}

impl Read for CountingChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for CountingChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.file.metadata()?.len();
        let position = if self.append {
            len
        } else {
            self.file.stream_position()?
        };
        let charge = growth_charge(len, position, buf.len() as u64);
        if !self.quota.try_charge(charge) {
            tracing::debug!(charge, "disk mount out of space");
            return Err(FileOperationError::from_kind(FileErrorKind::OutOfSpace).into_io());
        }
        if let Err(e) = self.file.write_all(buf) {
            // Part of the buffer may have reached the disk before the failure.
            let refund = match self.file.metadata() {
                Ok(meta) => unused_charge(charge, len, meta.len()),
                Err(_) => 0,
            };
            self.quota.refund(refund);
            return Err(e);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for CountingChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.append {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "File does not support seeking",
            ));
        }
        self.file.seek(pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }
}

/// The part of `charge` not taken up by a file which grew from `before` to
/// `after` bytes.
fn unused_charge(charge: u64, before: u64, after: u64) -> u64 {
    let used = charged_size(after).saturating_sub(charged_size(before));
    charge.saturating_sub(used)
}

/// Space used by an existing directory tree, including the root itself.
fn measure_used_space(root: &Path) -> u64 {
    fn walk(path: &Path) -> u64 {
        let mut size = MINIMUM_FILE_SIZE;
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error computing file size");
                return size;
            }
        };
        for entry in entries.flatten() {
            match entry.metadata() {
                Ok(meta) if meta.is_dir() => size += walk(&entry.path()),
                Ok(meta) => size += charged_size(meta.len()),
                Err(e) => {
                    tracing::error!(path = %entry.path().display(), error = %e, "error computing file size")
                }
            }
        }
        size
    }
    walk(root)
}
