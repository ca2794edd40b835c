//! A mount which keeps its whole tree in memory.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::error::{FileErrorKind, FileOperationError, Result};
use crate::mount::{
    charged_size, growth_charge, FileAttributes, FileChannel, Mount, OpenMode, OpenOptions,
    WritableMount, MINIMUM_FILE_SIZE,
};

/// Files larger than this cannot be written.
const MAX_FILE_SIZE: u64 = 1 << 30;

#[derive(Debug)]
struct FileData {
    contents: Vec<u8>,
    created: SystemTime,
    modified: SystemTime,
}

type FileRef = Arc<Mutex<FileData>>;

#[derive(Debug)]
enum Entry {
    File(FileRef),
    Directory(Directory),
}

#[derive(Debug)]
struct Directory {
    children: BTreeMap<String, Entry>,
    created: SystemTime,
    modified: SystemTime,
}

impl Directory {
    fn new(time: SystemTime) -> Self {
        Self {
            children: BTreeMap::new(),
            created: time,
            modified: time,
        }
    }
}

#[derive(Debug)]
struct Tree {
    root: Directory,
    read_only: BTreeSet<String>,
}

fn lock_file(file: &FileRef) -> MutexGuard<'_, FileData> {
    file.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Tree {
    fn get(&self, path: &str) -> Option<&Entry> {
        let mut dir = &self.root;
        let mut parts = components(path).peekable();
        while let Some(part) = parts.next() {
            let entry = dir.children.get(part)?;
            if parts.peek().is_none() {
                return Some(entry);
            }
            match entry {
                Entry::Directory(child) => dir = child,
                Entry::File(_) => return None,
            }
        }
        None
    }

    fn dir(&self, path: &str) -> Option<&Directory> {
        if path.is_empty() {
            return Some(&self.root);
        }
        match self.get(path)? {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    fn dir_mut(&mut self, path: &str) -> Option<&mut Directory> {
        let mut dir = &mut self.root;
        for part in components(path) {
            match dir.children.get_mut(part)? {
                Entry::Directory(child) => dir = child,
                Entry::File(_) => return None,
            }
        }
        Some(dir)
    }

    /// Parent directory of `path` and the final component.
    fn parent_mut<'a>(&mut self, path: &'a str) -> Option<(&mut Directory, &'a str)> {
        let (parent, name) = split_parent(path);
        Some((self.dir_mut(parent)?, name))
    }

    /// Space charged for everything in the tree, excluding the root itself.
    fn used_space(&self) -> u64 {
        fn walk(dir: &Directory) -> u64 {
            dir.children
                .values()
                .map(|entry| match entry {
                    Entry::File(file) => charged_size(lock_file(file).contents.len() as u64),
                    Entry::Directory(child) => MINIMUM_FILE_SIZE + walk(child),
                })
                .sum()
        }
        walk(&self.root)
    }

    fn is_read_only(&self, path: &str) -> bool {
        self.read_only
            .iter()
            .any(|prefix| crate::path::contains(prefix, path))
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|p| !p.is_empty())
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// An in-memory [`WritableMount`].
///
/// Cloning produces another handle onto the same tree.
#[derive(Debug, Clone)]
pub struct MemoryMount {
    capacity: u64,
    tree: Arc<Mutex<Tree>>,
}

impl Default for MemoryMount {
    fn default() -> Self {
        Self::new(1_000_000_000)
    }
}

impl MemoryMount {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            tree: Arc::new(Mutex::new(Tree {
                root: Directory::new(SystemTime::UNIX_EPOCH),
                read_only: BTreeSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a file, creating parent directories. Intended for seeding mounts;
    /// capacity is not checked.
    pub fn add_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.add_file_with_times(path, contents, SystemTime::UNIX_EPOCH, SystemTime::UNIX_EPOCH)
    }

    pub fn add_file_with_times(
        self,
        path: &str,
        contents: impl Into<Vec<u8>>,
        created: SystemTime,
        modified: SystemTime,
    ) -> Self {
        'seed: {
            let mut tree = self.lock();
            let (parent, name) = split_parent(path);
            let mut dir = &mut tree.root;
            for part in components(parent) {
                let entry = dir
                    .children
                    .entry(part.to_string())
                    .or_insert_with(|| Entry::Directory(Directory::new(SystemTime::UNIX_EPOCH)));
                if let Entry::File(_) = entry {
                    *entry = Entry::Directory(Directory::new(SystemTime::UNIX_EPOCH));
                }
                let Entry::Directory(child) = entry else {
                    break 'seed;
                };
                dir = child;
            }
            dir.children.insert(
                name.to_string(),
                Entry::File(Arc::new(Mutex::new(FileData {
                    contents: contents.into(),
                    created,
                    modified,
                }))),
            );
        }
        self
    }

    /// Mark `path` and everything beneath it read-only.
    pub fn set_read_only(&self, path: &str) {
        self.lock().read_only.insert(path.to_string());
    }

    fn check_writable(tree: &Tree, path: &str) -> Result<()> {
        if tree.is_read_only(path) {
            Err(FileOperationError::new(path, FileErrorKind::AccessDenied))
        } else {
            Ok(())
        }
    }
}

impl Mount for MemoryMount {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(path.is_empty() || self.lock().get(path).is_some())
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        Ok(self.lock().dir(path).is_some())
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let tree = self.lock();
        if path.is_empty() {
            return Ok(tree.root.children.keys().cloned().collect());
        }
        match tree.get(path) {
            Some(Entry::Directory(dir)) => Ok(dir.children.keys().cloned().collect()),
            Some(Entry::File(_)) => Err(FileOperationError::new(path, FileErrorKind::NotADirectory)),
            None => Err(FileOperationError::new(path, FileErrorKind::NoSuchFile)),
        }
    }

    fn size(&self, path: &str) -> Result<u64> {
        Ok(self.attributes(path)?.size)
    }

    fn attributes(&self, path: &str) -> Result<FileAttributes> {
        let tree = self.lock();
        if path.is_empty() {
            return Ok(FileAttributes {
                is_directory: true,
                size: 0,
                created: tree.root.created,
                modified: tree.root.modified,
            });
        }
        match tree.get(path) {
            Some(Entry::Directory(dir)) => Ok(FileAttributes {
                is_directory: true,
                size: 0,
                created: dir.created,
                modified: dir.modified,
            }),
            Some(Entry::File(file)) => {
                let file = lock_file(file);
                Ok(FileAttributes {
                    is_directory: false,
                    size: file.contents.len() as u64,
                    created: file.created,
                    modified: file.modified,
                })
            }
            None => Err(FileOperationError::new(path, FileErrorKind::NoSuchFile)),
        }
    }

    fn open_for_read(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        self.open_file(path, OpenOptions::READ)
    }
}

impl WritableMount for MemoryMount {
    fn make_directory(&self, path: &str) -> Result<()> {
        let mut tree = self.lock();
        if path.is_empty() {
            return Ok(());
        }
        if tree.dir(path).is_some() {
            return Ok(());
        }
        Self::check_writable(&tree, path)?;

        let mut needed = 0;
        {
            let mut dir = Some(&tree.root);
            for part in components(path) {
                dir = match dir.and_then(|d| d.children.get(part)) {
                    Some(Entry::Directory(child)) => Some(child),
                    Some(Entry::File(_)) => {
                        return Err(FileOperationError::new(path, FileErrorKind::FileExists))
                    }
                    None => {
                        needed += 1;
                        None
                    }
                };
            }
        }

        let required = needed * MINIMUM_FILE_SIZE;
        if self.capacity.saturating_sub(tree.used_space()) < required {
            return Err(FileOperationError::new(path, FileErrorKind::OutOfSpace));
        }

        let now = SystemTime::now();
        let mut dir = &mut tree.root;
        for part in components(path) {
            let entry = dir
                .children
                .entry(part.to_string())
                .or_insert_with(|| Entry::Directory(Directory::new(now)));
            match entry {
                Entry::Directory(child) => dir = child,
                Entry::File(_) => {
                    return Err(FileOperationError::new(path, FileErrorKind::FileExists))
                }
            }
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(FileOperationError::new(path, FileErrorKind::AccessDenied));
        }
        let mut tree = self.lock();
        Self::check_writable(&tree, path)?;
        if let Some((parent, name)) = tree.parent_mut(path) {
            parent.children.remove(name);
        }
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        if crate::path::contains(source, dest) {
            return Err(FileOperationError::other(
                Some(source.to_string()),
                "Cannot move a directory inside itself",
            ));
        }

        let mut tree = self.lock();
        Self::check_writable(&tree, source)?;
        Self::check_writable(&tree, dest)?;
        if source.is_empty() || tree.get(source).is_none() {
            return Err(FileOperationError::new(source, FileErrorKind::NoSuchFile));
        }

        let (dest_parent, dest_name) = split_parent(dest);
        match tree.dir(dest_parent) {
            None => {
                return Err(FileOperationError::other(
                    Some(dest.to_string()),
                    "Parent directory does not exist",
                ))
            }
            Some(dir) if dir.children.contains_key(dest_name) => {
                return Err(FileOperationError::new(dest, FileErrorKind::FileExists))
            }
            Some(_) => {}
        }

        let entry = tree
            .parent_mut(source)
            .and_then(|(parent, name)| parent.children.remove(name))
            .ok_or_else(|| FileOperationError::new(source, FileErrorKind::NoSuchFile))?;
        match tree.dir_mut(dest_parent) {
            Some(dir) => {
                dir.children.insert(dest_name.to_string(), entry);
                Ok(())
            }
            None => Err(FileOperationError::new(dest, FileErrorKind::NoSuchFile)),
        }
    }

    fn open_file(&self, path: &str, options: OpenOptions) -> Result<Box<dyn FileChannel>> {
        let mode = options.mode(path)?;
        let creates = mode.writes();

        let directory_error = || {
            FileOperationError::new(
                path,
                if creates {
                    FileErrorKind::CannotWriteToDirectory
                } else {
                    FileErrorKind::NotAFile
                },
            )
        };

        if path.is_empty() {
            return Err(directory_error());
        }

        let mut tree = self.lock();
        if creates {
            Self::check_writable(&tree, path)?;
        }

        let existing = match tree.get(path) {
            Some(Entry::Directory(_)) => return Err(directory_error()),
            Some(Entry::File(file)) => Some(file.clone()),
            None => None,
        };

        let file = match existing {
            Some(file) => {
                if let OpenMode::Write { .. } = mode {
                    let mut data = lock_file(&file);
                    data.contents.clear();
                    data.modified = SystemTime::now();
                }
                file
            }
            None if !creates => {
                return Err(FileOperationError::new(path, FileErrorKind::NoSuchFile))
            }
            None => {
                if self.capacity.saturating_sub(tree.used_space()) < MINIMUM_FILE_SIZE {
                    return Err(FileOperationError::new(path, FileErrorKind::OutOfSpace));
                }
                let (parent, name) = tree
                    .parent_mut(path)
                    .ok_or_else(|| FileOperationError::new(path, FileErrorKind::NoSuchFile))?;
                let now = SystemTime::now();
                let file = Arc::new(Mutex::new(FileData {
                    contents: Vec::new(),
                    created: now,
                    modified: now,
                }));
                parent.children.insert(name.to_string(), Entry::File(file.clone()));
                file
            }
        };

        let position = match mode {
            OpenMode::Append { .. } => lock_file(&file).contents.len() as u64,
            _ => 0,
        };
        let (readable, writable) = match mode {
            OpenMode::Read => (true, false),
            OpenMode::Write { read } | OpenMode::Append { read } => (read, true),
        };

        Ok(Box::new(MemoryChannel {
            tree: self.tree.clone(),
            capacity: self.capacity,
            file,
            position,
            readable,
            writable,
        }))
    }

    fn remaining_space(&self) -> Result<u64> {
        Ok(self.capacity.saturating_sub(self.lock().used_space()))
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn is_read_only(&self, path: &str) -> Result<bool> {
        Ok(self.lock().is_read_only(path))
    }
}

/// An open handle onto a [`MemoryMount`] file.
///
/// Handles keep working after the file is deleted, but writes to a deleted
/// file are no longer charged against the mount.
struct MemoryChannel {
    tree: Arc<Mutex<Tree>>,
    capacity: u64,
    file: FileRef,
    position: u64,
    readable: bool,
    writable: bool,
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.readable {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "File is not readable"));
        }
        let data = lock_file(&self.file);
        let len = data.contents.len() as u64;
        if self.position >= len {
            return Ok(0);
        }
        let start = self.position as usize;
        let n = buf.len().min(data.contents.len() - start);
        buf[..n].copy_from_slice(&data.contents[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "File is not writable"));
        }
        let end = match self.position.checked_add(buf.len() as u64) {
            Some(end) if end <= MAX_FILE_SIZE => end,
            _ => return Err(io::Error::other("File is too large")),
        };

        let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = self.capacity.saturating_sub(tree.used_space());
        let mut data = lock_file(&self.file);
        let charge = growth_charge(data.contents.len() as u64, self.position, buf.len() as u64);
        if charge > remaining {
            tracing::debug!(charge, remaining, "memory mount out of space");
            return Err(FileOperationError::from_kind(FileErrorKind::OutOfSpace).into_io());
        }

        let start = self.position as usize;
        if data.contents.len() < end as usize {
            data.contents.resize(end as usize, 0);
        }
        data.contents[start..end as usize].copy_from_slice(buf);
        data.modified = SystemTime::now();
        self.position = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = lock_file(&self.file).contents.len() as i128;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(n) => len + n as i128,
            SeekFrom::Current(n) => self.position as i128 + n as i128,
        };
        self.position = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "Cannot seek outside the stream")
        })?;
        Ok(self.position)
    }
}
