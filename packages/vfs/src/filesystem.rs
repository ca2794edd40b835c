//! A tree of mounts presented as one filesystem.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::error::{FileErrorKind, FileOperationError, Result};
use crate::mount::{FileAttributes, FileChannel, Mount, WritableMount};
use crate::path::{combine, contains, get_directory, get_name, sanitize_path, to_local, wildcard_match};

/// Deepest directory nesting `copy` will follow.
pub const MAX_COPY_DEPTH: usize = 128;

/// A mount attached at a location. Errors leaving the wrapper carry absolute
/// paths.
#[derive(Clone)]
struct MountWrapper {
    label: String,
    location: String,
    mount: Arc<dyn Mount>,
    writable: Option<Arc<dyn WritableMount>>,
}

impl MountWrapper {
    fn local(&self, path: &str) -> String {
        to_local(path, &self.location)
    }

    fn absolute(&self, local: &str) -> String {
        if self.location.is_empty() {
            local.to_string()
        } else if local.is_empty() {
            self.location.clone()
        } else {
            format!("{}/{}", self.location, local)
        }
    }

    /// Re-anchor an error raised by the mount at this wrapper's location.
    fn relabel(&self, local: &str, err: FileOperationError) -> FileOperationError {
        let path = self.absolute(err.path().unwrap_or(local));
        err.with_path(path)
    }

    fn writable(&self, path: &str) -> Result<&Arc<dyn WritableMount>> {
        self.writable
            .as_ref()
            .ok_or_else(|| FileOperationError::new(path, FileErrorKind::AccessDenied))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let local = self.local(path);
        self.mount.exists(&local).map_err(|e| self.relabel(&local, e))
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        let local = self.local(path);
        let result = self.mount.exists(&local).and_then(|exists| {
            if exists {
                self.mount.is_directory(&local)
            } else {
                Ok(false)
            }
        });
        result.map_err(|e| self.relabel(&local, e))
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        if !self.is_directory(path)? {
            return Err(FileOperationError::new(path, FileErrorKind::NotADirectory));
        }
        let local = self.local(path);
        self.mount.list(&local).map_err(|e| self.relabel(&local, e))
    }

    fn size(&self, path: &str) -> Result<u64> {
        if !self.exists(path)? {
            return Err(FileOperationError::new(path, FileErrorKind::NoSuchFile));
        }
        if self.is_directory(path)? {
            return Ok(0);
        }
        let local = self.local(path);
        self.mount.size(&local).map_err(|e| self.relabel(&local, e))
    }

    fn attributes(&self, path: &str) -> Result<FileAttributes> {
        if !self.exists(path)? {
            return Err(FileOperationError::new(path, FileErrorKind::NoSuchFile));
        }
        let local = self.local(path);
        self.mount.attributes(&local).map_err(|e| self.relabel(&local, e))
    }

    fn is_read_only(&self, path: &str) -> Result<bool> {
        match &self.writable {
            None => Ok(true),
            Some(writable) => {
                let local = self.local(path);
                writable.is_read_only(&local).map_err(|e| self.relabel(&local, e))
            }
        }
    }

    fn free_space(&self) -> Result<u64> {
        match &self.writable {
            None => Ok(0),
            Some(writable) => writable.remaining_space().map_err(|e| self.relabel("", e)),
        }
    }

    fn capacity(&self) -> Option<u64> {
        self.writable.as_ref().map(|writable| writable.capacity())
    }

    fn open_for_read(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        if !self.exists(path)? {
            return Err(FileOperationError::new(path, FileErrorKind::NoSuchFile));
        }
        if self.is_directory(path)? {
            return Err(FileOperationError::new(path, FileErrorKind::NotAFile));
        }
        let local = self.local(path);
        self.mount.open_for_read(&local).map_err(|e| self.relabel(&local, e))
    }

    fn make_directory(&self, path: &str) -> Result<()> {
        let writable = self.writable(path)?;
        let local = self.local(path);
        writable.make_directory(&local).map_err(|e| self.relabel(&local, e))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let writable = self.writable(path)?;
        let local = self.local(path);
        writable.delete(&local).map_err(|e| self.relabel(&local, e))
    }

    fn rename(&self, source: &str, dest: &str) -> Result<()> {
        let writable = self.writable(source)?;
        let source = self.local(source);
        let dest = self.local(dest);
        let result = self
            .ensure_parent(writable.as_ref(), &dest)
            .and_then(|()| writable.rename(&source, &dest));
        result.map_err(|e| self.relabel(&source, e))
    }

    fn open_for_write(&self, path: &str, append: bool) -> Result<Box<dyn FileChannel>> {
        let writable = self.writable(path)?;
        let local = self.local(path);
        let result = (|| {
            let exists = self.mount.exists(&local)?;
            if exists && self.mount.is_directory(&local)? {
                return Err(FileOperationError::new(
                    local.as_str(),
                    FileErrorKind::CannotWriteToDirectory,
                ));
            }
            if append && exists {
                writable.open_for_append(&local)
            } else {
                self.ensure_parent(writable.as_ref(), &local)?;
                writable.open_for_write(&local)
            }
        })();
        result.map_err(|e| self.relabel(&local, e))
    }

    /// New files get their parent directories created on demand.
    fn ensure_parent(&self, writable: &dyn WritableMount, local: &str) -> Result<()> {
        if local.is_empty() {
            return Ok(());
        }
        let dir = get_directory(local);
        if !dir.is_empty() && !self.mount.exists(&dir)? {
            writable.make_directory(&dir)?;
        }
        Ok(())
    }
}

/// The filesystem seen by one computer: mounts keyed by their sanitised
/// location, with path lookups resolved against the deepest enclosing mount.
#[derive(Clone, Default)]
pub struct FileSystem {
    mounts: BTreeMap<String, MountWrapper>,
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.mounts.iter().map(|(location, m)| (location, &m.label)))
            .finish()
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A filesystem with a writable mount at the root.
    pub fn with_root<M: WritableMount + 'static>(label: &str, root: Arc<M>) -> Self {
        let mut fs = Self::new();
        fs.insert(label, String::new(), root.clone(), Some(root));
        fs
    }

    pub fn mount<M: Mount + 'static>(
        &mut self,
        label: &str,
        location: &str,
        mount: Arc<M>,
    ) -> Result<()> {
        let location = mount_location(location)?;
        self.insert(label, location, mount, None);
        Ok(())
    }

    pub fn mount_writable<M: WritableMount + 'static>(
        &mut self,
        label: &str,
        location: &str,
        mount: Arc<M>,
    ) -> Result<()> {
        let location = mount_location(location)?;
        self.insert(label, location, mount.clone(), Some(mount));
        Ok(())
    }

    fn insert(
        &mut self,
        label: &str,
        location: String,
        mount: Arc<dyn Mount>,
        writable: Option<Arc<dyn WritableMount>>,
    ) {
        tracing::debug!(label, location = %location, writable = writable.is_some(), "mounting");
        let wrapper = MountWrapper {
            label: label.to_string(),
            location: location.clone(),
            mount,
            writable,
        };
        self.mounts.insert(location, wrapper);
    }

    /// Remove the mount at exactly `location`. Returns whether one was there.
    pub fn unmount(&mut self, location: &str) -> bool {
        let location = sanitize_path(location, false);
        let removed = self.mounts.remove(&location).is_some();
        if removed {
            tracing::debug!(location = %location, "unmounted");
        }
        removed
    }

    fn get_mount(&self, path: &str) -> Result<&MountWrapper> {
        self.mounts
            .values()
            .filter(|m| contains(&m.location, path))
            .min_by_key(|m| to_local(path, &m.location).len())
            .ok_or_else(|| FileOperationError::other(Some(path.to_string()), "Invalid Path"))
    }

    pub fn get_mount_label(&self, path: &str) -> Result<String> {
        let path = sanitize_path(path, false);
        Ok(self.get_mount(&path)?.label.clone())
    }

    /// Directory contents, including any mounts attached directly beneath
    /// `path`. Sorted.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let path = sanitize_path(path, false);
        let mut list = self.get_mount(&path)?.list(&path)?;
        for location in self.mounts.keys() {
            if !location.is_empty() && get_directory(location) == path {
                list.push(get_name(location));
            }
        }
        list.sort();
        list.dedup();
        Ok(list)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.exists(&path)
    }

    pub fn is_directory(&self, path: &str) -> Result<bool> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.is_directory(&path)
    }

    pub fn is_read_only(&self, path: &str) -> Result<bool> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.is_read_only(&path)
    }

    pub fn size(&self, path: &str) -> Result<u64> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.size(&path)
    }

    pub fn attributes(&self, path: &str) -> Result<FileAttributes> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.attributes(&path)
    }

    pub fn make_directory(&self, path: &str) -> Result<()> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.make_directory(&path)
    }

    /// Delete a file or directory tree. Mount roots, and directories holding
    /// another mount, cannot be deleted.
    pub fn delete(&self, path: &str) -> Result<()> {
        let path = sanitize_path(path, false);
        let mount = self.get_mount(&path)?;
        if self.holds_mount(&path) {
            return Err(FileOperationError::new(path, FileErrorKind::AccessDenied));
        }
        mount.delete(&path)
    }

    fn holds_mount(&self, path: &str) -> bool {
        self.mounts.keys().any(|location| contains(path, location))
    }

    pub fn move_path(&self, source: &str, dest: &str) -> Result<()> {
        let source = sanitize_path(source, false);
        let dest = sanitize_path(dest, false);

        if self.is_read_only(&source)? || self.is_read_only(&dest)? || self.holds_mount(&source) {
            return Err(FileOperationError::from_kind(FileErrorKind::AccessDenied));
        }
        if !self.exists(&source)? {
            return Err(FileOperationError::from_kind(FileErrorKind::NoSuchFile));
        }
        if self.exists(&dest)? {
            return Err(FileOperationError::from_kind(FileErrorKind::FileExists));
        }
        if contains(&source, &dest) {
            return Err(FileOperationError::other(None, "Can't move a directory inside itself"));
        }

        let source_mount = self.get_mount(&source)?;
        let dest_mount = self.get_mount(&dest)?;
        if source_mount.location == dest_mount.location {
            source_mount.rename(&source, &dest)
        } else {
            self.copy(&source, &dest)?;
            self.delete(&source)
        }
    }

    /// Copy a file or directory tree, possibly between mounts.
    pub fn copy(&self, source: &str, dest: &str) -> Result<()> {
        let source = sanitize_path(source, false);
        let dest = sanitize_path(dest, false);

        if self.is_read_only(&dest)? {
            return Err(FileOperationError::new(dest, FileErrorKind::AccessDenied));
        }
        if !self.exists(&source)? {
            return Err(FileOperationError::new(source, FileErrorKind::NoSuchFile));
        }
        if self.exists(&dest)? {
            return Err(FileOperationError::new(dest, FileErrorKind::FileExists));
        }
        if contains(&source, &dest) {
            return Err(FileOperationError::other(
                Some(source),
                "Can't copy a directory inside itself",
            ));
        }

        let source_mount = self.get_mount(&source)?;
        let dest_mount = self.get_mount(&dest)?;
        copy_recursive(&source, source_mount, &dest, dest_mount, 0)
    }

    pub fn open_for_read(&self, path: &str) -> Result<Box<dyn FileChannel>> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.open_for_read(&path)
    }

    /// Open a file for writing, truncating it unless `append` is set.
    pub fn open_for_write(&self, path: &str, append: bool) -> Result<Box<dyn FileChannel>> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.open_for_write(&path, append)
    }

    /// Free space on the mount holding `path`. Zero for read-only mounts.
    pub fn get_free_space(&self, path: &str) -> Result<u64> {
        let path = sanitize_path(path, false);
        self.get_mount(&path)?.free_space()
    }

    /// Capacity of the mount holding `path`, if it is writable.
    pub fn get_capacity(&self, path: &str) -> Result<Option<u64>> {
        let path = sanitize_path(path, false);
        Ok(self.get_mount(&path)?.capacity())
    }

    /// All paths matching a pattern where `*` and `?` match within a single
    /// path component. Sorted.
    pub fn find(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = sanitize_path(pattern, true);
        let Some(first_wildcard) = pattern.find(|c: char| c == '*' || c == '?') else {
            return Ok(if self.exists(&pattern)? {
                vec![pattern]
            } else {
                Vec::new()
            });
        };

        let start = match pattern[..first_wildcard].rfind('/') {
            Some(i) => &pattern[..i],
            None => "",
        };
        if !self.is_directory(start)? {
            return Ok(Vec::new());
        }

        let pattern: Vec<&str> = pattern.split('/').collect();
        let mut matches = Vec::new();
        self.find_in(start, &pattern, &mut matches)?;
        matches.sort();
        Ok(matches)
    }

    fn find_in(&self, dir: &str, pattern: &[&str], matches: &mut Vec<String>) -> Result<()> {
        for entry in self.list(dir)? {
            let entry_path = combine(dir, &entry);
            let depth = entry_path.split('/').count();
            if depth == pattern.len() && glob_matches(pattern, &entry_path) {
                matches.push(entry_path.clone());
            }
            if depth < pattern.len() && self.is_directory(&entry_path)? {
                self.find_in(&entry_path, pattern, matches)?;
            }
        }
        Ok(())
    }
}

fn mount_location(location: &str) -> Result<String> {
    let location = sanitize_path(location, false);
    if location.split('/').any(|part| part == "..") {
        return Err(FileOperationError::other(None, "Cannot mount below the root"));
    }
    Ok(location)
}

fn glob_matches(pattern: &[&str], path: &str) -> bool {
    path.split('/')
        .zip(pattern)
        .all(|(name, pattern)| wildcard_match(pattern, name))
}

fn copy_recursive(
    source: &str,
    source_mount: &MountWrapper,
    dest: &str,
    dest_mount: &MountWrapper,
    depth: usize,
) -> Result<()> {
    if !source_mount.exists(source)? {
        return Ok(());
    }
    if depth >= MAX_COPY_DEPTH {
        return Err(FileOperationError::other(None, "Too many directories to copy"));
    }

    if source_mount.is_directory(source)? {
        dest_mount.make_directory(dest)?;
        for child in source_mount.list(source)? {
            copy_recursive(
                &combine(source, &child),
                source_mount,
                &combine(dest, &child),
                dest_mount,
                depth + 1,
            )?;
        }
    } else {
        let mut reader = source_mount.open_for_read(source)?;
        let mut writer = dest_mount.open_for_write(dest, false)?;
        io::copy(&mut reader, &mut writer)
            .map_err(|e| FileOperationError::from(e).or_path(dest))?;
    }
    Ok(())
}
