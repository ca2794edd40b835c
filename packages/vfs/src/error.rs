//! The single error type for filesystem operations.

use std::io;

use thiserror::Error;

/// The fixed vocabulary of failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileErrorKind {
    NoSuchFile,
    NotADirectory,
    NotAFile,
    AccessDenied,
    FileExists,
    CannotWriteToDirectory,
    OutOfSpace,
    UnsupportedMode,
}

impl FileErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            FileErrorKind::NoSuchFile => "No such file",
            FileErrorKind::NotADirectory => "Not a directory",
            FileErrorKind::NotAFile => "Not a file",
            FileErrorKind::AccessDenied => "Access denied",
            FileErrorKind::FileExists => "File exists",
            FileErrorKind::CannotWriteToDirectory => "Cannot write to directory",
            FileErrorKind::OutOfSpace => "Out of space",
            FileErrorKind::UnsupportedMode => "Unsupported mode",
        }
    }
}

/// A failed filesystem operation.
///
/// Carries the offending path (mount-relative when raised by a mount, absolute
/// once it has passed through a [`crate::FileSystem`]) and a human readable
/// reason. `kind` is set when the reason is one of the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.path, .message))]
pub struct FileOperationError {
    path: Option<String>,
    kind: Option<FileErrorKind>,
    message: String,
}

fn render(path: &Option<String>, message: &str) -> String {
    match path {
        Some(path) => format!("/{}: {}", path, message),
        None => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, FileOperationError>;

impl FileOperationError {
    pub fn new(path: impl Into<String>, kind: FileErrorKind) -> Self {
        Self {
            path: Some(path.into()),
            kind: Some(kind),
            message: kind.message().to_string(),
        }
    }

    /// An error with no associated path.
    pub fn from_kind(kind: FileErrorKind) -> Self {
        Self {
            path: None,
            kind: Some(kind),
            message: kind.message().to_string(),
        }
    }

    /// An error with a free-form reason.
    pub fn other(path: Option<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            kind: None,
            message: message.into(),
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn kind(&self) -> Option<FileErrorKind> {
        self.kind
    }

    /// The reason, without the path prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replace the path this error refers to.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach `path` only when the error does not already name one.
    pub fn or_path(self, path: &str) -> Self {
        if self.path.is_some() {
            self
        } else {
            self.with_path(path)
        }
    }

    /// Wrap into an `io::Error` for use inside channel implementations.
    pub fn into_io(self) -> io::Error {
        let kind = match self.kind {
            Some(FileErrorKind::NoSuchFile) => io::ErrorKind::NotFound,
            Some(FileErrorKind::AccessDenied) => io::ErrorKind::PermissionDenied,
            Some(FileErrorKind::FileExists) => io::ErrorKind::AlreadyExists,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

impl From<io::Error> for FileOperationError {
    fn from(error: io::Error) -> Self {
        let kind = error.kind();
        match error.into_inner() {
            Some(inner) => match inner.downcast::<FileOperationError>() {
                Ok(file_error) => *file_error,
                Err(inner) => Self::from_io_kind(kind, Some(inner.to_string())),
            },
            None => Self::from_io_kind(kind, None),
        }
    }
}

impl FileOperationError {
    fn from_io_kind(kind: io::ErrorKind, message: Option<String>) -> Self {
        let mapped = match kind {
            io::ErrorKind::NotFound => Some(FileErrorKind::NoSuchFile),
            io::ErrorKind::PermissionDenied => Some(FileErrorKind::AccessDenied),
            io::ErrorKind::AlreadyExists => Some(FileErrorKind::FileExists),
            _ => None,
        };
        match (mapped, message) {
            (Some(kind), _) => Self::from_kind(kind),
            (None, Some(message)) => Self::other(None, message),
            (None, None) => Self::other(None, kind.to_string()),
        }
    }
}
