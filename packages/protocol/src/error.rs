//! Error types for decoding messages and assembling uploads.

use std::io;

use cubicle_terminal::TerminalError;
use thiserror::Error;
use uuid::Uuid;

/// A message could not be encoded or decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of input ({needed} more bytes needed)")]
    Truncated { needed: usize },

    #[error("varint is longer than 5 bytes")]
    VarIntTooLong,

    #[error("negative length {0}")]
    NegativeLength(i32),

    /// A value too large to fit its field on the wire.
    #[error("{0} does not fit in its wire field")]
    Overflow(usize),

    #[error("string is too long ({length} > {max})")]
    StringTooLong { length: usize, max: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("{0:#x} is not a valid character")]
    InvalidChar(u32),

    #[error("too many files ({count} > {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("files are too large")]
    FilesTooLarge,

    #[error("slice of {0} bytes is too large")]
    SliceTooLarge(usize),

    #[error("unknown upload flags {0:#x}")]
    BadFlags(u8),

    #[error("unknown input event {0}")]
    UnknownEvent(u8),

    #[error("terminal payload is {actual} bytes, expected {expected}")]
    TerminalSize { expected: usize, actual: usize },

    #[error("terminal state does not hold a terminal")]
    NoTerminal,

    #[error(transparent)]
    Terminal(#[from] TerminalError),

    #[error("compression failed: {0}")]
    Compression(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// An upload was abandoned on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("no upload is in progress")]
    NotStarted,

    #[error("packet is for upload {got}, but {expected} is in progress")]
    WrongUpload { expected: Uuid, got: Uuid },

    #[error("upload does not start with a file list")]
    MissingFiles,

    #[error("upload contains no files")]
    NoFiles,

    #[error("invalid slice for file {file_id} ({length} bytes at offset {offset})")]
    InvalidSlice {
        file_id: u8,
        offset: usize,
        length: usize,
    },

    #[error("checksum failed to match for {0}")]
    ChecksumMismatch(String),
}
