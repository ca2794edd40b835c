//! Chunked file uploads from a client to a computer.
//!
//! The client splits its files into packets with [`UploadFileMessage::split`].
//! The first packet lists every file's name, size and checksum, and every
//! packet carries slices of file contents. The receiving side reassembles
//! them with an [`UploadReceiver`], then checks the checksums.

use bytes::{Buf, BufMut, Bytes};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ProtocolError, Result, UploadError};
use crate::wire::{
    ensure, read_bytes, read_length, read_u16, read_u8, read_string, write_length, write_string,
};

pub const MAX_PACKET_SIZE: usize = 30 * 1024;
/// The upload id and flag.
pub const HEADER_SIZE: usize = 16 + 1;
pub const MAX_FILES: usize = 32;
pub const MAX_FILE_NAME: usize = 128;
pub const CHECKSUM_LENGTH: usize = 32;

pub const FLAG_FIRST: u8 = 1;
pub const FLAG_LAST: u8 = 2;

/// Worst-case overhead of one slice: file id, offset varint and length.
const SLICE_HEADER_SIZE: usize = 1 + 5 + 2;

/// Worst-case overhead of one file entry, excluding its name.
const FILE_HEADER_SIZE: usize = 2 + 5 + CHECKSUM_LENGTH;

/// Limits the receiving side places on an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Largest total size of all files in one upload.
    pub max_size: usize,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_size: 512 * 1024,
            max_files: MAX_FILES,
        }
    }
}

/// A file being uploaded, with the checksum of its intended contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    name: String,
    contents: Vec<u8>,
    checksum: [u8; CHECKSUM_LENGTH],
}

impl FileUpload {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        let contents = contents.into();
        let checksum = Sha256::digest(&contents).into();
        Self {
            name: name.into(),
            contents,
            checksum,
        }
    }

    /// A zero-filled file awaiting its slices.
    fn declared(name: String, size: usize, checksum: [u8; CHECKSUM_LENGTH]) -> Self {
        Self {
            name,
            contents: vec![0; size],
            checksum,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn checksum(&self) -> &[u8; CHECKSUM_LENGTH] {
        &self.checksum
    }

    pub fn checksum_matches(&self) -> bool {
        <[u8; CHECKSUM_LENGTH]>::from(Sha256::digest(&self.contents)) == self.checksum
    }

    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }
}

/// Part of one file's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSlice {
    pub file_id: u8,
    pub offset: usize,
    pub bytes: Bytes,
}

impl FileSlice {
    /// Copy this slice into its file. Slices outside the declared file are
    /// rejected.
    pub fn apply(&self, files: &mut [FileUpload]) -> std::result::Result<(), UploadError> {
        let invalid = || UploadError::InvalidSlice {
            file_id: self.file_id,
            offset: self.offset,
            length: self.bytes.len(),
        };
        let file = files.get_mut(usize::from(self.file_id)).ok_or_else(invalid)?;
        let end = self.offset.checked_add(self.bytes.len()).ok_or_else(invalid)?;
        let target = file.contents.get_mut(self.offset..end).ok_or_else(invalid)?;
        target.copy_from_slice(&self.bytes);
        Ok(())
    }
}

/// One packet of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileMessage {
    pub id: Uuid,
    pub flag: u8,
    /// Declared files. Only sent, and only non-empty, on the first packet.
    pub files: Vec<FileUpload>,
    pub slices: Vec<FileSlice>,
}

impl UploadFileMessage {
    pub fn is_first(&self) -> bool {
        self.flag & FLAG_FIRST != 0
    }

    pub fn is_last(&self) -> bool {
        self.flag & FLAG_LAST != 0
    }

    /// Split `files` into packets of at most [`MAX_PACKET_SIZE`] bytes.
    ///
    /// Every packet but the last is filled. The file list in the first
    /// packet counts against its size.
    pub fn split(id: Uuid, files: &[FileUpload]) -> Result<Vec<UploadFileMessage>> {
        if files.len() > MAX_FILES {
            return Err(ProtocolError::TooManyFiles {
                count: files.len(),
                max: MAX_FILES,
            });
        }

        let packet = |flag, files: Vec<FileUpload>, slices| UploadFileMessage {
            id,
            flag,
            files,
            slices,
        };
        let mut packets = Vec::new();
        let mut remaining = MAX_PACKET_SIZE - HEADER_SIZE;
        for file in files {
            remaining = remaining.saturating_sub(FILE_HEADER_SIZE + file.name.len());
        }

        let mut slices = Vec::new();
        for (file_id, file) in files.iter().enumerate() {
            let contents = Bytes::copy_from_slice(&file.contents);
            let mut offset = 0;
            while offset < contents.len() {
                if remaining <= SLICE_HEADER_SIZE {
                    let (flag, declared) = if packets.is_empty() {
                        (FLAG_FIRST, files.to_vec())
                    } else {
                        (0, Vec::new())
                    };
                    packets.push(packet(flag, declared, std::mem::take(&mut slices)));
                    remaining = MAX_PACKET_SIZE - HEADER_SIZE;
                }

                let length = (remaining - SLICE_HEADER_SIZE).min(contents.len() - offset);
                slices.push(FileSlice {
                    file_id: file_id as u8,
                    offset,
                    bytes: contents.slice(offset..offset + length),
                });
                offset += length;
                remaining -= SLICE_HEADER_SIZE + length;
            }
        }

        let (flag, declared) = if packets.is_empty() {
            (FLAG_FIRST | FLAG_LAST, files.to_vec())
        } else {
            (FLAG_LAST, Vec::new())
        };
        packets.push(packet(flag, declared, slices));
        Ok(packets)
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_slice(self.id.as_bytes());
        buf.put_u8(self.flag);

        if self.is_first() {
            write_length(buf, self.files.len())?;
            for file in &self.files {
                write_string(buf, &file.name, MAX_FILE_NAME)?;
                write_length(buf, file.len())?;
                buf.put_slice(&file.checksum);
            }
        }

        write_length(buf, self.slices.len())?;
        for slice in &self.slices {
            let length =
                u16::try_from(slice.bytes.len()).map_err(|_| ProtocolError::SliceTooLarge(slice.bytes.len()))?;
            buf.put_u8(slice.file_id);
            write_length(buf, slice.offset)?;
            buf.put_u16(length);
            buf.put_slice(&slice.bytes);
        }
        Ok(())
    }

    /// Decode a packet, rejecting any which would exceed `limits`.
    ///
    /// Files on the first packet are zero-filled to their declared size.
    pub fn decode(buf: &mut impl Buf, limits: &UploadLimits) -> Result<Self> {
        ensure(buf, 16)?;
        let mut id = [0; 16];
        buf.copy_to_slice(&mut id);
        let id = Uuid::from_bytes(id);

        let flag = read_u8(buf)?;
        if flag & !(FLAG_FIRST | FLAG_LAST) != 0 {
            return Err(ProtocolError::BadFlags(flag));
        }

        let mut files = Vec::new();
        if flag & FLAG_FIRST != 0 {
            let count = read_length(buf)?;
            let max = limits.max_files.min(MAX_FILES);
            if count > max {
                return Err(ProtocolError::TooManyFiles { count, max });
            }

            let mut total: usize = 0;
            for _ in 0..count {
                let name = read_string(buf, MAX_FILE_NAME)?;
                let size = read_length(buf)?;
                total = total.saturating_add(size);
                if size > limits.max_size || total > limits.max_size {
                    return Err(ProtocolError::FilesTooLarge);
                }

                ensure(buf, CHECKSUM_LENGTH)?;
                let mut checksum = [0; CHECKSUM_LENGTH];
                buf.copy_to_slice(&mut checksum);
                files.push(FileUpload::declared(name, size, checksum));
            }
        }

        let count = read_length(buf)?;
        let mut slices = Vec::new();
        for _ in 0..count {
            let file_id = read_u8(buf)?;
            let offset = read_length(buf)?;
            let length = usize::from(read_u16(buf)?);
            if length > MAX_PACKET_SIZE {
                return Err(ProtocolError::SliceTooLarge(length));
            }
            slices.push(FileSlice {
                file_id,
                offset,
                bytes: read_bytes(buf, length)?,
            });
        }

        Ok(Self {
            id,
            flag,
            files,
            slices,
        })
    }
}

/// An upload being reassembled on the receiving side.
#[derive(Debug)]
pub struct UploadSession {
    id: Uuid,
    files: Vec<FileUpload>,
}

impl UploadSession {
    /// Begin an upload from its first packet. The packet's slices are not
    /// applied.
    pub fn start(message: UploadFileMessage) -> std::result::Result<Self, UploadError> {
        if !message.is_first() {
            warn!(upload = %message.id, "upload does not start with a file list");
            return Err(UploadError::MissingFiles);
        }
        Ok(Self {
            id: message.id,
            files: message.files,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn files(&self) -> &[FileUpload] {
        &self.files
    }

    fn check_id(&self, id: Uuid) -> std::result::Result<(), UploadError> {
        if id == self.id {
            Ok(())
        } else {
            Err(UploadError::WrongUpload {
                expected: self.id,
                got: id,
            })
        }
    }

    pub fn continue_upload(&mut self, id: Uuid, slices: &[FileSlice]) -> std::result::Result<(), UploadError> {
        self.check_id(id).inspect_err(|_| {
            warn!(upload = %id, expected = %self.id, "invalid continue_upload call, skipping");
        })?;
        for slice in slices {
            slice.apply(&mut self.files).inspect_err(|error| {
                warn!(upload = %id, %error, "rejecting upload slice");
            })?;
        }
        Ok(())
    }

    /// Check every checksum and hand back the files.
    pub fn finish(self, id: Uuid) -> std::result::Result<Vec<FileUpload>, UploadError> {
        self.check_id(id).inspect_err(|_| {
            warn!(upload = %id, expected = %self.id, "invalid finish_upload call, skipping");
        })?;
        if self.files.is_empty() {
            warn!(upload = %id, "upload contains no files");
            return Err(UploadError::NoFiles);
        }
        if let Some(file) = self.files.iter().find(|file| !file.checksum_matches()) {
            warn!(upload = %id, file = file.name(), "checksum failed to match");
            return Err(UploadError::ChecksumMismatch(file.name.clone()));
        }
        Ok(self.files)
    }
}

/// Feeds packets into the current upload, if any.
///
/// A new first packet abandons whatever upload was in progress. Any error
/// abandons the current upload.
#[derive(Debug, Default)]
pub struct UploadReceiver {
    session: Option<UploadSession>,
}

impl UploadReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> Option<Uuid> {
        self.session.as_ref().map(UploadSession::id)
    }

    /// Returns the uploaded files once the last packet arrives.
    pub fn receive(
        &mut self,
        mut message: UploadFileMessage,
    ) -> std::result::Result<Option<Vec<FileUpload>>, UploadError> {
        let id = message.id;
        let last = message.is_last();
        let slices = std::mem::take(&mut message.slices);
        if message.is_first() {
            self.session = Some(UploadSession::start(message)?);
        }

        let Some(session) = self.session.as_mut() else {
            warn!(upload = %id, "upload packet arrived before its file list, skipping");
            return Err(UploadError::NotStarted);
        };
        if let Err(error) = session.continue_upload(id, &slices) {
            if !matches!(error, UploadError::WrongUpload { .. }) {
                self.session = None;
            }
            return Err(error);
        }

        if !last {
            return Ok(None);
        }
        let Some(session) = self.session.take() else {
            return Err(UploadError::NotStarted);
        };
        session.finish(id).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<FileUpload> {
        vec![FileUpload::new("a.txt", b"hello".to_vec()), FileUpload::new("b.txt", Vec::new())]
    }

    #[test]
    fn checksum_is_sha256() {
        let file = FileUpload::new("empty", Vec::new());
        assert_eq!(
            file.checksum()[..4],
            [0xe3, 0xb0, 0xc4, 0x42],
            "SHA-256 of the empty string"
        );
        assert!(file.checksum_matches());
    }

    #[test]
    fn slices_outside_the_file_are_rejected() {
        let mut files = vec![FileUpload::declared("a".into(), 4, [0; CHECKSUM_LENGTH])];
        let slice = |file_id, offset, bytes: &'static [u8]| FileSlice {
            file_id,
            offset,
            bytes: Bytes::from_static(bytes),
        };

        slice(0, 1, b"abc").apply(&mut files).unwrap();
        assert_eq!(files[0].contents(), b"\0abc");
        assert!(slice(0, 2, b"abc").apply(&mut files).is_err());
        assert!(slice(1, 0, b"a").apply(&mut files).is_err());
        assert!(slice(0, usize::MAX, b"a").apply(&mut files).is_err());
    }

    #[test]
    fn small_upload_is_one_packet() {
        let packets = UploadFileMessage::split(Uuid::new_v4(), &files()).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].flag, FLAG_FIRST | FLAG_LAST);
        assert_eq!(packets[0].files, files());
        assert_eq!(packets[0].slices.len(), 1, "Empty files have no slices");
    }

    #[test]
    fn bad_flags_are_rejected() {
        let message = UploadFileMessage {
            id: Uuid::nil(),
            flag: 4,
            files: Vec::new(),
            slices: Vec::new(),
        };
        let mut buf = Vec::new();
        message.encode(&mut buf).unwrap();
        assert!(matches!(
            UploadFileMessage::decode(&mut &buf[..], &UploadLimits::default()),
            Err(ProtocolError::BadFlags(4))
        ));
    }

    #[test]
    fn corrupted_upload_fails() {
        let id = Uuid::new_v4();
        let mut packets = UploadFileMessage::split(id, &files()).unwrap();
        let mut message = packets.remove(0);
        message.slices[0].bytes = Bytes::from_static(b"jello");

        let mut receiver = UploadReceiver::new();
        assert_eq!(
            receiver.receive(message),
            Err(UploadError::ChecksumMismatch("a.txt".to_string()))
        );
        assert_eq!(receiver.in_progress(), None);
    }
}
