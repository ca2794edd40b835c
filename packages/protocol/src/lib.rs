//! Binary wire formats between a computer and the clients viewing it.
//!
//! - [`terminal`]: terminal contents, raw or as a gzip-compressed
//!   [`TerminalState`]
//! - [`upload`]: files dropped onto a computer, split into bounded packets
//! - [`input`]: key, mouse and power events
//!
//! Everything is written to [`bytes::BufMut`] and read from [`bytes::Buf`].
//!
//! ```
//! use cubicle_protocol::TerminalState;
//! use cubicle_terminal::Terminal;
//!
//! let terminal = Terminal::new(10, 2, true);
//! terminal.write("synced");
//!
//! let mut wire = Vec::new();
//! TerminalState::from_terminal(Some(&terminal), true).encode(&mut wire).unwrap();
//!
//! let copy = TerminalState::decode(&mut &wire[..]).unwrap().create().unwrap();
//! assert_eq!(copy.get_line(0).unwrap().to_string(), "synced    ");
//! ```

mod error;
pub mod input;
pub mod terminal;
pub mod upload;
pub mod wire;

pub use error::{ProtocolError, Result, UploadError};
pub use input::{InputEvent, InputState};
pub use terminal::{read_terminal, write_terminal, TerminalState};
pub use upload::{FileSlice, FileUpload, UploadFileMessage, UploadLimits, UploadReceiver, UploadSession};
