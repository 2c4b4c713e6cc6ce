//! Runtime support for code generated by idlgen
//!
//! This crate provides the types generated marshal, invoke and error-check
//! code relies on:
//!
//! - [`TransportErrorKind`], the backend-independent error classification
//!   generated error checks branch on
//! - per-backend raw status classification in [`status`]
//! - [`MessageBuffer`], the message buffer with word and sequence access
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Example
//!
//! ```
//! use idl_rt::{LengthEncoding, MessageBuffer};
//!
//! let mut buf = MessageBuffer::new(64, 4);
//! buf.put_word(0, 0x1001).unwrap();
//! let next = buf.put_sequence(4, b"ping", 1, LengthEncoding::Prefixed).unwrap();
//! assert_eq!(next, 12);
//! ```

pub mod buffer;
pub mod error;
pub mod status;

// Re-export commonly used items
pub use buffer::{round_up, LengthEncoding, MessageBuffer};
pub use error::{Result, RtError, TransportErrorKind};
pub use status::TransferPhase;
