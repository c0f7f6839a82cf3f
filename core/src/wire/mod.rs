//! Wire format — compact record encoding shared by every message kind
//!
//! This module provides:
//! - RecordWriter/RecordReader: length-prefixed key/value field records,
//!   consumed strictly left-to-right
//! - WireFrame: transport framing with length, message kind, and CRC32
//! - Typed messages: StateAdvertisement and GraphUpdate, one record
//!   grammar per message kind
//!
//! Format progression:
//! 1. Fields: `[key_len u8][key][value_len u32 LE][value]`, values are
//!    UTF-8 (numbers as decimal text)
//! 2. A message is a flat field sequence; repetition is expressed with an
//!    up-front count field and nested records carried as field values
//! 3. WireFrame wraps the encoded message for transport

pub mod frame;
pub mod messages;
pub mod record;

pub use frame::{MessageKind, WireFrame};
pub use messages::{
    decode_exec_params, encode_exec_params, DataDecl, GraphUpdate, PeerReport,
    StateAdvertisement, TaskDecl, MAX_PAYLOAD,
};
pub use record::{decode, encode, RecordReader, RecordWriter};

use thiserror::Error;

/// Wire codec errors — any of these classifies the message as malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer too short: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    #[error("expected field '{expected}', found '{found}'")]
    KeyMismatch { expected: String, found: String },

    #[error("field '{key}' is not valid UTF-8")]
    BadText { key: String },

    #[error("field '{key}' holds '{value}', expected a decimal number")]
    BadNumber { key: String, value: String },

    #[error("key too long: {0} bytes (max 255)")]
    KeyTooLong(usize),

    #[error("payload too large: {got} bytes (max {max})")]
    Oversize { got: usize, max: usize },

    #[error("invalid message kind: {0:#04x}")]
    InvalidKind(u8),

    #[error("CRC32 mismatch")]
    CrcMismatch,

    #[error("count field '{key}' declares {declared} entries (max {max})")]
    CountOutOfRange { key: String, declared: u64, max: u64 },
}
