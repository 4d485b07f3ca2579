//! NFC transport layer abstraction.
//!
//! Defines the `NfcTransport` trait for MIFARE Classic access,
//! allowing different implementations (PC/SC, mock, etc.).

use std::fmt;

use thiserror::Error;

use crate::protocol::{AuthKey, BLOCK_SIZE, BlockError, StatusWord, sector_to_block};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("NFC is not supported: {0}")]
    NotSupported(String),

    #[error("NFC subsystem not started")]
    NotStarted,

    #[error("No NFC reader available")]
    NoReader,

    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    #[error("No tag present on the reader")]
    TagNotPresent,

    #[error("Tag is not a {expected} tag")]
    UnsupportedTag { expected: NfcTech },

    #[error("No technology session is open")]
    SessionNotOpen,

    #[error("Another technology session is already open")]
    SessionBusy,

    #[error("Key rejected for sector {sector}")]
    AuthRejected { sector: u8 },

    #[error("Reader command failed: {0}")]
    CommandFailed(StatusWord),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Tag lost during transfer")]
    TagLost,

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("PC/SC error: {0}")]
    Pcsc(String),
}

/// Tag technologies a transport can open sessions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcTech {
    MifareClassic,
}

impl fmt::Display for NfcTech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NfcTech::MifareClassic => write!(f, "MIFARE Classic"),
        }
    }
}

/// Abstract NFC hardware interface.
///
/// A technology session is exclusive: between `request_technology` and
/// `cancel_technology_request` no other caller may talk to the tag.
pub trait NfcTransport: Send + Sync {
    /// Whether NFC hardware exists at all.
    fn is_supported(&self) -> Result<bool, TransportError>;

    /// Bring the NFC subsystem up. Called once per process.
    fn start(&self) -> Result<(), TransportError>;

    /// Whether NFC is currently switched on / has a reader attached.
    fn is_enabled(&self) -> Result<bool, TransportError>;

    /// Whether this platform can open sessions for `tech`.
    fn supports_technology(&self, tech: NfcTech) -> bool;

    /// Acquire an exclusive session on the presented tag.
    fn request_technology(&self, tech: NfcTech) -> Result<(), TransportError>;

    /// Release the current session. Must be safe to call without one.
    fn cancel_technology_request(&self) -> Result<(), TransportError>;

    /// Authenticate `sector` with `key` in Key A mode.
    fn authenticate_sector_key_a(&self, sector: u8, key: &AuthKey) -> Result<(), TransportError>;

    /// First block address of `sector`.
    fn sector_to_block(&self, sector: u8) -> Result<u8, TransportError> {
        Ok(sector_to_block(sector)?)
    }

    /// Read one 16-byte block.
    fn read_block(&self, block: u8) -> Result<Vec<u8>, TransportError>;

    /// Write one 16-byte block.
    fn write_block(&self, block: u8, data: &[u8; BLOCK_SIZE]) -> Result<(), TransportError>;
}
