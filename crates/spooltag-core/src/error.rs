//! Tag operation errors.

use std::fmt;

use thiserror::Error;

use crate::protocol::{BlockError, ValidationError};
use crate::transport::TransportError;

/// Coarse classification of a [`TagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// NFC unsupported or disabled. Detected before any session.
    Capability,
    /// Out-of-range input codes. Detected before any session.
    Validation,
    /// Every key was rejected by the tag.
    Authentication,
    /// Session, block read or block write failure.
    Transport,
    /// Readback after write differs; tag state is indeterminate.
    Verification,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Capability => write!(f, "capability"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Verification => write!(f, "verification"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TagError {
    #[error("{0}")]
    Capability(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Authentication failed")]
    Authentication { sector: u8, attempts: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("Write verification failed")]
    Verification {
        block: u8,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },
}

impl TagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TagError::Capability(_) => ErrorKind::Capability,
            TagError::Validation(_) => ErrorKind::Validation,
            TagError::Authentication { .. } => ErrorKind::Authentication,
            TagError::Transport(_) | TagError::Block(_) => ErrorKind::Transport,
            TagError::Verification { .. } => ErrorKind::Verification,
        }
    }

    /// Whether re-presenting the tag and repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Authentication | ErrorKind::Transport
        )
    }
}
