//! Event system for UI decoupling.
//!
//! Allows CLI/GUI front ends to follow a tag operation without
//! tight coupling to the core logic.

use std::fmt;

use crate::error::ErrorKind;
use crate::transport::NfcTech;

/// Tag operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOperation {
    Read,
    Write,
}

impl fmt::Display for TagOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagOperation::Read => write!(f, "read"),
            TagOperation::Write => write!(f, "write"),
        }
    }
}

/// Events emitted by a `TagService`.
#[derive(Debug, Clone)]
pub enum TagEvent {
    /// Capability check finished.
    CapabilityInitialized { supported: bool },
    /// Exclusive technology session acquired.
    SessionOpened { tech: NfcTech },
    /// Technology session released.
    SessionClosed,
    /// One key tried against the sector.
    AuthAttempt {
        sector: u8,
        key_index: usize,
        accepted: bool,
    },
    /// Block transferred from the tag.
    BlockRead { block: u8, data: Vec<u8> },
    /// Block transferred to the tag.
    BlockWritten { block: u8 },
    /// Readback matched what was written.
    WriteVerified { block: u8 },
    /// Operation finished successfully.
    Completed { operation: TagOperation },
    /// Operation failed.
    Failed {
        operation: TagOperation,
        kind: ErrorKind,
        message: String,
    },
}

/// Observer trait for receiving tag events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait TagObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &TagEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl TagObserver for NullObserver {
    fn on_event(&self, _event: &TagEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl TagObserver for TracingObserver {
    fn on_event(&self, event: &TagEvent) {
        match event {
            TagEvent::CapabilityInitialized { supported } => {
                tracing::info!(supported, "NFC capability initialized");
            }
            TagEvent::SessionOpened { tech } => {
                tracing::debug!(tech = %tech, "Session opened");
            }
            TagEvent::SessionClosed => {
                tracing::debug!("Session closed");
            }
            TagEvent::AuthAttempt {
                sector,
                key_index,
                accepted,
            } => {
                tracing::debug!(sector, key_index, accepted, "Authentication attempt");
            }
            TagEvent::BlockRead { block, data } => {
                tracing::trace!(block, len = data.len(), "Block read");
            }
            TagEvent::BlockWritten { block } => {
                tracing::trace!(block, "Block written");
            }
            TagEvent::WriteVerified { block } => {
                tracing::debug!(block, "Write verified");
            }
            TagEvent::Completed { operation } => {
                tracing::info!(operation = %operation, "Tag operation complete");
            }
            TagEvent::Failed {
                operation,
                kind,
                message,
            } => {
                tracing::warn!(operation = %operation, kind = %kind, "Tag operation failed: {}", message);
            }
        }
    }
}
