//! spooltag-core: filament spool RFID tag codec and session protocol.
//!
//! Reads and writes the configuration block that 3D-printer filament spools
//! carry on a MIFARE Classic tag: material, color and manufacturer codes
//! packed into the first three bytes of the first block of sector 1.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Lookup**: Static code → name tables for materials, colors, manufacturers
//! - **Protocol**: Block layout codec, sector geometry, keys, reader APDUs
//! - **Transport**: NFC hardware abstraction (PC/SC, mock)
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: Authentication, read and verified write
//!
//! # Example
//!
//! ```no_run
//! use spooltag_core::session::{SessionConfig, TagService};
//! use spooltag_core::transport::PcscTransport;
//!
//! let service = TagService::new(PcscTransport::new(None), SessionConfig::default());
//! if service.initialize_capability() {
//!     let written = service.write(5, 12, 1);
//!     assert!(written.success, "{:?}", written.error);
//! }
//! ```

pub mod error;
pub mod events;
pub mod lookup;
pub mod protocol;
pub mod record;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::{ErrorKind, TagError};
pub use events::{NullObserver, TagEvent, TagObserver, TagOperation, TracingObserver};
pub use lookup::{CodeEntry, find_by_code, name_for};
pub use protocol::{AUTH_KEYS, AuthKey, TagBlock, ValidationError};
pub use record::{TagRecord, TagResponse};
pub use session::{SessionConfig, TagService};
pub use transport::{MockTag, NfcTech, NfcTransport, PcscTransport, TransportError};
