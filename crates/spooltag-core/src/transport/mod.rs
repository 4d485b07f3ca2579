//! Transport layer module.

pub mod mock;
pub mod pcsc;
pub mod traits;

pub use mock::{MockCall, MockTag};
pub use self::pcsc::PcscTransport;
pub use traits::{NfcTech, NfcTransport, TransportError};
