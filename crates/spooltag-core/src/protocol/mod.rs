//! Protocol module - spool tag layout and reader command definitions.

pub mod apdu;
pub mod block;
pub mod constants;
pub mod key;

pub use apdu::{StatusWord, StorageCard};
pub use block::{BlockError, TagBlock, ValidationError, sector_to_block};
pub use constants::*;
pub use key::AuthKey;
