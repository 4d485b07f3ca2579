//! Tag layout and reader protocol constants.

use std::ops::RangeInclusive;

use super::key::AuthKey;

// ============================================================================
// Spool Tag Layout
// ============================================================================

/// Sector holding the spool configuration block.
pub const TAG_SECTOR: u8 = 1;

/// MIFARE Classic block size in bytes.
pub const BLOCK_SIZE: usize = 16;

pub const MATERIAL_OFFSET: usize = 0;
pub const COLOR_OFFSET: usize = 1;
pub const MANUFACTURER_OFFSET: usize = 2;

/// Number of leading bytes carrying meaning; the rest are reserved.
pub const MEANINGFUL_LEN: usize = 3;

pub const MATERIAL_CODES: RangeInclusive<u32> = 1..=50;
pub const COLOR_CODES: RangeInclusive<u32> = 1..=24;
pub const MANUFACTURER_CODES: RangeInclusive<u32> = 0..=255;

/// Manufacturer code written by factory tags.
pub const DEFAULT_MANUFACTURER: u32 = 1;

/// Keys tried in order against the tag sector: vendor key, then the
/// MIFARE transport default.
pub const AUTH_KEYS: [AuthKey; 2] = [
    AuthKey([0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7]),
    AuthKey([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
];

// ============================================================================
// MIFARE Classic Geometry
// ============================================================================

/// Sectors on the largest (4K) card.
pub const MAX_SECTORS: u8 = 40;

/// Sectors 0..32 hold 4 blocks, the upper sectors of a 4K card hold 16.
pub const SMALL_SECTOR_COUNT: u8 = 32;
pub const BLOCKS_PER_SMALL_SECTOR: u8 = 4;
pub const BLOCKS_PER_LARGE_SECTOR: u8 = 16;

// ============================================================================
// PC/SC Storage Card Commands (PC/SC Part 3)
// ============================================================================

pub const PCSC_CLA: u8 = 0xFF;
pub const INS_LOAD_KEY: u8 = 0x82;
pub const INS_GENERAL_AUTHENTICATE: u8 = 0x86;
pub const INS_READ_BINARY: u8 = 0xB0;
pub const INS_UPDATE_BINARY: u8 = 0xD6;

/// Load key into volatile reader memory.
pub const KEY_STRUCTURE_VOLATILE: u8 = 0x00;
/// Reader key slot used for sector authentication.
pub const DEFAULT_KEY_SLOT: u8 = 0x00;

pub const KEY_TYPE_A: u8 = 0x60;

pub const SW_SUCCESS: u16 = 0x9000;

/// Registered application provider ID of PC/SC storage card ATRs.
pub const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

pub const CARD_NAME_MIFARE_1K: u16 = 0x0001;
pub const CARD_NAME_MIFARE_4K: u16 = 0x0002;
pub const CARD_NAME_MIFARE_MINI: u16 = 0x0026;
