//! Spool configuration block codec.
//!
//! Layout of the 16-byte block:
//!
//! | offset | field             |
//! |--------|-------------------|
//! | 0      | material code     |
//! | 1      | color code        |
//! | 2      | manufacturer code |
//! | 3..16  | reserved          |
//!
//! Reserved bytes are zero-filled on encode and ignored on decode.

use byteorder::ReadBytesExt;
use std::io::Cursor;
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Block too small: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("Invalid sector {sector}: MIFARE Classic has at most 40 sectors")]
    InvalidSector { sector: u8 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Out-of-range input codes, rejected before any hardware access.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Material code must be between 1 and 50")]
    MaterialCode(u32),
    #[error("Color code must be between 1 and 24")]
    ColorCode(u32),
    #[error("Manufacturer code must be between 0 and 255")]
    ManufacturerCode(u32),
}

/// The three meaningful bytes of a spool block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagBlock {
    pub material_code: u8,
    pub color_code: u8,
    pub manufacturer_code: u8,
}

impl TagBlock {
    pub const SIZE: usize = BLOCK_SIZE;

    /// Validate caller-supplied codes and build a block.
    pub fn new(material: u32, color: u32, manufacturer: u32) -> Result<Self, ValidationError> {
        let material_code = checked(material, &MATERIAL_CODES)
            .ok_or(ValidationError::MaterialCode(material))?;
        let color_code =
            checked(color, &COLOR_CODES).ok_or(ValidationError::ColorCode(color))?;
        let manufacturer_code = checked(manufacturer, &MANUFACTURER_CODES)
            .ok_or(ValidationError::ManufacturerCode(manufacturer))?;
        Ok(Self {
            material_code,
            color_code,
            manufacturer_code,
        })
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[MATERIAL_OFFSET] = self.material_code;
        buf[COLOR_OFFSET] = self.color_code;
        buf[MANUFACTURER_OFFSET] = self.manufacturer_code;
        buf
    }

    /// Decode the meaningful prefix. Blocks shorter than the full 16 bytes
    /// are accepted as long as the prefix is present.
    pub fn from_bytes(data: &[u8]) -> Result<Self, BlockError> {
        if data.len() < MEANINGFUL_LEN {
            return Err(BlockError::BufferTooSmall {
                expected: MEANINGFUL_LEN,
                actual: data.len(),
            });
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            material_code: cursor.read_u8()?,
            color_code: cursor.read_u8()?,
            manufacturer_code: cursor.read_u8()?,
        })
    }

    /// True when `data` carries this block's meaningful bytes.
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= MEANINGFUL_LEN && data[..MEANINGFUL_LEN] == self.to_bytes()[..MEANINGFUL_LEN]
    }
}

fn checked(value: u32, range: &std::ops::RangeInclusive<u32>) -> Option<u8> {
    if range.contains(&value) {
        u8::try_from(value).ok()
    } else {
        None
    }
}

/// Address of the first block of a MIFARE Classic sector.
pub fn sector_to_block(sector: u8) -> Result<u8, BlockError> {
    match sector {
        s if s < SMALL_SECTOR_COUNT => Ok(s * BLOCKS_PER_SMALL_SECTOR),
        s if s < MAX_SECTORS => Ok(SMALL_SECTOR_COUNT * BLOCKS_PER_SMALL_SECTOR
            + (s - SMALL_SECTOR_COUNT) * BLOCKS_PER_LARGE_SECTOR),
        s => Err(BlockError::InvalidSector { sector: s }),
    }
}
