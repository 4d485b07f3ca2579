//! Decoded tag contents and the uniform call-boundary result.

use serde::Serialize;

use crate::error::TagError;
use crate::lookup::{color_name, color_rgb, manufacturer_name, material_name};
use crate::protocol::{BlockError, TagBlock};

/// Semantic view of one spool tag.
///
/// Names and the swatch color are derived from the codes on every decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub material_code: u8,
    pub color_code: u8,
    pub manufacturer_code: u8,
    pub material_name: String,
    pub color_name: String,
    /// `#RRGGBB`
    pub color_rgb: String,
    pub manufacturer_name: String,
    /// Block bytes exactly as read, reserved bytes included.
    pub raw_block: Vec<u8>,
}

impl TagRecord {
    pub fn from_block(raw: &[u8]) -> Result<Self, BlockError> {
        let block = TagBlock::from_bytes(raw)?;
        Ok(Self {
            material_code: block.material_code,
            color_code: block.color_code,
            manufacturer_code: block.manufacturer_code,
            material_name: material_name(block.material_code.into()),
            color_name: color_name(block.color_code.into()),
            color_rgb: color_rgb(block.color_code.into()).to_string(),
            manufacturer_name: manufacturer_name(block.manufacturer_code.into()),
            raw_block: raw.to_vec(),
        })
    }

    /// Raw block as space-separated hex, e.g. `05 0C 01 00 ...`.
    pub fn raw_hex(&self) -> String {
        self.raw_block
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `{success, data?, error?}` result handed to UI callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> TagResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl TagResponse<()> {
    /// Success without payload.
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

impl From<Result<TagRecord, TagError>> for TagResponse<TagRecord> {
    fn from(result: Result<TagRecord, TagError>) -> Self {
        match result {
            Ok(record) => Self::ok(record),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

impl From<Result<(), TagError>> for TagResponse<()> {
    fn from(result: Result<(), TagError>) -> Self {
        match result {
            Ok(()) => Self::done(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}
