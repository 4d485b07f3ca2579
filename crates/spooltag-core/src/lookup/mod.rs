//! Lookup tables mapping tag codes to human-readable names.
//!
//! The tables are static, ordered slices. Lookups are exact code matches and
//! never fail: an unknown code yields a fallback label that still carries the
//! numeric code.

mod colors;
mod manufacturers;
mod materials;

pub use colors::{COLORS, Color, color_name, color_rgb};
pub use manufacturers::{MANUFACTURERS, Manufacturer, manufacturer_name};
pub use materials::{MATERIALS, Material, material_name};

/// RGB string reported for color codes missing from the table.
pub const UNKNOWN_RGB: &str = "#000000";

/// A row of a lookup table.
pub trait CodeEntry {
    fn code(&self) -> u8;
    fn name(&self) -> &'static str;
}

/// Find the entry with exactly this code.
pub fn find_by_code<E: CodeEntry>(table: &[E], code: u32) -> Option<&E> {
    table.iter().find(|e| u32::from(e.code()) == code)
}

/// Name for `code`, or `"Unknown (<code>)"` when the table has no such entry.
pub fn name_for<E: CodeEntry>(table: &[E], code: u32) -> String {
    match find_by_code(table, code) {
        Some(entry) => entry.name().to_string(),
        None => format!("Unknown ({code})"),
    }
}
