//! Filament color codes (tag byte 1) with swatch RGB values.

use super::{CodeEntry, UNKNOWN_RGB, find_by_code, name_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub code: u8,
    pub name: &'static str,
    /// `#RRGGBB`
    pub rgb: &'static str,
}

impl CodeEntry for Color {
    fn code(&self) -> u8 {
        self.code
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

const fn c(code: u8, name: &'static str, rgb: &'static str) -> Color {
    Color { code, name, rgb }
}

pub static COLORS: &[Color] = &[
    c(1, "White", "#FAFAFA"),
    c(2, "Black", "#060606"),
    c(3, "Light Gray", "#D9E3ED"),
    c(4, "Lime Green", "#5CF30F"),
    c(5, "Mint Green", "#63E492"),
    c(6, "Blue", "#2850FF"),
    c(7, "Pink", "#FE98FE"),
    c(8, "Yellow", "#DFD628"),
    c(9, "Dark Green", "#228332"),
    c(10, "Light Blue", "#99DEFF"),
    c(11, "Dark Blue", "#1714B0"),
    c(12, "Lavender", "#CEC0FE"),
    c(13, "Yellow Green", "#CADE4B"),
    c(14, "Sea Blue", "#1353AB"),
    c(15, "Sky Blue", "#5EA9FD"),
    c(16, "Violet", "#A878FF"),
    c(17, "Salmon", "#FE717A"),
    c(18, "Red", "#FF362D"),
    c(19, "Sand", "#E2DFCD"),
    c(20, "Gray", "#898F9B"),
    c(21, "Brown", "#6E3812"),
    c(22, "Khaki", "#CAC59F"),
    c(23, "Orange", "#F28636"),
    c(24, "Bronze", "#B87F2B"),
];

pub fn color_name(code: u32) -> String {
    name_for(COLORS, code)
}

pub fn color_rgb(code: u32) -> &'static str {
    find_by_code(COLORS, code).map_or(UNKNOWN_RGB, |color| color.rgb)
}
