//! Filament material codes (tag byte 0).

use super::{CodeEntry, name_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub code: u8,
    pub name: &'static str,
}

impl CodeEntry for Material {
    fn code(&self) -> u8 {
        self.code
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

const fn m(code: u8, name: &'static str) -> Material {
    Material { code, name }
}

/// Known materials. Gaps in the 1..=50 range are unassigned.
pub static MATERIALS: &[Material] = &[
    m(1, "PLA"),
    m(2, "PLA Matte"),
    m(3, "PLA Metal"),
    m(4, "PLA Silk"),
    m(5, "PLA-CF"),
    m(6, "PLA-Wood"),
    m(7, "PLA Basic"),
    m(8, "PLA Matte Basic"),
    m(11, "ABS"),
    m(12, "ABS-GF"),
    m(13, "ABS-Metal"),
    m(14, "ABS-Odorless"),
    m(18, "ASA"),
    m(19, "ASA-AERO"),
    m(24, "UltraPA"),
    m(25, "PA-CF"),
    m(26, "UltraPA-CF25"),
    m(27, "PA12-CF"),
    m(30, "PAHT-CF"),
    m(31, "PAHT-GF"),
    m(32, "Support For PAHT"),
    m(33, "Support For PET/PA"),
    m(34, "PC/ABS-FR"),
    m(37, "PET-CF"),
    m(38, "PET-GF"),
    m(39, "PETG Basic"),
    m(40, "PETG-Tough"),
    m(41, "PETG"),
    m(44, "PPS-CF"),
    m(45, "PETG Translucent"),
    m(47, "PVA"),
    m(49, "TPU-AERO"),
    m(50, "TPU"),
];

pub fn material_name(code: u32) -> String {
    name_for(MATERIALS, code)
}
