//! Manufacturer codes (tag byte 2).
//!
//! Factory tags carry 1. Code 0 is reserved and deliberately absent, so it
//! resolves through the fallback label.

use super::{CodeEntry, name_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manufacturer {
    pub code: u8,
    pub name: &'static str,
}

impl CodeEntry for Manufacturer {
    fn code(&self) -> u8 {
        self.code
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

pub static MANUFACTURERS: &[Manufacturer] = &[
    Manufacturer {
        code: 1,
        name: "QIDI",
    },
    Manufacturer {
        code: 2,
        name: "Generic",
    },
];

pub fn manufacturer_name(code: u32) -> String {
    name_for(MANUFACTURERS, code)
}
