//! PC/SC pseudo-APDUs for contactless storage cards.
//!
//! Contactless readers expose MIFARE Classic memory through the `FF`-class
//! commands of PC/SC Part 3. Every response ends in a two-byte status word.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::constants::*;
use super::key::AuthKey;

/// Trailing status word of a response APDU.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub fn is_success(&self) -> bool {
        self.0 == SW_SUCCESS
    }
}

impl fmt::Debug for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusWord({:04X})", self.0)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SW={:04X}", self.0)
    }
}

/// Split a response into its body and status word.
pub fn split_response(response: &[u8]) -> Option<(&[u8], StatusWord)> {
    if response.len() < 2 {
        return None;
    }
    let (body, sw) = response.split_at(response.len() - 2);
    Some((body, StatusWord(BigEndian::read_u16(sw))))
}

/// `FF 82 00 <slot> 06 <key>`
pub fn load_key(slot: u8, key: &AuthKey) -> Vec<u8> {
    let mut apdu = vec![
        PCSC_CLA,
        INS_LOAD_KEY,
        KEY_STRUCTURE_VOLATILE,
        slot,
        AuthKey::LEN as u8,
    ];
    apdu.extend_from_slice(key.as_bytes());
    apdu
}

/// `FF 86 00 00 05 01 00 <block> <key type> <slot>`
pub fn general_authenticate(block: u8, key_type: u8, slot: u8) -> Vec<u8> {
    vec![
        PCSC_CLA,
        INS_GENERAL_AUTHENTICATE,
        0x00,
        0x00,
        0x05,
        0x01, // version
        0x00, // block MSB
        block,
        key_type,
        slot,
    ]
}

/// `FF B0 00 <block> 10`
pub fn read_binary(block: u8) -> Vec<u8> {
    vec![PCSC_CLA, INS_READ_BINARY, 0x00, block, BLOCK_SIZE as u8]
}

/// `FF D6 00 <block> 10 <data>`
pub fn update_binary(block: u8, data: &[u8; BLOCK_SIZE]) -> Vec<u8> {
    let mut apdu = vec![PCSC_CLA, INS_UPDATE_BINARY, 0x00, block, BLOCK_SIZE as u8];
    apdu.extend_from_slice(data);
    apdu
}

/// Card family announced in a PC/SC storage card ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCard {
    MifareClassic1K,
    MifareClassic4K,
    MifareMini,
    Other(u16),
}

impl StorageCard {
    /// Parse the card name from a PC/SC Part 3 ATR
    /// (`3B 8F 80 01 80 4F 0C <RID> <SS> <NN NN> ...`).
    pub fn from_atr(atr: &[u8]) -> Option<Self> {
        let rid_at = atr.windows(PCSC_RID.len()).position(|w| w == PCSC_RID)?;
        // RID is followed by the standard byte, then the 2-byte card name
        let name_at = rid_at + PCSC_RID.len() + 1;
        let name = atr.get(name_at..name_at + 2)?;
        Some(match BigEndian::read_u16(name) {
            CARD_NAME_MIFARE_1K => Self::MifareClassic1K,
            CARD_NAME_MIFARE_4K => Self::MifareClassic4K,
            CARD_NAME_MIFARE_MINI => Self::MifareMini,
            other => Self::Other(other),
        })
    }

    pub fn is_mifare_classic(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}
