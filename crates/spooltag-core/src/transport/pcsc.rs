//! PC/SC-based NFC transport implementation.
//!
//! Talks to contactless readers (ACR122U and similar) that expose MIFARE
//! Classic memory through the PC/SC Part 3 storage card commands.

use std::ffi::{CStr, CString};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pcsc::{Attribute, Card, Context, Disposition, MAX_BUFFER_SIZE, Protocols, Scope, ShareMode};
use tracing::{debug, info, instrument, warn};

use super::traits::{NfcTech, NfcTransport, TransportError};
use crate::protocol::apdu::{self, StatusWord, StorageCard};
use crate::protocol::{AuthKey, BLOCK_SIZE, DEFAULT_KEY_SLOT, KEY_TYPE_A, sector_to_block};

/// PC/SC contactless reader transport.
pub struct PcscTransport {
    /// Reader name to use; the first reader is used when unset.
    reader: Option<String>,
    key_slot: u8,
    context: Mutex<Option<Context>>,
    card: Mutex<Option<Card>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn map_pcsc(e: pcsc::Error) -> TransportError {
    match e {
        pcsc::Error::NoSmartcard => TransportError::TagNotPresent,
        pcsc::Error::RemovedCard | pcsc::Error::ResetCard => TransportError::TagLost,
        pcsc::Error::NoReadersAvailable => TransportError::NoReader,
        pcsc::Error::NoService | pcsc::Error::ServiceStopped => {
            TransportError::NotSupported(e.to_string())
        }
        other => TransportError::Pcsc(other.to_string()),
    }
}

impl PcscTransport {
    pub fn new(reader: Option<String>) -> Self {
        Self {
            reader,
            key_slot: DEFAULT_KEY_SLOT,
            context: Mutex::new(None),
            card: Mutex::new(None),
        }
    }

    /// Names of all attached readers.
    pub fn list_readers(&self) -> Result<Vec<String>, TransportError> {
        let guard = lock(&self.context);
        let ctx = guard.as_ref().ok_or(TransportError::NotStarted)?;
        Self::reader_names(ctx)
    }

    fn reader_names(ctx: &Context) -> Result<Vec<String>, TransportError> {
        match ctx.list_readers_owned() {
            Ok(readers) => Ok(readers
                .iter()
                .map(|r| r.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(map_pcsc(e)),
        }
    }

    fn select_reader(&self, ctx: &Context) -> Result<CString, TransportError> {
        let names = Self::reader_names(ctx)?;
        let name = match &self.reader {
            Some(wanted) => names
                .into_iter()
                .find(|n| n == wanted)
                .ok_or_else(|| TransportError::ReaderNotFound(wanted.clone()))?,
            None => names.into_iter().next().ok_or(TransportError::NoReader)?,
        };
        CString::new(name.clone()).map_err(|_| TransportError::ReaderNotFound(name))
    }

    fn check_card_type(card: &Card) -> Result<(), TransportError> {
        let atr = card
            .get_attribute_owned(Attribute::AtrString)
            .map_err(map_pcsc)?;
        match StorageCard::from_atr(&atr) {
            Some(kind) if kind.is_mifare_classic() => {
                debug!(card = ?kind, "Storage card detected");
                Ok(())
            }
            Some(kind) => {
                warn!(card = ?kind, "Presented card is not MIFARE Classic");
                Err(TransportError::UnsupportedTag {
                    expected: NfcTech::MifareClassic,
                })
            }
            None => {
                // Some readers report a native ATR; let authentication decide.
                debug!(atr = ?atr, "ATR carries no PC/SC card name");
                Ok(())
            }
        }
    }

    fn transmit(&self, command: &[u8]) -> Result<(Vec<u8>, StatusWord), TransportError> {
        let guard = lock(&self.card);
        let card = guard.as_ref().ok_or(TransportError::SessionNotOpen)?;
        card.exchange(command)
    }
}

/// APDU exchange with a connected card.
trait CardChannel {
    fn exchange(&self, command: &[u8]) -> Result<(Vec<u8>, StatusWord), TransportError>;

    /// Select the card again after it halted.
    fn reselect(&mut self) -> Result<(), TransportError>;
}

impl CardChannel for Card {
    fn exchange(&self, command: &[u8]) -> Result<(Vec<u8>, StatusWord), TransportError> {
        let mut buf = [0u8; MAX_BUFFER_SIZE];
        let response = self.transmit(command, &mut buf).map_err(map_pcsc)?;
        let (body, sw) = apdu::split_response(response)
            .ok_or_else(|| TransportError::ReadFailed("Truncated reader response".into()))?;
        debug!(ins = %format!("{:02X}", command[1]), sw = %sw, len = body.len(), "APDU exchanged");
        Ok((body.to_vec(), sw))
    }

    fn reselect(&mut self) -> Result<(), TransportError> {
        self.reconnect(ShareMode::Exclusive, Protocols::ANY, Disposition::ResetCard)
            .map_err(map_pcsc)
    }
}

/// Load `key` and authenticate the first block of `sector` with it.
///
/// A MIFARE Classic tag halts after a failed authentication and rejects
/// every later attempt until it is selected again, so a rejection is
/// followed by a re-select.
fn authenticate_card<C: CardChannel>(
    card: &mut C,
    slot: u8,
    sector: u8,
    key: &AuthKey,
) -> Result<(), TransportError> {
    let block = sector_to_block(sector)?;

    let (_, sw) = card.exchange(&apdu::load_key(slot, key))?;
    if !sw.is_success() {
        return Err(TransportError::CommandFailed(sw));
    }

    let (_, sw) = card.exchange(&apdu::general_authenticate(block, KEY_TYPE_A, slot))?;
    if !sw.is_success() {
        if let Err(e) = card.reselect() {
            warn!(sector, error = %e, "Failed to re-select tag after rejected key");
        }
        return Err(TransportError::AuthRejected { sector });
    }
    Ok(())
}

impl NfcTransport for PcscTransport {
    fn is_supported(&self) -> Result<bool, TransportError> {
        match Context::establish(Scope::User) {
            Ok(_) => Ok(true),
            Err(pcsc::Error::NoService) | Err(pcsc::Error::ServiceStopped) => Ok(false),
            Err(e) => Err(map_pcsc(e)),
        }
    }

    #[instrument(level = "info", skip(self))]
    fn start(&self) -> Result<(), TransportError> {
        let mut guard = lock(&self.context);
        if guard.is_none() {
            let ctx = Context::establish(Scope::User).map_err(map_pcsc)?;
            info!("PC/SC context established");
            *guard = Some(ctx);
        }
        Ok(())
    }

    fn is_enabled(&self) -> Result<bool, TransportError> {
        let guard = lock(&self.context);
        let ctx = guard.as_ref().ok_or(TransportError::NotStarted)?;
        let names = Self::reader_names(ctx)?;
        Ok(match &self.reader {
            Some(wanted) => names.iter().any(|n| n == wanted),
            None => !names.is_empty(),
        })
    }

    fn supports_technology(&self, tech: NfcTech) -> bool {
        matches!(tech, NfcTech::MifareClassic)
    }

    #[instrument(level = "debug", skip(self))]
    fn request_technology(&self, tech: NfcTech) -> Result<(), TransportError> {
        let ctx_guard = lock(&self.context);
        let ctx = ctx_guard.as_ref().ok_or(TransportError::NotStarted)?;
        if lock(&self.card).is_some() {
            return Err(TransportError::SessionBusy);
        }
        let reader = self.select_reader(ctx)?;

        let card = ctx
            .connect(reader.as_c_str(), ShareMode::Exclusive, Protocols::ANY)
            .map_err(map_pcsc)?;

        if let Err(e) = Self::check_card_type(&card) {
            let _ = card.disconnect(Disposition::LeaveCard);
            return Err(e);
        }

        info!(reader = %reader_label(&reader), tech = %tech, "Tag session opened");
        *lock(&self.card) = Some(card);
        Ok(())
    }

    fn cancel_technology_request(&self) -> Result<(), TransportError> {
        let Some(card) = lock(&self.card).take() else {
            return Ok(());
        };
        card.disconnect(Disposition::LeaveCard)
            .map_err(|(_, e)| map_pcsc(e))?;
        debug!("Tag session closed");
        Ok(())
    }

    fn authenticate_sector_key_a(&self, sector: u8, key: &AuthKey) -> Result<(), TransportError> {
        let mut guard = lock(&self.card);
        let card = guard.as_mut().ok_or(TransportError::SessionNotOpen)?;
        authenticate_card(card, self.key_slot, sector, key)
    }

    fn read_block(&self, block: u8) -> Result<Vec<u8>, TransportError> {
        let (body, sw) = self.transmit(&apdu::read_binary(block))?;
        if !sw.is_success() {
            return Err(TransportError::CommandFailed(sw));
        }
        Ok(body)
    }

    fn write_block(&self, block: u8, data: &[u8; BLOCK_SIZE]) -> Result<(), TransportError> {
        let (_, sw) = self.transmit(&apdu::update_binary(block, data))?;
        if !sw.is_success() {
            return Err(TransportError::CommandFailed(sw));
        }
        Ok(())
    }
}

fn reader_label(reader: &CStr) -> String {
    reader.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AUTH_KEYS, INS_GENERAL_AUTHENTICATE, INS_LOAD_KEY};
    use std::cell::RefCell;

    #[derive(Default)]
    struct CardState {
        loaded: Option<AuthKey>,
        halted: bool,
        reselects: usize,
        auth_commands: Vec<Vec<u8>>,
    }

    /// Tag that halts on a rejected key until it is re-selected.
    struct HaltingCard {
        accepted: AuthKey,
        state: RefCell<CardState>,
    }

    impl HaltingCard {
        fn new(accepted: AuthKey) -> Self {
            Self {
                accepted,
                state: RefCell::default(),
            }
        }
    }

    impl CardChannel for HaltingCard {
        fn exchange(&self, command: &[u8]) -> Result<(Vec<u8>, StatusWord), TransportError> {
            let mut state = self.state.borrow_mut();
            let sw = match command[1] {
                INS_LOAD_KEY => {
                    let mut key = [0u8; AuthKey::LEN];
                    key.copy_from_slice(&command[5..11]);
                    state.loaded = Some(AuthKey(key));
                    0x9000
                }
                INS_GENERAL_AUTHENTICATE => {
                    state.auth_commands.push(command.to_vec());
                    if !state.halted && state.loaded == Some(self.accepted) {
                        0x9000
                    } else {
                        state.halted = true;
                        0x6300
                    }
                }
                _ => 0x6A81,
            };
            Ok((Vec::new(), StatusWord(sw)))
        }

        fn reselect(&mut self) -> Result<(), TransportError> {
            let state = self.state.get_mut();
            state.halted = false;
            state.reselects += 1;
            Ok(())
        }
    }

    #[test]
    fn test_second_key_after_rejection() {
        let mut card = HaltingCard::new(AUTH_KEYS[1]);

        let err = authenticate_card(&mut card, 0, 1, &AUTH_KEYS[0]).unwrap_err();
        assert!(matches!(err, TransportError::AuthRejected { sector: 1 }));
        assert_eq!(card.state.borrow().reselects, 1);

        authenticate_card(&mut card, 0, 1, &AUTH_KEYS[1]).unwrap();
        let state = card.state.into_inner();
        assert_eq!(state.reselects, 1);
        assert_eq!(state.auth_commands.len(), 2);
        // Both attempts target the first block of sector 1
        assert!(state.auth_commands.iter().all(|c| c[7] == 4));
    }

    #[test]
    fn test_accepted_key_skips_reselect() {
        let mut card = HaltingCard::new(AUTH_KEYS[0]);
        authenticate_card(&mut card, 0, 1, &AUTH_KEYS[0]).unwrap();
        assert_eq!(card.state.into_inner().reselects, 0);
    }
}
