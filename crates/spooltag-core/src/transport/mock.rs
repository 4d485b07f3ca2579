//! Mock NFC transport for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{NfcTech, NfcTransport, TransportError};
use crate::protocol::{AuthKey, BLOCK_SIZE, sector_to_block};

/// A call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    IsSupported,
    Start,
    IsEnabled,
    RequestTechnology(NfcTech),
    CancelTechnologyRequest,
    Authenticate { sector: u8, key: AuthKey },
    SectorToBlock(u8),
    ReadBlock(u8),
    WriteBlock { block: u8, data: Vec<u8> },
}

#[derive(Debug)]
struct MockState {
    supported: bool,
    enabled: bool,
    mifare_classic: bool,
    accepted_keys: Vec<AuthKey>,
    blocks: HashMap<u8, Vec<u8>>,
    started: bool,
    require_start: bool,
    session_open: bool,
    overlapping_requests: usize,
    authenticated_sector: Option<u8>,
    fail_request: bool,
    fail_read: bool,
    fail_write: bool,
    drop_writes: bool,
    calls: Vec<MockCall>,
}

/// In-memory MIFARE Classic tag sitting on an always-present reader.
///
/// Clones share state, so a test can keep a handle after moving one
/// into a `TagService`.
#[derive(Clone)]
pub struct MockTag {
    state: Arc<Mutex<MockState>>,
}

impl MockTag {
    /// A blank tag accepting only the given keys.
    pub fn new(accepted_keys: &[AuthKey]) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                supported: true,
                enabled: true,
                mifare_classic: true,
                accepted_keys: accepted_keys.to_vec(),
                blocks: HashMap::new(),
                started: false,
                require_start: false,
                session_open: false,
                overlapping_requests: 0,
                authenticated_sector: None,
                fail_request: false,
                fail_read: false,
                fail_write: false,
                drop_writes: false,
                calls: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Preload raw block contents.
    pub fn set_block(&self, block: u8, data: &[u8]) {
        self.state().blocks.insert(block, data.to_vec());
    }

    /// Current raw block contents.
    pub fn block(&self, block: u8) -> Option<Vec<u8>> {
        self.state().blocks.get(&block).cloned()
    }

    /// Simulate a host without NFC hardware.
    pub fn set_supported(&self, supported: bool) {
        self.state().supported = supported;
    }

    /// Simulate NFC switched off.
    pub fn set_enabled(&self, enabled: bool) {
        self.state().enabled = enabled;
    }

    /// Simulate a platform that cannot speak MIFARE Classic.
    pub fn set_mifare_classic(&self, available: bool) {
        self.state().mifare_classic = available;
    }

    /// Report `NotStarted` from `is_enabled` until `start` is called.
    pub fn require_start(&self) {
        self.state().require_start = true;
    }

    pub fn fail_request(&self) {
        self.state().fail_request = true;
    }

    pub fn fail_read(&self) {
        self.state().fail_read = true;
    }

    pub fn fail_write(&self) {
        self.state().fail_write = true;
    }

    /// Acknowledge writes without storing them.
    pub fn drop_writes(&self) {
        self.state().drop_writes = true;
    }

    /// All observed calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn acquire_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::RequestTechnology(_)))
    }

    pub fn release_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::CancelTechnologyRequest))
    }

    /// Keys tried, in order.
    pub fn auth_attempts(&self) -> Vec<AuthKey> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Authenticate { key, .. } => Some(*key),
                _ => None,
            })
            .collect()
    }

    /// Requests refused because a session was already open.
    pub fn overlapping_requests(&self) -> usize {
        self.state().overlapping_requests
    }

    pub fn is_session_open(&self) -> bool {
        self.state().session_open
    }

    fn check_access(state: &MockState, block: u8) -> Result<(), TransportError> {
        if !state.session_open {
            return Err(TransportError::SessionNotOpen);
        }
        let sector = sector_of(block);
        if state.authenticated_sector == Some(sector) {
            Ok(())
        } else {
            Err(TransportError::AuthRejected { sector })
        }
    }
}

fn sector_of(block: u8) -> u8 {
    if block < 128 { block / 4 } else { 32 + (block - 128) / 16 }
}

impl NfcTransport for MockTag {
    fn is_supported(&self) -> Result<bool, TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::IsSupported);
        Ok(state.supported)
    }

    fn start(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::Start);
        if !state.supported {
            return Err(TransportError::NotSupported("mock reader disabled".into()));
        }
        state.started = true;
        Ok(())
    }

    fn is_enabled(&self) -> Result<bool, TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::IsEnabled);
        if state.require_start && !state.started {
            return Err(TransportError::NotStarted);
        }
        Ok(state.enabled)
    }

    fn supports_technology(&self, tech: NfcTech) -> bool {
        match tech {
            NfcTech::MifareClassic => self.state().mifare_classic,
        }
    }

    fn request_technology(&self, tech: NfcTech) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::RequestTechnology(tech));
        if state.fail_request {
            return Err(TransportError::TagNotPresent);
        }
        if state.session_open {
            state.overlapping_requests += 1;
            return Err(TransportError::SessionBusy);
        }
        state.session_open = true;
        state.authenticated_sector = None;
        Ok(())
    }

    fn cancel_technology_request(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::CancelTechnologyRequest);
        state.session_open = false;
        state.authenticated_sector = None;
        Ok(())
    }

    fn authenticate_sector_key_a(&self, sector: u8, key: &AuthKey) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::Authenticate { sector, key: *key });
        if !state.session_open {
            return Err(TransportError::SessionNotOpen);
        }
        if state.accepted_keys.contains(key) {
            state.authenticated_sector = Some(sector);
            Ok(())
        } else {
            state.authenticated_sector = None;
            Err(TransportError::AuthRejected { sector })
        }
    }

    fn sector_to_block(&self, sector: u8) -> Result<u8, TransportError> {
        self.state().calls.push(MockCall::SectorToBlock(sector));
        Ok(sector_to_block(sector)?)
    }

    fn read_block(&self, block: u8) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::ReadBlock(block));
        Self::check_access(&state, block)?;
        if state.fail_read {
            return Err(TransportError::TagLost);
        }
        Ok(state
            .blocks
            .get(&block)
            .cloned()
            .unwrap_or_else(|| vec![0u8; BLOCK_SIZE]))
    }

    fn write_block(&self, block: u8, data: &[u8; BLOCK_SIZE]) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(MockCall::WriteBlock {
            block,
            data: data.to_vec(),
        });
        Self::check_access(&state, block)?;
        if state.fail_write {
            return Err(TransportError::WriteFailed("mock write error".into()));
        }
        if !state.drop_writes {
            state.blocks.insert(block, data.to_vec());
        }
        Ok(())
    }
}
