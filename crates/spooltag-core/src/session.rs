//! Tag session - high-level read/write orchestrator.

use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::TagError;
use crate::events::{TagEvent, TagObserver, TagOperation, TracingObserver};
use crate::protocol::{AUTH_KEYS, AuthKey, TAG_SECTOR, TagBlock, sector_to_block};
use crate::record::{TagRecord, TagResponse};
use crate::transport::{NfcTech, NfcTransport};

/// Configuration for tag sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sector holding the spool block.
    pub sector: u8,
    /// Keys tried in order during authentication.
    pub auth_keys: Vec<AuthKey>,
    /// PC/SC reader name. The first reader is used when unset.
    pub reader: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sector: TAG_SECTOR,
            auth_keys: AUTH_KEYS.to_vec(),
            reader: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth_keys.is_empty() {
            bail!("At least one authentication key is required");
        }
        sector_to_block(self.sector)?;
        Ok(())
    }
}

/// Releases the technology session when dropped, on every exit path.
struct SessionGuard<'a, T: NfcTransport, O: TagObserver> {
    transport: &'a T,
    observer: &'a O,
}

impl<T: NfcTransport, O: TagObserver> Drop for SessionGuard<'_, T, O> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.cancel_technology_request() {
            warn!(error = %e, "Failed to release tag session");
        }
        self.observer.on_event(&TagEvent::SessionClosed);
    }
}

/// Reads and writes the spool block of one tag at a time.
///
/// Construct once at start-up and share by reference.
pub struct TagService<T: NfcTransport, O: TagObserver = TracingObserver> {
    transport: T,
    config: SessionConfig,
    observer: Arc<O>,
    initialized: AtomicBool,
    /// Held for the whole of a session; one tag operation at a time.
    operation: Mutex<()>,
}

impl<T: NfcTransport> TagService<T, TracingObserver> {
    /// Create a new service with default tracing observer.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::with_observer(transport, config, Arc::new(TracingObserver))
    }
}

impl<T: NfcTransport, O: TagObserver> TagService<T, O> {
    /// Create a new service with a custom observer.
    pub fn with_observer(transport: T, config: SessionConfig, observer: Arc<O>) -> Self {
        Self {
            transport,
            config,
            observer,
            initialized: AtomicBool::new(false),
            operation: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Detect and start the NFC subsystem. Idempotent; the only place the
    /// initialized flag is set.
    pub fn initialize_capability(&self) -> bool {
        if self.initialized.load(Ordering::Acquire) {
            return true;
        }

        let supported = match self.transport.is_supported() {
            Ok(supported) => supported,
            Err(e) => {
                warn!(error = %e, "NFC support check failed");
                false
            }
        };

        let started = supported
            && match self.transport.start() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to start NFC subsystem");
                    false
                }
            };

        if started {
            self.initialized.store(true, Ordering::Release);
        }
        self.observer
            .on_event(&TagEvent::CapabilityInitialized { supported: started });
        started
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_capability_enabled(&self) -> bool {
        match self.transport.is_enabled() {
            Ok(enabled) => enabled,
            Err(e) => {
                debug!(error = %e, "NFC enabled check failed");
                false
            }
        }
    }

    /// Read the spool block and decode it.
    pub fn read(&self) -> TagResponse<TagRecord> {
        self.read_tag().into()
    }

    /// Write the spool block and verify it by reading it back.
    pub fn write(&self, material: u32, color: u32, manufacturer: u32) -> TagResponse<()> {
        self.write_tag(material, color, manufacturer).into()
    }

    #[instrument(skip(self), fields(sector = self.config.sector))]
    pub fn read_tag(&self) -> Result<TagRecord, TagError> {
        let result = self.read_inner();
        self.report(TagOperation::Read, &result);
        result
    }

    #[instrument(skip(self), fields(sector = self.config.sector))]
    pub fn write_tag(&self, material: u32, color: u32, manufacturer: u32) -> Result<(), TagError> {
        let result = self.write_inner(material, color, manufacturer);
        self.report(TagOperation::Write, &result);
        result
    }

    /// Release any outstanding technology request, ignoring errors.
    pub fn cleanup(&self) {
        if let Err(e) = self.transport.cancel_technology_request() {
            debug!(error = %e, "Ignoring cleanup error");
        }
    }

    fn read_inner(&self) -> Result<TagRecord, TagError> {
        self.check_capability(TagOperation::Read)?;
        let sector = self.config.sector;

        self.with_session(|| {
            self.authenticate(sector)?;
            let block = self.transport.sector_to_block(sector)?;
            let data = self.transport.read_block(block)?;
            self.observer.on_event(&TagEvent::BlockRead {
                block,
                data: data.clone(),
            });
            Ok(TagRecord::from_block(&data)?)
        })
    }

    fn write_inner(&self, material: u32, color: u32, manufacturer: u32) -> Result<(), TagError> {
        let tag_block = TagBlock::new(material, color, manufacturer)?;
        self.check_capability(TagOperation::Write)?;
        let sector = self.config.sector;

        self.with_session(|| {
            self.authenticate(sector)?;

            let bytes = tag_block.to_bytes();
            let block = self.transport.sector_to_block(sector)?;
            self.transport.write_block(block, &bytes)?;
            self.observer.on_event(&TagEvent::BlockWritten { block });

            let readback = self.transport.read_block(block)?;
            self.observer.on_event(&TagEvent::BlockRead {
                block,
                data: readback.clone(),
            });
            if !tag_block.matches(&readback) {
                warn!(block, expected = ?&bytes[..3], actual = ?readback, "Readback mismatch");
                return Err(TagError::Verification {
                    block,
                    expected: bytes[..3].to_vec(),
                    actual: readback,
                });
            }

            self.observer.on_event(&TagEvent::WriteVerified { block });
            Ok(())
        })
    }

    fn check_capability(&self, operation: TagOperation) -> Result<(), TagError> {
        if !self.transport.supports_technology(NfcTech::MifareClassic) {
            return Err(TagError::Capability(format!(
                "Tag {operation} requires {} support, which this platform lacks",
                NfcTech::MifareClassic
            )));
        }
        match self.transport.is_enabled() {
            Ok(true) => Ok(()),
            Ok(false) => Err(TagError::Capability("NFC is disabled".into())),
            Err(e) => Err(TagError::Capability(e.to_string())),
        }
    }

    /// Run `op` inside an exclusive technology session.
    fn with_session<R>(&self, op: impl FnOnce() -> Result<R, TagError>) -> Result<R, TagError> {
        let _exclusive = self
            .operation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Guard first: a failed request is still cancelled.
        let _session = SessionGuard {
            transport: &self.transport,
            observer: self.observer.as_ref(),
        };
        let tech = NfcTech::MifareClassic;
        self.transport.request_technology(tech)?;
        self.observer.on_event(&TagEvent::SessionOpened { tech });
        op()
    }

    /// Try each configured key in order; the first accepted key wins.
    fn authenticate(&self, sector: u8) -> Result<usize, TagError> {
        if !self.transport.supports_technology(NfcTech::MifareClassic) {
            return Err(TagError::Capability(
                "Authentication requires MIFARE Classic support".into(),
            ));
        }

        for (key_index, key) in self.config.auth_keys.iter().enumerate() {
            let outcome = self.transport.authenticate_sector_key_a(sector, key);
            self.observer.on_event(&TagEvent::AuthAttempt {
                sector,
                key_index,
                accepted: outcome.is_ok(),
            });
            match outcome {
                Ok(()) => {
                    debug!(sector, key_index, "Sector authenticated");
                    return Ok(key_index);
                }
                Err(e) => debug!(sector, key_index, error = %e, "Key rejected"),
            }
        }

        Err(TagError::Authentication {
            sector,
            attempts: self.config.auth_keys.len(),
        })
    }

    fn report<R>(&self, operation: TagOperation, result: &Result<R, TagError>) {
        match result {
            Ok(_) => {
                info!(operation = %operation, "Tag {} succeeded", operation);
                self.observer.on_event(&TagEvent::Completed { operation });
            }
            Err(e) => self.observer.on_event(&TagEvent::Failed {
                operation,
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::events::NullObserver;
    use crate::lookup::{color_name, color_rgb, material_name};
    use crate::transport::{MockCall, MockTag, TransportError};
    use std::sync::Mutex;

    const BLOCK: u8 = 4;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<TagEvent>>,
    }

    impl TagObserver for RecordingObserver {
        fn on_event(&self, event: &TagEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn service(tag: &MockTag) -> TagService<MockTag, NullObserver> {
        TagService::with_observer(tag.clone(), SessionConfig::default(), Arc::new(NullObserver))
    }

    fn assert_balanced(tag: &MockTag) {
        assert_eq!(tag.acquire_count(), tag.release_count());
        assert!(!tag.is_session_open());
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.sector, 1);
        assert_eq!(config.auth_keys, AUTH_KEYS.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("spooltag-{}.toml", std::process::id()));
        let config = SessionConfig {
            sector: 2,
            auth_keys: vec![AuthKey([1, 2, 3, 4, 5, 6])],
            reader: Some("ACS ACR122U".into()),
        };
        config.save_to_file(&path).unwrap();
        let loaded = SessionConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let config: SessionConfig = toml::from_str("sector = 3").unwrap();
        assert_eq!(config.sector, 3);
        assert_eq!(config.auth_keys, AUTH_KEYS.to_vec());
        assert!(config.reader.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SessionConfig::default();
        config.auth_keys.clear();
        assert!(config.validate().is_err());

        let config = SessionConfig {
            sector: 40,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_validation_before_any_hardware_call() {
        let cases = [
            (0, 1, 1, "Material code must be between 1 and 50"),
            (51, 1, 1, "Material code must be between 1 and 50"),
            (1, 0, 1, "Color code must be between 1 and 24"),
            (1, 25, 1, "Color code must be between 1 and 24"),
            (1, 1, 256, "Manufacturer code must be between 0 and 255"),
            (u32::MAX, 1, 1, "Material code must be between 1 and 50"),
        ];
        for (material, color, manufacturer, message) in cases {
            let tag = MockTag::new(&AUTH_KEYS);
            let svc = service(&tag);
            let err = svc.write_tag(material, color, manufacturer).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(err.to_string(), message);
            assert!(tag.calls().is_empty(), "hardware touched for {material}/{color}/{manufacturer}");
        }
    }

    #[test]
    fn test_auth_first_key_stops() {
        let tag = MockTag::new(&AUTH_KEYS[..1]);
        let svc = service(&tag);
        svc.read_tag().unwrap();
        assert_eq!(tag.auth_attempts(), vec![AUTH_KEYS[0]]);
        assert_balanced(&tag);
    }

    #[test]
    fn test_auth_falls_back_to_second_key() {
        let tag = MockTag::new(&AUTH_KEYS[1..]);
        let svc = service(&tag);

        tag.request_technology(NfcTech::MifareClassic).unwrap();
        assert_eq!(svc.authenticate(1).unwrap(), 1);
        assert_eq!(tag.auth_attempts(), AUTH_KEYS.to_vec());
        tag.cancel_technology_request().unwrap();
    }

    #[test]
    fn test_auth_all_keys_rejected() {
        let tag = MockTag::new(&[AuthKey([0; 6])]);
        let svc = service(&tag);

        let err = svc.read_tag().unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed");
        assert!(matches!(
            err,
            TagError::Authentication {
                sector: 1,
                attempts: 2
            }
        ));
        assert_eq!(tag.auth_attempts().len(), AUTH_KEYS.len());
        assert_balanced(&tag);
        assert_eq!(tag.release_count(), 1);
    }

    #[test]
    fn test_read_decodes_block() {
        let tag = MockTag::new(&AUTH_KEYS);
        let mut raw = [0u8; 16];
        raw[..4].copy_from_slice(&[11, 6, 2, 0x5A]);
        tag.set_block(BLOCK, &raw);

        let record = service(&tag).read_tag().unwrap();
        assert_eq!(record.material_code, 11);
        assert_eq!(record.color_code, 6);
        assert_eq!(record.manufacturer_code, 2);
        assert_eq!(record.material_name, "ABS");
        assert_eq!(record.color_name, "Blue");
        assert_eq!(record.manufacturer_name, "Generic");
        assert_eq!(record.raw_block, raw.to_vec());
        assert_balanced(&tag);
    }

    #[test]
    fn test_read_short_block_is_transport_error() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.set_block(BLOCK, &[1, 2]);
        let err = service(&tag).read_tag().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_balanced(&tag);
    }

    #[test]
    fn test_write_call_sequence() {
        let tag = MockTag::new(&AUTH_KEYS[1..]);
        service(&tag).write_tag(5, 12, 1).unwrap();

        let mut expected_data = vec![0u8; 16];
        expected_data[..3].copy_from_slice(&[5, 12, 1]);
        assert_eq!(
            tag.calls(),
            vec![
                MockCall::IsEnabled,
                MockCall::RequestTechnology(NfcTech::MifareClassic),
                MockCall::Authenticate {
                    sector: 1,
                    key: AUTH_KEYS[0]
                },
                MockCall::Authenticate {
                    sector: 1,
                    key: AUTH_KEYS[1]
                },
                MockCall::SectorToBlock(1),
                MockCall::WriteBlock {
                    block: BLOCK,
                    data: expected_data,
                },
                MockCall::ReadBlock(BLOCK),
                MockCall::CancelTechnologyRequest,
            ]
        );
    }

    #[test]
    fn test_write_zero_fills_reserved_bytes() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.set_block(BLOCK, &[0xAA; 16]);
        service(&tag).write_tag(3, 7, 0).unwrap();

        let mut expected = vec![0u8; 16];
        expected[..3].copy_from_slice(&[3, 7, 0]);
        assert_eq!(tag.block(BLOCK).unwrap(), expected);
    }

    #[test]
    fn test_write_verification_failure() {
        let tag = MockTag::new(&AUTH_KEYS);
        let mut stale = [0u8; 16];
        stale[..3].copy_from_slice(&[5, 12, 9]);
        tag.set_block(BLOCK, &stale);
        tag.drop_writes();

        let svc = service(&tag);
        let resp = svc.write(5, 12, 1);
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Write verification failed"));
        assert_balanced(&tag);
        assert_eq!(tag.release_count(), 1);
    }

    #[test]
    fn test_write_transport_failure_releases() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.fail_write();
        let err = service(&tag).write_tag(1, 1, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "Write failed: mock write error");
        assert_balanced(&tag);
    }

    #[test]
    fn test_read_transport_failure_releases() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.fail_read();
        let resp = service(&tag).read();
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("Tag lost during transfer"));
        assert_balanced(&tag);
    }

    #[test]
    fn test_failed_acquire_still_released() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.fail_request();
        let err = service(&tag).read_tag().unwrap_err();
        assert!(matches!(
            err,
            TagError::Transport(TransportError::TagNotPresent)
        ));
        assert_eq!(tag.acquire_count(), 1);
        assert_eq!(tag.release_count(), 1);
        assert!(tag.auth_attempts().is_empty());
    }

    #[test]
    fn test_capability_errors_skip_session() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.set_mifare_classic(false);
        let err = service(&tag).read_tag().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
        assert_eq!(tag.acquire_count(), 0);
        assert_eq!(tag.release_count(), 0);

        let tag = MockTag::new(&AUTH_KEYS);
        tag.set_enabled(false);
        let resp = service(&tag).write(1, 1, 1);
        assert_eq!(resp.error.as_deref(), Some("NFC is disabled"));
        assert_eq!(tag.acquire_count(), 0);
    }

    #[test]
    fn test_not_started_reported_before_init() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.require_start();
        let svc = service(&tag);

        let err = svc.read_tag().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
        assert_eq!(err.to_string(), "NFC subsystem not started");
        assert_eq!(tag.acquire_count(), 0);

        assert!(svc.initialize_capability());
        svc.read_tag().unwrap();
    }

    #[test]
    fn test_concurrent_operations_serialized() {
        let tag = MockTag::new(&AUTH_KEYS[1..]);
        let svc = Arc::new(service(&tag));

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let svc = Arc::clone(&svc);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        if i % 2 == 0 {
                            svc.write_tag(i + 1, 1, 1).unwrap();
                        } else {
                            svc.read_tag().unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tag.overlapping_requests(), 0);
        assert_eq!(tag.acquire_count(), 200);
        assert_balanced(&tag);
    }

    #[test]
    fn test_initialize_capability_idempotent() {
        let tag = MockTag::new(&AUTH_KEYS);
        let svc = service(&tag);
        assert!(!svc.is_initialized());
        assert!(svc.initialize_capability());
        assert!(svc.initialize_capability());
        assert!(svc.is_initialized());

        let starts = tag
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Start))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_initialize_capability_unsupported() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.set_supported(false);
        let svc = service(&tag);
        assert!(!svc.initialize_capability());
        assert!(!svc.is_initialized());
        assert_eq!(tag.calls(), vec![MockCall::IsSupported]);
    }

    #[test]
    fn test_cleanup_releases() {
        let tag = MockTag::new(&AUTH_KEYS);
        tag.request_technology(NfcTech::MifareClassic).unwrap();
        service(&tag).cleanup();
        assert!(!tag.is_session_open());
        assert_eq!(tag.release_count(), 1);
    }

    #[test]
    fn test_read_event_sequence() {
        let tag = MockTag::new(&AUTH_KEYS[1..]);
        let observer = Arc::new(RecordingObserver::default());
        let svc = TagService::with_observer(tag.clone(), SessionConfig::default(), observer.clone());
        svc.read_tag().unwrap();

        let events = observer.events.lock().unwrap();
        let names: Vec<&str> = events
            .iter()
            .map(|e| match e {
                TagEvent::SessionOpened { .. } => "open",
                TagEvent::AuthAttempt { accepted: false, .. } => "rejected",
                TagEvent::AuthAttempt { accepted: true, .. } => "accepted",
                TagEvent::BlockRead { .. } => "read",
                TagEvent::SessionClosed => "close",
                TagEvent::Completed { .. } => "done",
                _ => "other",
            })
            .collect();
        assert_eq!(
            names,
            vec!["open", "rejected", "accepted", "read", "close", "done"]
        );
    }

    #[test]
    fn test_failure_event_carries_kind() {
        let tag = MockTag::new(&[]);
        let observer = Arc::new(RecordingObserver::default());
        let svc = TagService::with_observer(tag, SessionConfig::default(), observer.clone());
        let _ = svc.read();

        let events = observer.events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(TagEvent::Failed {
                operation: TagOperation::Read,
                kind: ErrorKind::Authentication,
                ..
            })
        ));
    }

    #[test]
    fn test_write_then_read_scenario() {
        let tag = MockTag::new(&AUTH_KEYS[1..]);
        let svc = service(&tag);

        let resp = svc.write(5, 12, 1);
        assert_eq!(resp, TagResponse::done());

        let resp = svc.read();
        assert!(resp.success);
        let record = resp.data.unwrap();
        assert_eq!(record.material_code, 5);
        assert_eq!(record.color_code, 12);
        assert_eq!(record.manufacturer_code, 1);
        assert_eq!(record.material_name, material_name(5));
        assert_eq!(record.color_name, color_name(12));
        assert_eq!(record.color_rgb, color_rgb(12));
        assert_eq!(&record.raw_block[3..], &[0u8; 13]);

        assert_eq!(tag.acquire_count(), 2);
        assert_balanced(&tag);
    }
}
