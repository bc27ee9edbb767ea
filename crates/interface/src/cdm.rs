//! DRM key brokering over a content-decryption-module collaborator.
//!
//! The CDM itself (device provisioning, challenge crypto) is external;
//! this module owns the session lifecycle: open, challenge, license
//! exchange, key extraction, and a close that runs on every exit path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ContentKind, SpotifyApi};
use crate::error::ResolveError;
use crate::media::DecryptionKey;

#[derive(Debug, Error)]
pub enum CdmError {
    #[error("cdm session error: {0}")]
    Session(String),

    #[error("license parse error: {0}")]
    License(String),
}

/// Opaque handle to one CDM session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdmKeyKind {
    Content,
    Signing,
}

/// One key extracted from a parsed license.
#[derive(Debug, Clone)]
pub struct CdmKey {
    pub kind: CdmKeyKind,
    pub key: Vec<u8>,
    pub key_id: Vec<u8>,
}

/// Content-decryption-module collaborator.
///
/// Sessions are cheap and never pooled; the broker opens one per key
/// acquisition and closes it unconditionally.
pub trait Cdm: Send + Sync {
    fn open(&self) -> Result<SessionId, CdmError>;

    fn close(&self, session: SessionId) -> Result<(), CdmError>;

    /// Build a license challenge from a session and a DRM system header.
    fn challenge(&self, session: &SessionId, pssh: &str) -> Result<Vec<u8>, CdmError>;

    fn parse_license(&self, session: &SessionId, license: &[u8]) -> Result<(), CdmError>;

    fn keys(&self, session: &SessionId) -> Result<Vec<CdmKey>, CdmError>;
}

/// Exchanges a license challenge for a content key.
#[derive(Clone)]
pub struct KeyBroker {
    cdm: Arc<dyn Cdm>,
    api: Arc<dyn SpotifyApi>,
}

impl KeyBroker {
    pub fn new(cdm: Arc<dyn Cdm>, api: Arc<dyn SpotifyApi>) -> KeyBroker {
        KeyBroker { cdm, api }
    }

    /// Acquire the content key for a stream's system header.
    ///
    /// The CDM session is closed whether or not the exchange succeeds.
    pub async fn acquire_key(
        &self,
        pssh: &str,
        content_kind: ContentKind,
    ) -> Result<DecryptionKey, ResolveError> {
        let session = self
            .cdm
            .open()
            .map_err(|e| ResolveError::KeyAcquisition(e.to_string()))?;

        let result = self.exchange(&session, pssh, content_kind).await;

        if let Err(close_err) = self.cdm.close(session) {
            warn!(error = %close_err, "failed to close CDM session");
        }

        result
    }

    async fn exchange(
        &self,
        session: &SessionId,
        pssh: &str,
        content_kind: ContentKind,
    ) -> Result<DecryptionKey, ResolveError> {
        let challenge = self
            .cdm
            .challenge(session, pssh)
            .map_err(|e| ResolveError::KeyAcquisition(e.to_string()))?;

        let license = self
            .api
            .get_widevine_license(&challenge, content_kind)
            .await?;

        self.cdm
            .parse_license(session, &license)
            .map_err(|e| ResolveError::KeyAcquisition(e.to_string()))?;

        let keys = self
            .cdm
            .keys(session)
            .map_err(|e| ResolveError::KeyAcquisition(e.to_string()))?;
        let content_key = keys
            .into_iter()
            .find(|key| key.kind == CdmKeyKind::Content)
            .ok_or_else(|| {
                ResolveError::KeyAcquisition("license carried no content key".to_string())
            })?;

        let key = DecryptionKey::new(hex::encode(&content_key.key), hex::encode(&content_key.key_id));
        debug!(key_id = %key.key_id, "received decryption key");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, testing::StubApi};
    use std::sync::Mutex;

    struct RecordingCdm {
        fail_license: bool,
        closed: Mutex<Vec<SessionId>>,
    }

    impl RecordingCdm {
        fn new(fail_license: bool) -> RecordingCdm {
            RecordingCdm {
                fail_license,
                closed: Mutex::new(Vec::new()),
            }
        }
    }

    impl Cdm for RecordingCdm {
        fn open(&self) -> Result<SessionId, CdmError> {
            Ok(SessionId(7))
        }

        fn close(&self, session: SessionId) -> Result<(), CdmError> {
            self.closed.lock().unwrap().push(session);
            Ok(())
        }

        fn challenge(&self, _session: &SessionId, _pssh: &str) -> Result<Vec<u8>, CdmError> {
            Ok(vec![1, 2, 3])
        }

        fn parse_license(&self, _session: &SessionId, _license: &[u8]) -> Result<(), CdmError> {
            if self.fail_license {
                Err(CdmError::License("bad license".to_string()))
            } else {
                Ok(())
            }
        }

        fn keys(&self, _session: &SessionId) -> Result<Vec<CdmKey>, CdmError> {
            Ok(vec![
                CdmKey {
                    kind: CdmKeyKind::Signing,
                    key: vec![0xff; 16],
                    key_id: vec![0x01; 16],
                },
                CdmKey {
                    kind: CdmKeyKind::Content,
                    key: vec![0xab; 16],
                    key_id: vec![0xcd; 16],
                },
            ])
        }
    }

    fn broker(fail_license: bool) -> (Arc<RecordingCdm>, KeyBroker) {
        let cdm = Arc::new(RecordingCdm::new(fail_license));
        let api = Arc::new(StubApi::default());
        (cdm.clone(), KeyBroker::new(cdm, api))
    }

    #[tokio::test]
    async fn returns_content_key_as_hex() {
        let (cdm, broker) = broker(false);
        let key = broker
            .acquire_key("AAAA", ContentKind::Audio)
            .await
            .unwrap();
        assert_eq!(key.key, "ab".repeat(16));
        assert_eq!(key.key_id, "cd".repeat(16));
        assert_eq!(cdm.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closes_session_on_failure() {
        let (cdm, broker) = broker(true);
        let err = broker
            .acquire_key("AAAA", ContentKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::KeyAcquisition(_)));
        assert_eq!(cdm.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closes_session_when_license_endpoint_fails() {
        let cdm = Arc::new(RecordingCdm::new(false));
        let api = Arc::new(StubApi::failing_license(|| {
            ApiError::Other("license endpoint down".to_string())
        }));
        let broker = KeyBroker::new(cdm.clone(), api);
        assert!(broker.acquire_key("AAAA", ContentKind::Audio).await.is_err());
        assert_eq!(cdm.closed.lock().unwrap().len(), 1);
    }
}
