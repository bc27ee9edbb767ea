use std::sync::Arc;

use thiserror::Error;

/// Errors produced while resolving a URL into media descriptors.
///
/// `UrlParse` and `UnsupportedMediaType` are sequence-level: the whole
/// URL is abandoned. The remaining media variants are per-item and are
/// yielded inline by the resolver stream so that sibling items keep
/// flowing.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to parse URL: {0}")]
    UrlParse(String),

    #[error("unsupported URL media type: {0}")]
    UnsupportedMediaType(String),

    #[error("media not found: {media_id}")]
    MediaNotFound { media_id: String },

    #[error("media is not streamable: {media_id}")]
    MediaUnstreamable { media_id: String },

    #[error("DRM is disabled, cannot process media: {media_id}")]
    DrmDisabled { media_id: String },

    #[error("selected audio quality is not available: {media_id}")]
    AudioQualityUnavailable {
        media_id: String,
        /// Human-readable title, attached once item metadata is known.
        title: Option<String>,
    },

    #[error("license key acquisition failed: {0}")]
    KeyAcquisition(String),

    #[error(transparent)]
    Api(#[from] crate::api::ApiError),
}

impl ResolveError {
    /// Whether this failure abandons the whole URL rather than one item.
    pub fn is_sequence_level(&self) -> bool {
        matches!(
            self,
            ResolveError::UrlParse(_) | ResolveError::UnsupportedMediaType(_)
        )
    }

    /// The title of the failed item, when metadata got far enough to know it.
    pub fn media_title(&self) -> Option<&str> {
        match self {
            ResolveError::AudioQualityUnavailable { title, .. } => title.as_deref(),
            _ => None,
        }
    }

    /// Recover a shared error produced by a memoized collection fetch.
    ///
    /// `moka` hands the same `Arc`'d error to every waiter. The sole
    /// owner gets the original back; concurrent waiters get a textual
    /// copy, which only loses the `source` chain.
    pub fn shared(err: Arc<ResolveError>) -> ResolveError {
        match Arc::try_unwrap(err) {
            Ok(err) => err,
            Err(arc) => ResolveError::Api(crate::api::ApiError::Other(arc.to_string())),
        }
    }
}
