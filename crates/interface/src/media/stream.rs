use serde::{Deserialize, Serialize};

/// Location of one track's bytes: a single CDN URL or an ordered
/// fragment sequence for segmented delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamSource {
    Single(String),
    Segments(Vec<String>),
}

impl StreamSource {
    pub fn segment_count(&self) -> usize {
        match self {
            StreamSource::Single(_) => 1,
            StreamSource::Segments(urls) => urls.len(),
        }
    }
}

/// One elementary stream of a media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTrack {
    pub source: StreamSource,
    /// Opaque DRM system header (base64 PSSH). Present only when the
    /// track needs a license exchange before it can be decrypted.
    pub pssh: Option<String>,
    /// Container format tag: "mp4", "webm" or "ogg".
    pub container: String,
}

/// Negotiated stream information for a media item: an audio track and,
/// for video items, a video track sharing one output container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub audio: StreamTrack,
    pub video: Option<StreamTrack>,
    /// Container of the finished file.
    pub container: String,
}

impl StreamInfo {
    pub fn audio_only(audio: StreamTrack) -> StreamInfo {
        let container = audio.container.clone();
        StreamInfo {
            audio,
            video: None,
            container,
        }
    }
}

const ZERO_KEY_ID: &str = "00000000000000000000000000000000";

/// Podcast audio carries no real DRM; the service uses one well-known
/// constant key for every episode.
pub const PODCAST_STATIC_KEY: [u8; 16] = [
    0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0xbe, 0xef,
];

/// A 128-bit content key and its key id, both lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionKey {
    pub key: String,
    pub key_id: String,
}

impl DecryptionKey {
    pub fn new(key: impl Into<String>, key_id: impl Into<String>) -> DecryptionKey {
        DecryptionKey {
            key: key.into(),
            key_id: key_id.into(),
        }
    }

    /// Key with no meaningful key id (raw stream-cipher content).
    pub fn without_id(key_bytes: &[u8]) -> DecryptionKey {
        DecryptionKey {
            key: hex::encode(key_bytes),
            key_id: ZERO_KEY_ID.to_string(),
        }
    }

    pub fn key_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.key)
    }
}

/// Decryption material for an item: one key for audio and, when the
/// video track was licensed separately, one for video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub audio: DecryptionKey,
    pub video: Option<DecryptionKey>,
}

impl KeyPair {
    pub fn audio_only(audio: DecryptionKey) -> KeyPair {
        KeyPair { audio, video: None }
    }
}
