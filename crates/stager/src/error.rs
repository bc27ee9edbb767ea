use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of the staging pipeline.
///
/// The first three variants are per-item skip conditions rather than
/// genuine faults; callers typically log them and move to the next
/// item without counting them as errors.
#[derive(Debug, Error)]
pub enum StageError {
    /// A required external tool was not found on PATH (or at the
    /// configured override path).
    #[error("required tool not found: {0}")]
    DependencyNotFound(String),

    /// The final file already exists and overwrite is off.
    #[error("media file already exists: {0}")]
    MediaFileExists(PathBuf),

    /// Synced-lyrics-only mode is active and the lyrics file (when
    /// any) has been written; nothing else to do for this item.
    #[error("synced lyrics only")]
    SyncedLyricsOnly,

    /// An external tool exited with a non-zero status.
    #[error("{tool} exited with status {code}")]
    ToolFailed { tool: String, code: i32 },

    /// The decrypted stream never reached an `OggS` capture pattern.
    #[error("no Ogg page marker found in decrypted stream")]
    OggMarkerNotFound,

    /// A content key was not valid 128-bit hex material.
    #[error("malformed decryption key: {0}")]
    MalformedKey(String),

    /// An encrypted stream arrived without decryption material.
    #[error("item carries no decryption key")]
    MissingKey,

    /// A video item whose stream info has no video track.
    #[error("video item carries no video track")]
    MissingVideoTrack,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tagging failed: {0}")]
    Tag(#[from] lofty::error::LoftyError),
}

impl StageError {
    /// Whether this is a skip condition rather than an error.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            StageError::DependencyNotFound(_)
                | StageError::MediaFileExists(_)
                | StageError::SyncedLyricsOnly
        )
    }
}
