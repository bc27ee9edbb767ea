//! # Spindle Stager
//!
//! Takes the immutable [`spindle_interface::media::MediaDescriptor`]
//! values the resolver produces and turns each into a finished file:
//! download (built-in HTTP or an external downloader), decrypt,
//! remux/merge via external tools, tag with `lofty`, and move into a
//! template-driven location under the output root, maintaining `.m3u8`
//! playlist files along the way.
//!
//! Items are processed one at a time; per-item scratch state lives in
//! its own temp directory and is removed when the item finishes,
//! successfully or not.

pub mod decrypt;
pub mod download;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod playlist;
pub mod remux;
pub mod tagging;
pub mod template;
pub mod tools;

pub use download::DownloadBackend;
pub use error::StageError;
pub use paths::PathConfig;
pub use pipeline::{Stager, StagerOptions, StagingPlan};
pub use remux::{AudioRemuxMode, VideoRemuxMode};
pub use tools::ToolConfig;
