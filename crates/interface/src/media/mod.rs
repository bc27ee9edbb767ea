//! Immutable media data model shared by the resolver and the stager.

mod descriptor;
mod stream;
mod tags;

use std::fmt;

pub use descriptor::{Lyrics, MediaDescriptor, PlaylistTags};
pub use stream::{DecryptionKey, KeyPair, PODCAST_STATIC_KEY, StreamInfo, StreamSource, StreamTrack};
pub use tags::{Mp4TagValue, Tags};

/// Kind of downloadable item. Discriminant values are the MP4 `stik`
/// media-type codes the tagger writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Song,
    Podcast,
    MusicVideo,
    PodcastVideo,
}

impl MediaKind {
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::MusicVideo | MediaKind::PodcastVideo)
    }

    /// MP4 `stik` atom value. Video podcasts tag as podcasts.
    pub fn stik(&self) -> u8 {
        match self {
            MediaKind::Song => 1,
            MediaKind::MusicVideo => 6,
            MediaKind::Podcast | MediaKind::PodcastVideo => 21,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Song => "Song",
            MediaKind::MusicVideo => "Music Video",
            MediaKind::Podcast | MediaKind::PodcastVideo => "Podcast",
        };
        f.write_str(name)
    }
}

/// Content advisory rating, in the MP4 `rtng` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaRating {
    #[default]
    None,
    Explicit,
    Clean,
}

impl MediaRating {
    /// Map the API's content-rating label. Anything that is neither
    /// explicit nor unrated counts as clean.
    pub fn from_label(label: &str) -> MediaRating {
        match label {
            "EXPLICIT" => MediaRating::Explicit,
            "NONE" => MediaRating::None,
            _ => MediaRating::Clean,
        }
    }

    pub fn rtng(&self) -> u8 {
        match self {
            MediaRating::None => 0,
            MediaRating::Explicit => 1,
            MediaRating::Clean => 2,
        }
    }
}

impl fmt::Display for MediaRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaRating::None => "None",
            MediaRating::Explicit => "Explicit",
            MediaRating::Clean => "Clean",
        };
        f.write_str(name)
    }
}

/// Cover image size class requested from the image CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverSize {
    Small,
    Medium,
    Large,
    #[default]
    ExtraLarge,
}

impl CoverSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverSize::Small => "small",
            CoverSize::Medium => "medium",
            CoverSize::Large => "large",
            CoverSize::ExtraLarge => "extra-large",
        }
    }
}

impl std::str::FromStr for CoverSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(CoverSize::Small),
            "medium" => Ok(CoverSize::Medium),
            "large" => Ok(CoverSize::Large),
            "extra-large" => Ok(CoverSize::ExtraLarge),
            other => Err(format!("unknown cover size: {other}")),
        }
    }
}
