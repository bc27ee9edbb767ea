use std::sync::LazyLock;

use regex::Regex;

use crate::error::ResolveError;

static URL_INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https://open\.spotify\.com(?:/intl-(?P<intl>[a-z]{2}))?/(?P<media_type>album|playlist|track|show|episode|artist)/(?P<media_id>\w{22})",
    )
    .expect("URL pattern is valid")
});

/// What kind of page a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaUrlKind {
    Track,
    Episode,
    Album,
    Show,
    Playlist,
    Artist,
}

impl MediaUrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaUrlKind::Track => "track",
            MediaUrlKind::Episode => "episode",
            MediaUrlKind::Album => "album",
            MediaUrlKind::Show => "show",
            MediaUrlKind::Playlist => "playlist",
            MediaUrlKind::Artist => "artist",
        }
    }
}

/// Parsed identity of a streaming-service URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInfo {
    pub kind: MediaUrlKind,
    pub media_id: String,
}

impl UrlInfo {
    /// Parse a canonical `open.spotify.com` URL, including the optional
    /// `/intl-xx/` locale segment.
    pub fn parse(url: &str) -> Result<UrlInfo, ResolveError> {
        let captures = URL_INFO_RE
            .captures(url)
            .ok_or_else(|| ResolveError::UrlParse(url.to_string()))?;

        let kind = match &captures["media_type"] {
            "track" => MediaUrlKind::Track,
            "episode" => MediaUrlKind::Episode,
            "album" => MediaUrlKind::Album,
            "show" => MediaUrlKind::Show,
            "playlist" => MediaUrlKind::Playlist,
            "artist" => MediaUrlKind::Artist,
            _ => unreachable!("pattern only matches known media types"),
        };

        Ok(UrlInfo {
            kind,
            media_id: captures["media_id"].to_string(),
        })
    }
}
