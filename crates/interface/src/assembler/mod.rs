//! Per-kind media item assemblers.
//!
//! Each assembler turns one playback manifest plus its metadata into a
//! complete [`MediaDescriptor`]: tags, lyrics, cover URL, negotiated
//! stream info and decryption material. Assemblers share one
//! [`AssemblerContext`] by reference; there is no inheritance between
//! kinds, shared behavior lives in free functions here.

mod audio;
pub mod episode;
pub mod episode_video;
pub mod music_video;
pub mod song;
mod video;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::{CopyrightList, LyricsResponse, SpotifyApi};
use crate::cache::CollectionCache;
use crate::cdm::KeyBroker;
use crate::error::ResolveError;
use crate::media::{CoverSize, Lyrics};
use crate::negotiator::{AudioQuality, ProfileSelector, VideoFormat};

pub use episode::EpisodeAssembler;
pub use episode_video::EpisodeVideoAssembler;
pub use music_video::MusicVideoAssembler;
pub use song::SongAssembler;

/// Negotiation and presentation knobs shared by every assembler.
pub struct AssemblerOptions {
    pub audio_quality: AudioQuality,
    pub video_format: VideoFormat,
    /// Resolution ceiling for video profile selection.
    pub resolution: u32,
    pub cover_size: CoverSize,
    /// Choice point for `VideoFormat::Ask`; unset falls back to the
    /// automatic selection.
    pub selector: Option<Arc<dyn ProfileSelector>>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        AssemblerOptions {
            audio_quality: AudioQuality::default(),
            video_format: VideoFormat::default(),
            resolution: 1080,
            cover_size: CoverSize::default(),
            selector: None,
        }
    }
}

/// Shared collaborators handed to each assembler by reference.
pub struct AssemblerContext {
    pub api: Arc<dyn SpotifyApi>,
    pub cache: CollectionCache,
    /// Absent when DRM is globally disabled; assemblers whose stream
    /// requires a license fail with [`ResolveError::DrmDisabled`].
    pub broker: Option<KeyBroker>,
    pub options: AssemblerOptions,
}

/// "A", "A & B", "A, B & C".
pub fn format_names(names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(one.clone()),
        [a, b] => Some(format!("{a} & {b}")),
        [init @ .., last] => Some(format!("{} & {last}", init.join(", "))),
    }
}

/// Release date from the API's ISO timestamp; malformed input drops
/// the tag rather than failing the item.
pub fn parse_date(iso: &str) -> Option<NaiveDate> {
    chrono::DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Phonogram copyright wins over the plain one.
pub fn parse_copyright(list: &CopyrightList) -> Option<String> {
    list.items
        .iter()
        .find(|item| item.kind == "P")
        .or_else(|| list.items.iter().find(|item| item.kind == "C"))
        .map(|item| item.text.clone())
}

/// Swap the 16-char size-class prefix of the final path segment for
/// the requested size, keeping the image id suffix.
pub fn transform_cover_url(url: &str, size: CoverSize, size_map: &[(CoverSize, &str)]) -> String {
    let (base, cover_id) = match url.rsplit_once('/') {
        Some(parts) => parts,
        None => ("", url),
    };
    let prefix = size_map
        .iter()
        .find(|(s, _)| *s == size)
        .map(|(_, id)| *id)
        .unwrap_or("");
    let suffix = cover_id.get(16..).unwrap_or("");
    format!("{base}/{prefix}{suffix}")
}

/// Disc layout recovered from a flat sibling track list.
///
/// The track total is the highest track number seen; disc boundaries
/// are the positions where the track number drops below its
/// predecessor. Fragile for albums with uneven disc lengths, but it is
/// the only signal this metadata carries.
pub fn parse_disc_info(track_numbers: &[u32], current_index: usize) -> (u32, u32, u32) {
    let track_total = track_numbers.iter().copied().max().unwrap_or(0);
    let disc_total = if track_total == 0 {
        0
    } else {
        track_numbers.len() as u32 / track_total
    };

    let mut disc = 1;
    for i in 1..=current_index.min(track_numbers.len().saturating_sub(1)) {
        if track_numbers[i] < track_numbers[i - 1] {
            disc += 1;
        }
    }

    (disc, disc_total, track_total)
}

fn lrc_timestamp(ms: u64) -> String {
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1_000) % 60;
    let centis = (ms % 1_000) / 10;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}

/// Split a lyrics payload into the synced (LRC line timestamps) and
/// unsynced variants. Unsynced text keeps a trailing newline.
pub fn parse_lyrics(response: &LyricsResponse) -> Lyrics {
    let line_synced = response.lyrics.sync_type == "LINE_SYNCED";
    let mut synced_lines = Vec::new();
    let mut unsynced_lines = Vec::new();

    for line in &response.lyrics.lines {
        if line_synced {
            let ms = line.start_time_ms.parse::<u64>().unwrap_or(0);
            synced_lines.push(format!("[{}]{}", lrc_timestamp(ms), line.words));
        }
        unsynced_lines.push(line.words.clone());
    }

    Lyrics {
        synced: (!synced_lines.is_empty()).then(|| synced_lines.join("\n")),
        unsynced: (!unsynced_lines.is_empty()).then(|| unsynced_lines.join("\n") + "\n"),
    }
}

/// Attach the item's title to a quality failure so the caller can
/// report something readable.
pub(crate) fn tag_quality_error(err: ResolveError, item_title: &str) -> ResolveError {
    match err {
        ResolveError::AudioQualityUnavailable { media_id, .. } => {
            ResolveError::AudioQualityUnavailable {
                media_id,
                title: Some(item_title.to_string()),
            }
        }
        other => other,
    }
}

/// Cover size-class prefixes per media kind.
pub(crate) mod cover_ids {
    use crate::media::CoverSize;

    pub const SONG: [(CoverSize, &str); 4] = [
        (CoverSize::Small, "ab67616d00004851"),
        (CoverSize::Medium, "ab67616d00001e02"),
        (CoverSize::Large, "ab67616d0000b273"),
        (CoverSize::ExtraLarge, "ab67616d000082c1"),
    ];

    pub const EPISODE: [(CoverSize, &str); 4] = [
        (CoverSize::Small, "ab6765630000f68d"),
        (CoverSize::Medium, "ab67656300005f1f"),
        (CoverSize::Large, "ab6765630000ba8a"),
        (CoverSize::ExtraLarge, "ab6765630000ba8a"),
    ];

    pub const VIDEO: [(CoverSize, &str); 4] = [
        (CoverSize::Small, "ab6742d3000052b7"),
        (CoverSize::Medium, "ab6742d3000052b7"),
        (CoverSize::Large, "ab6742d3000053b7"),
        (CoverSize::ExtraLarge, "ab6742d3000053b7"),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{LyricLine, LyricsData};

    #[test]
    fn name_joining() {
        assert_eq!(format_names(&[]), None);
        assert_eq!(format_names(&["A".into()]).unwrap(), "A");
        assert_eq!(format_names(&["A".into(), "B".into()]).unwrap(), "A & B");
        assert_eq!(
            format_names(&["A".into(), "B".into(), "C".into()]).unwrap(),
            "A, B & C"
        );
    }

    #[test]
    fn disc_info_detects_disc_boundary() {
        // [1,2,3,1,2]: three tracks per disc, the 4th sibling opens
        // disc 2.
        let (disc, disc_total, track_total) = parse_disc_info(&[1, 2, 3, 1, 2], 3);
        assert_eq!(track_total, 3);
        assert_eq!(disc, 2);
        assert_eq!(disc_total, 1);

        let (disc, _, _) = parse_disc_info(&[1, 2, 3, 1, 2], 1);
        assert_eq!(disc, 1);
    }

    #[test]
    fn cover_url_swaps_size_prefix_and_keeps_id() {
        let url = "https://i.scdn.co/image/ab67616d0000b273deadbeefcafe0123";
        let transformed = transform_cover_url(url, CoverSize::Small, &cover_ids::SONG);
        assert_eq!(
            transformed,
            "https://i.scdn.co/image/ab67616d00004851deadbeefcafe0123"
        );
    }

    #[test]
    fn lyrics_synced_lines_carry_lrc_timestamps() {
        let response = LyricsResponse {
            lyrics: LyricsData {
                sync_type: "LINE_SYNCED".to_string(),
                lines: vec![
                    LyricLine {
                        start_time_ms: "0".to_string(),
                        words: "first".to_string(),
                    },
                    LyricLine {
                        start_time_ms: "83450".to_string(),
                        words: "second".to_string(),
                    },
                ],
            },
        };
        let lyrics = parse_lyrics(&response);
        assert_eq!(lyrics.synced.as_deref(), Some("[00:00.00]first\n[01:23.45]second"));
        assert_eq!(lyrics.unsynced.as_deref(), Some("first\nsecond\n"));
    }

    #[test]
    fn unsynced_only_when_not_line_synced() {
        let response = LyricsResponse {
            lyrics: LyricsData {
                sync_type: "UNSYNCED".to_string(),
                lines: vec![LyricLine {
                    start_time_ms: "0".to_string(),
                    words: "words".to_string(),
                }],
            },
        };
        let lyrics = parse_lyrics(&response);
        assert!(lyrics.synced.is_none());
        assert_eq!(lyrics.unsynced.as_deref(), Some("words\n"));
    }

    #[test]
    fn date_parsing_tolerates_garbage() {
        assert_eq!(
            parse_date("2016-05-20T00:00:00Z"),
            NaiveDate::from_ymd_opt(2016, 5, 20)
        );
        assert_eq!(parse_date("not a date"), None);
    }
}
