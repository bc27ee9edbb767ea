//! Quality and profile negotiation against declared playback manifests.
//!
//! Audio qualities form a ladder per codec family; negotiation walks
//! the ladder downward until the manifest declares a matching format.
//! Video selection filters the profile list by container and DRM
//! binding, then picks by resolution ceiling or delegates to an
//! injected selector.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{AudioFileEntry, PlaybackManifest, VideoContent, VideoManifest, VideoProfile};
use crate::error::ResolveError;

/// Ordered audio quality tiers. `previous()` steps down within the
/// same codec family only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioQuality {
    VorbisHigh,
    #[default]
    VorbisMedium,
    VorbisLow,
    AacHigh,
    AacMedium,
}

impl AudioQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::VorbisHigh => "vorbis-high",
            AudioQuality::VorbisMedium => "vorbis-medium",
            AudioQuality::VorbisLow => "vorbis-low",
            AudioQuality::AacHigh => "aac-high",
            AudioQuality::AacMedium => "aac-medium",
        }
    }

    /// Format id the manifest uses for this tier.
    pub fn format_id(&self) -> &'static str {
        match self {
            AudioQuality::VorbisHigh => "2",
            AudioQuality::VorbisMedium => "1",
            AudioQuality::VorbisLow => "0",
            AudioQuality::AacHigh => "11",
            AudioQuality::AacMedium => "10",
        }
    }

    /// Tiers gated on premium entitlement.
    pub fn is_premium(&self) -> bool {
        matches!(self, AudioQuality::VorbisHigh | AudioQuality::AacHigh)
    }

    /// AAC tiers live in the MP4 file list, Vorbis tiers in the Ogg
    /// list.
    pub fn is_mp4(&self) -> bool {
        matches!(self, AudioQuality::AacHigh | AudioQuality::AacMedium)
    }

    pub fn previous(&self) -> Option<AudioQuality> {
        match self {
            AudioQuality::VorbisHigh => Some(AudioQuality::VorbisMedium),
            AudioQuality::VorbisMedium => Some(AudioQuality::VorbisLow),
            AudioQuality::VorbisLow => None,
            AudioQuality::AacHigh => Some(AudioQuality::AacMedium),
            AudioQuality::AacMedium => None,
        }
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vorbis-high" => Ok(AudioQuality::VorbisHigh),
            "vorbis-medium" => Ok(AudioQuality::VorbisMedium),
            "vorbis-low" => Ok(AudioQuality::VorbisLow),
            "aac-high" => Ok(AudioQuality::AacHigh),
            "aac-medium" => Ok(AudioQuality::AacMedium),
            other => Err(format!("unknown audio quality: {other}")),
        }
    }
}

impl std::fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of audio negotiation: the tier actually granted and the
/// manifest file id to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedAudio {
    pub quality: AudioQuality,
    pub file_id: String,
}

/// Walk the quality ladder until the manifest declares a matching
/// format id.
///
/// Premium tiers without entitlement fail immediately rather than
/// falling back, as does an AAC request when the manifest carries no
/// MP4 file list at all.
pub fn negotiate_audio(
    manifest: &PlaybackManifest,
    requested: AudioQuality,
    premium: bool,
    media_id: &str,
) -> Result<NegotiatedAudio, ResolveError> {
    let unavailable = || ResolveError::AudioQualityUnavailable {
        media_id: media_id.to_string(),
        title: None,
    };

    if requested.is_premium() && !premium {
        return Err(unavailable());
    }
    if requested.is_mp4() && manifest.file_ids_mp4.is_empty() {
        return Err(unavailable());
    }

    let mut quality = requested;
    loop {
        let pool: &[AudioFileEntry] = if quality.is_mp4() {
            &manifest.file_ids_mp4
        } else {
            &manifest.file_ids_ogg
        };
        if let Some(entry) = pool.iter().find(|e| e.format == quality.format_id()) {
            if quality != requested {
                debug!(%requested, granted = %quality, "audio quality fell back");
            }
            return Ok(NegotiatedAudio {
                quality,
                file_id: entry.file_id.clone(),
            });
        }
        match quality.previous() {
            Some(lower) => quality = lower,
            None => return Err(unavailable()),
        }
    }
}

/// Target container for video downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoFormat {
    #[default]
    Mp4,
    Webm,
    /// Present the filtered candidate list for manual choice.
    Ask,
}

impl VideoFormat {
    fn mime_prefix(&self, kind: TrackRole) -> &'static str {
        match (self, kind) {
            (VideoFormat::Webm, TrackRole::Video) => "video/webm",
            (VideoFormat::Webm, TrackRole::Audio) => "audio/webm",
            (_, TrackRole::Video) => "video/mp4",
            (_, TrackRole::Audio) => "audio/mp4",
        }
    }
}

impl FromStr for VideoFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(VideoFormat::Mp4),
            "webm" => Ok(VideoFormat::Webm),
            "ask" => Ok(VideoFormat::Ask),
            other => Err(format!("unknown video format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Video,
    Audio,
}

/// Injected choice point for `VideoFormat::Ask`.
///
/// Returns an index into the candidate slice, or `None` to abort the
/// item.
pub trait ProfileSelector: Send + Sync {
    fn choose_video(&self, candidates: &[&VideoProfile]) -> Option<usize>;
    fn choose_audio(&self, candidates: &[&VideoProfile]) -> Option<usize>;
}

/// Index of the Widevine entry in a content's encryption info list.
pub fn widevine_index(content: &VideoContent) -> Option<usize> {
    content
        .encryption_infos
        .iter()
        .position(|info| info.key_system.to_ascii_lowercase().contains("widevine"))
}

/// Profiles matching the requested container for one track role,
/// restricted to those bound to the content's Widevine encryption
/// entry (profiles with no declared binding always qualify).
pub fn filter_profiles<'a>(
    content: &'a VideoContent,
    format: VideoFormat,
    role: TrackRole,
) -> Vec<&'a VideoProfile> {
    let key_index = widevine_index(content);
    content
        .profiles
        .iter()
        .filter(|profile| profile.mime_type.starts_with(format.mime_prefix(role)))
        .filter(|profile| match (&profile.encryption_indices, key_index) {
            (Some(indices), Some(index)) => indices.contains(&index),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect()
}

/// Highest resolution not above the ceiling, ties broken by higher
/// bitrate; when nothing fits under the ceiling, the lowest available
/// resolution.
pub fn select_video_by_resolution<'a>(
    candidates: &[&'a VideoProfile],
    ceiling: u32,
) -> Option<&'a VideoProfile> {
    let under: Vec<&&VideoProfile> = candidates
        .iter()
        .filter(|p| p.video_height.unwrap_or(0) <= ceiling)
        .collect();
    if under.is_empty() {
        return candidates
            .iter()
            .min_by_key(|p| p.video_height.unwrap_or(u32::MAX))
            .copied();
    }
    under
        .into_iter()
        .max_by_key(|p| (p.video_height.unwrap_or(0), p.video_bitrate.unwrap_or(0)))
        .copied()
}

/// Audio-for-video selection is one-dimensional: highest bitrate wins.
pub fn select_audio_by_bitrate<'a>(candidates: &[&'a VideoProfile]) -> Option<&'a VideoProfile> {
    candidates
        .iter()
        .max_by_key(|p| p.audio_bitrate.unwrap_or(0))
        .copied()
}

/// Expand one profile into its ordered segment URL list: the init
/// segment first, then timestamped media segments stepped by the
/// declared segment length, running slightly past the declared end
/// time so the tail fragment is never dropped. A declared segment
/// length of zero is malformed and yields `None`.
pub fn generate_segment_urls(
    manifest: &VideoManifest,
    content: &VideoContent,
    profile: &VideoProfile,
) -> Option<Vec<String>> {
    if content.segment_length == 0 {
        return None;
    }

    let base = manifest.base_urls.first().map(String::as_str).unwrap_or("");
    let profile_id = profile.id.to_string();

    let expand = |template: &str, timestamp: Option<u64>| {
        let mut url = template
            .replace("{{profile_id}}", &profile_id)
            .replace("{{file_type}}", &profile.file_type);
        if let Some(ts) = timestamp {
            url = url.replace("{{segment_timestamp}}", &ts.to_string());
        }
        format!("{base}{url}")
    };

    let mut urls = vec![expand(&manifest.initialization_template, None)];
    let end = content.end_time_millis / 1000 + 5;
    let mut timestamp = 0;
    while timestamp < end {
        urls.push(expand(&manifest.segment_template, Some(timestamp)));
        timestamp += content.segment_length;
    }
    Some(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EncryptionInfo;

    fn manifest(mp4: &[(&str, &str)], ogg: &[(&str, &str)]) -> PlaybackManifest {
        let entries = |list: &[(&str, &str)]| {
            list.iter()
                .map(|(format, file_id)| AudioFileEntry {
                    format: format.to_string(),
                    file_id: file_id.to_string(),
                })
                .collect()
        };
        PlaybackManifest {
            file_ids_mp4: entries(mp4),
            file_ids_ogg: entries(ogg),
            manifest_ids_video: Vec::new(),
        }
    }

    #[test]
    fn falls_back_through_vorbis_ladder() {
        let manifest = manifest(&[], &[("0", "low-file")]);
        let granted =
            negotiate_audio(&manifest, AudioQuality::VorbisMedium, false, "id").unwrap();
        assert_eq!(granted.quality, AudioQuality::VorbisLow);
        assert_eq!(granted.file_id, "low-file");
    }

    #[test]
    fn never_steps_up_the_ladder() {
        // Only the high tier is declared; a medium request must fail
        // rather than grab the better encode.
        let manifest = manifest(&[], &[("2", "high-file")]);
        let err = negotiate_audio(&manifest, AudioQuality::VorbisMedium, true, "id").unwrap_err();
        assert!(matches!(err, ResolveError::AudioQualityUnavailable { .. }));
    }

    #[test]
    fn premium_tier_without_entitlement_fails_immediately() {
        let manifest = manifest(&[("11", "aac-file")], &[("1", "ogg-file")]);
        let err = negotiate_audio(&manifest, AudioQuality::AacHigh, false, "id").unwrap_err();
        assert!(matches!(err, ResolveError::AudioQualityUnavailable { .. }));
    }

    #[test]
    fn aac_without_mp4_file_list_fails_immediately() {
        let manifest = manifest(&[], &[("1", "ogg-file")]);
        let err = negotiate_audio(&manifest, AudioQuality::AacMedium, true, "id").unwrap_err();
        assert!(matches!(err, ResolveError::AudioQualityUnavailable { .. }));
    }

    #[test]
    fn aac_falls_back_within_its_family() {
        let manifest = manifest(&[("10", "aac-med")], &[]);
        let granted = negotiate_audio(&manifest, AudioQuality::AacHigh, true, "id").unwrap();
        assert_eq!(granted.quality, AudioQuality::AacMedium);
    }

    fn profile(id: u64, mime: &str, height: Option<u32>, vbr: Option<u64>) -> VideoProfile {
        VideoProfile {
            id,
            file_type: "mp4".to_string(),
            mime_type: mime.to_string(),
            video_codec: None,
            audio_codec: None,
            video_width: None,
            video_height: height,
            video_bitrate: vbr,
            audio_bitrate: None,
            encryption_indices: None,
        }
    }

    fn content(profiles: Vec<VideoProfile>) -> VideoContent {
        VideoContent {
            profiles,
            encryption_infos: vec![EncryptionInfo {
                key_system: "widevine".to_string(),
                encryption_data: Some("cHNzaA==".to_string()),
            }],
            end_time_millis: 10_000,
            segment_length: 5,
        }
    }

    #[test]
    fn resolution_ceiling_picks_exact_match_and_breaks_ties_by_bitrate() {
        let content = content(vec![
            profile(1, "video/mp4", Some(480), Some(900)),
            profile(2, "video/mp4", Some(720), Some(2_000)),
            profile(3, "video/mp4", Some(720), Some(3_000)),
            profile(4, "video/mp4", Some(1080), Some(5_000)),
        ]);
        let candidates = filter_profiles(&content, VideoFormat::Mp4, TrackRole::Video);
        let chosen = select_video_by_resolution(&candidates, 720).unwrap();
        assert_eq!(chosen.id, 3);
    }

    #[test]
    fn ceiling_below_everything_yields_lowest_resolution() {
        let content = content(vec![
            profile(1, "video/mp4", Some(720), Some(2_000)),
            profile(2, "video/mp4", Some(1080), Some(5_000)),
        ]);
        let candidates = filter_profiles(&content, VideoFormat::Mp4, TrackRole::Video);
        let chosen = select_video_by_resolution(&candidates, 360).unwrap();
        assert_eq!(chosen.id, 1);
    }

    #[test]
    fn encryption_binding_filters_unbound_profiles() {
        let mut bound = profile(1, "video/mp4", Some(720), None);
        bound.encryption_indices = Some(vec![0]);
        let mut other_system = profile(2, "video/mp4", Some(720), None);
        other_system.encryption_indices = Some(vec![3]);
        let content = content(vec![bound, other_system]);

        let candidates = filter_profiles(&content, VideoFormat::Mp4, TrackRole::Video);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, 1);
    }

    #[test]
    fn segment_urls_cover_the_declared_duration() {
        let manifest = VideoManifest {
            contents: Vec::new(),
            base_urls: vec!["https://cdn.example/".to_string()],
            initialization_template: "init_{{profile_id}}.{{file_type}}".to_string(),
            segment_template: "seg_{{profile_id}}_{{segment_timestamp}}.{{file_type}}".to_string(),
        };
        let content = VideoContent {
            profiles: Vec::new(),
            encryption_infos: Vec::new(),
            end_time_millis: 10_000,
            segment_length: 5,
        };
        let profile = profile(7, "video/mp4", Some(720), None);

        let urls = generate_segment_urls(&manifest, &content, &profile).unwrap();
        // init + timestamps 0,5,10 (end 10s + 5s overrun, exclusive).
        assert_eq!(
            urls,
            vec![
                "https://cdn.example/init_7.mp4".to_string(),
                "https://cdn.example/seg_7_0.mp4".to_string(),
                "https://cdn.example/seg_7_5.mp4".to_string(),
                "https://cdn.example/seg_7_10.mp4".to_string(),
            ]
        );
    }

    #[test]
    fn zero_segment_length_is_rejected() {
        let manifest = VideoManifest {
            contents: Vec::new(),
            base_urls: vec!["https://cdn.example/".to_string()],
            initialization_template: "init_{{profile_id}}.{{file_type}}".to_string(),
            segment_template: "seg_{{profile_id}}_{{segment_timestamp}}.{{file_type}}".to_string(),
        };
        let content = VideoContent {
            profiles: Vec::new(),
            encryption_infos: Vec::new(),
            end_time_millis: 10_000,
            segment_length: 0,
        };
        let profile = profile(7, "video/mp4", Some(720), None);

        assert_eq!(generate_segment_urls(&manifest, &content, &profile), None);
    }
}
