//! Shared video stream negotiation for the two video assemblers.

use tracing::debug;

use crate::api::PlaybackInfo;
use crate::error::ResolveError;
use crate::media::{StreamInfo, StreamSource, StreamTrack};
use crate::negotiator::{
    TrackRole, VideoFormat, filter_profiles, generate_segment_urls, select_audio_by_bitrate,
    select_video_by_resolution, widevine_index,
};

use super::AssemblerContext;

/// Negotiate profiles for a video item and expand them into segmented
/// stream tracks. Audio and video share the content's Widevine system
/// header, when one is declared.
pub(super) async fn video_stream_info(
    ctx: &AssemblerContext,
    playback_info: &PlaybackInfo,
) -> Result<StreamInfo, ResolveError> {
    let media_id = playback_info.media_id().to_string();
    let unstreamable = || ResolveError::MediaUnstreamable {
        media_id: media_id.clone(),
    };

    let file_id = playback_info
        .manifest
        .manifest_ids_video
        .first()
        .map(|entry| entry.file_id.clone())
        .ok_or_else(unstreamable)?;

    let manifest = ctx.api.get_video_manifest(&file_id).await?;
    let content = manifest.contents.first().ok_or_else(unstreamable)?;

    let pssh = widevine_index(content)
        .and_then(|index| content.encryption_infos[index].encryption_data.clone());

    let format = ctx.options.video_format;
    let video_candidates = filter_profiles(content, format, TrackRole::Video);
    let audio_candidates = filter_profiles(content, format, TrackRole::Audio);

    let (video_profile, audio_profile) = match (format, &ctx.options.selector) {
        (VideoFormat::Ask, Some(selector)) => {
            let video = selector
                .choose_video(&video_candidates)
                .and_then(|i| video_candidates.get(i).copied())
                .ok_or_else(unstreamable)?;
            let audio = selector
                .choose_audio(&audio_candidates)
                .and_then(|i| audio_candidates.get(i).copied())
                .ok_or_else(unstreamable)?;
            (video, audio)
        }
        _ => {
            let video = select_video_by_resolution(&video_candidates, ctx.options.resolution)
                .ok_or_else(unstreamable)?;
            let audio = select_audio_by_bitrate(&audio_candidates).ok_or_else(unstreamable)?;
            (video, audio)
        }
    };
    debug!(
        video_profile = video_profile.id,
        audio_profile = audio_profile.id,
        "selected video profiles"
    );

    let video_urls =
        generate_segment_urls(&manifest, content, video_profile).ok_or_else(unstreamable)?;
    let audio_urls =
        generate_segment_urls(&manifest, content, audio_profile).ok_or_else(unstreamable)?;

    let container = if [video_profile, audio_profile]
        .iter()
        .any(|p| p.mime_type.ends_with("webm"))
    {
        "webm"
    } else {
        "mp4"
    };

    Ok(StreamInfo {
        audio: StreamTrack {
            source: StreamSource::Segments(audio_urls),
            pssh: pssh.clone(),
            container: container.to_string(),
        },
        video: Some(StreamTrack {
            source: StreamSource::Segments(video_urls),
            pssh,
            container: container.to_string(),
        }),
        container: container.to_string(),
    })
}
