//! Shared audio stream negotiation for the song and episode
//! assemblers.

use tracing::debug;

use crate::api::PlaybackInfo;
use crate::error::ResolveError;
use crate::media::{StreamInfo, StreamSource, StreamTrack};
use crate::negotiator::negotiate_audio;

use super::AssemblerContext;

/// Negotiate the audio tier, resolve its CDN URL and, unless
/// `skip_pssh`, fetch the DRM system header from the seek table.
pub(super) async fn audio_stream_info(
    ctx: &AssemblerContext,
    playback_info: &PlaybackInfo,
    skip_pssh: bool,
) -> Result<StreamInfo, ResolveError> {
    let media_id = playback_info.media_id();
    let granted = negotiate_audio(
        &playback_info.manifest,
        ctx.options.audio_quality,
        ctx.api.has_premium(),
        media_id,
    )?;

    let stream_urls = ctx.api.get_audio_stream_urls(&granted.file_id).await?;
    let stream_url = stream_urls
        .cdnurl
        .first()
        .cloned()
        .ok_or_else(|| ResolveError::MediaUnstreamable {
            media_id: media_id.to_string(),
        })?;
    debug!(quality = %granted.quality, url = %stream_url, "negotiated audio stream");

    let pssh = if skip_pssh {
        None
    } else {
        Some(ctx.api.get_seek_table(&granted.file_id).await?.pssh)
    };

    let container = if granted.quality.is_mp4() { "mp4" } else { "ogg" };
    Ok(StreamInfo::audio_only(StreamTrack {
        source: StreamSource::Single(stream_url),
        pssh,
        container: container.to_string(),
    }))
}
