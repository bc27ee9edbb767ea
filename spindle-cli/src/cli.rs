use std::path::PathBuf;

use clap::Parser;
use spindle_interface::api::ArtistCollection;
use spindle_interface::negotiator::{AudioQuality, VideoFormat};
use spindle_interface::media::CoverSize;
use spindle_interface::url::MediaUrlKind;
use spindle_stager::{AudioRemuxMode, DownloadBackend, VideoRemuxMode};

/// Download songs, podcasts and videos from streaming-service URLs.
#[derive(Debug, Parser)]
#[command(name = "spindle", version, about)]
pub struct Args {
    /// URLs to download (tracks, albums, playlists, shows, episodes,
    /// artists).
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Treat the URL arguments as text files with one URL per line.
    #[arg(long)]
    pub read_urls_as_txt: bool,

    /// Config file location (defaults to the platform config dir).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// API bearer token for the session.
    #[arg(long, env = "SPINDLE_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Optional client token header value.
    #[arg(long, env = "SPINDLE_CLIENT_TOKEN", hide_env_values = true)]
    pub client_token: Option<String>,

    /// The session carries premium entitlement.
    #[arg(long)]
    pub premium: bool,

    /// Skip license acquisition; licensed content is skipped per item.
    #[arg(long)]
    pub no_drm: bool,

    /// Root folder for finished files.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Folder for per-item scratch directories.
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Audio quality tier (vorbis-high, vorbis-medium, vorbis-low,
    /// aac-high, aac-medium).
    #[arg(long)]
    pub audio_quality: Option<AudioQuality>,

    /// Video container preference (mp4, webm, ask).
    #[arg(long)]
    pub video_format: Option<VideoFormat>,

    /// Video resolution ceiling in pixels of height.
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Cover image size (small, medium, large, extra-large).
    #[arg(long)]
    pub cover_size: Option<CoverSize>,

    /// Whole-file download backend (native, aria2c, curl).
    #[arg(long)]
    pub download_backend: Option<DownloadBackend>,

    /// MP4 audio decrypt/remux mode (ffmpeg, mp4box, mp4decrypt).
    #[arg(long)]
    pub audio_remux_mode: Option<AudioRemuxMode>,

    /// Video merge mode (ffmpeg, mp4box).
    #[arg(long)]
    pub video_remux_mode: Option<VideoRemuxMode>,

    /// Tag fields to drop; "cover" and "all" are pseudo-fields.
    #[arg(long, value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Maximum path segment length in characters (minimum 4).
    #[arg(long)]
    pub truncate: Option<usize>,

    /// Replace existing files and sidecars.
    #[arg(long)]
    pub overwrite: bool,

    /// Write the cover image next to each finished file.
    #[arg(long)]
    pub save_cover: bool,

    /// Maintain `.m3u8` files for playlist downloads.
    #[arg(long)]
    pub save_playlist: bool,

    /// Only write synced lyrics files, skip the media itself.
    #[arg(long)]
    pub synced_lyrics_only: bool,

    /// Never write `.lrc` files.
    #[arg(long)]
    pub no_synced_lyrics_file: bool,

    /// Skip sidecar files and the final move; leave staged output in
    /// the scratch directory.
    #[arg(long)]
    pub skip_processing: bool,

    /// Leave per-item scratch directories behind.
    #[arg(long)]
    pub skip_cleanup: bool,

    /// URL kinds to refuse (e.g. "artist,playlist").
    #[arg(long, value_delimiter = ',', value_parser = parse_media_kind)]
    pub disallow: Vec<MediaUrlKind>,

    /// Discography sub-collection artist URLs expand into (albums,
    /// singles, compilations).
    #[arg(long, value_parser = parse_artist_collection)]
    pub artist_collection: Option<ArtistCollection>,

    /// Seconds to wait between items.
    #[arg(long)]
    pub wait_interval: Option<f64>,

    /// Override tool locations.
    #[arg(long)]
    pub aria2c_path: Option<String>,
    #[arg(long)]
    pub curl_path: Option<String>,
    #[arg(long)]
    pub ffmpeg_path: Option<String>,
    #[arg(long)]
    pub mp4box_path: Option<String>,
    #[arg(long)]
    pub mp4decrypt_path: Option<String>,
    #[arg(long)]
    pub packager_path: Option<String>,

    /// Debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_media_kind(s: &str) -> Result<MediaUrlKind, String> {
    match s {
        "track" => Ok(MediaUrlKind::Track),
        "episode" => Ok(MediaUrlKind::Episode),
        "album" => Ok(MediaUrlKind::Album),
        "show" => Ok(MediaUrlKind::Show),
        "playlist" => Ok(MediaUrlKind::Playlist),
        "artist" => Ok(MediaUrlKind::Artist),
        other => Err(format!("unknown media type: {other}")),
    }
}

fn parse_artist_collection(s: &str) -> Result<ArtistCollection, String> {
    match s {
        "albums" => Ok(ArtistCollection::Albums),
        "singles" => Ok(ArtistCollection::Singles),
        "compilations" => Ok(ArtistCollection::Compilations),
        other => Err(format!("unknown artist collection: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_typical_invocation() {
        let args = Args::parse_from([
            "spindle",
            "--audio-quality",
            "aac-high",
            "--disallow",
            "artist,playlist",
            "--save-playlist",
            "https://open.spotify.com/track/0000000000000000000001",
        ]);
        assert_eq!(args.audio_quality, Some(AudioQuality::AacHigh));
        assert_eq!(
            args.disallow,
            vec![MediaUrlKind::Artist, MediaUrlKind::Playlist]
        );
        assert!(args.save_playlist);
        assert_eq!(args.urls.len(), 1);
    }
}
