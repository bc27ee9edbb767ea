//! Decrypt and remux steps backed by external tools.
//!
//! Argument shapes are fixed; only the input/output paths and key
//! material vary per item.

use std::ffi::OsString;
use std::path::Path;

use crate::error::StageError;
use crate::tools::{Tool, Tools};

/// How encrypted MP4 audio is turned into a clean `.m4a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioRemuxMode {
    /// Single-pass `ffmpeg -decryption_key` copy remux.
    #[default]
    Ffmpeg,
    /// `mp4decrypt` followed by an `MP4Box` remux.
    Mp4Box,
    /// `mp4decrypt` only, container left as-is.
    Mp4Decrypt,
}

impl AudioRemuxMode {
    /// Tools this mode needs for MP4 audio. Ogg audio needs none.
    pub fn required_tools(&self) -> &'static [Tool] {
        match self {
            AudioRemuxMode::Ffmpeg => &[Tool::Ffmpeg],
            AudioRemuxMode::Mp4Box => &[Tool::Mp4Box, Tool::Mp4Decrypt],
            AudioRemuxMode::Mp4Decrypt => &[Tool::Mp4Decrypt],
        }
    }
}

impl std::str::FromStr for AudioRemuxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ffmpeg" => Ok(AudioRemuxMode::Ffmpeg),
            "mp4box" => Ok(AudioRemuxMode::Mp4Box),
            "mp4decrypt" => Ok(AudioRemuxMode::Mp4Decrypt),
            other => Err(format!("unknown audio remux mode: {other}")),
        }
    }
}

/// How decrypted video and audio elementary streams are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoRemuxMode {
    #[default]
    Ffmpeg,
    Mp4Box,
}

impl VideoRemuxMode {
    pub fn required_tool(&self) -> Tool {
        match self {
            VideoRemuxMode::Ffmpeg => Tool::Ffmpeg,
            VideoRemuxMode::Mp4Box => Tool::Mp4Box,
        }
    }
}

impl std::str::FromStr for VideoRemuxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ffmpeg" => Ok(VideoRemuxMode::Ffmpeg),
            "mp4box" => Ok(VideoRemuxMode::Mp4Box),
            other => Err(format!("unknown video remux mode: {other}")),
        }
    }
}

/// Decrypting copy-remux of MP4 audio in one ffmpeg pass.
pub async fn ffmpeg_decrypt_remux(
    tools: &Tools,
    input: &Path,
    output: &Path,
    key_hex: &str,
) -> Result<(), StageError> {
    let args: Vec<OsString> = vec![
        "-loglevel".into(),
        "error".into(),
        "-hide_banner".into(),
        "-y".into(),
        "-decryption_key".into(),
        key_hex.into(),
        "-i".into(),
        input.into(),
        "-c".into(),
        "copy".into(),
        output.into(),
    ];
    tools.run(Tool::Ffmpeg, args).await
}

/// CENC decrypt with `mp4decrypt`, container untouched.
pub async fn mp4decrypt(
    tools: &Tools,
    input: &Path,
    output: &Path,
    key_hex: &str,
) -> Result<(), StageError> {
    let args: Vec<OsString> = vec![
        "--key".into(),
        format!("1:{key_hex}").into(),
        input.into(),
        output.into(),
    ];
    tools.run(Tool::Mp4Decrypt, args).await
}

/// Rebuild the container with `MP4Box`. The placeholder artist tag
/// forces an `ilst` atom into existence for the tagging stage.
pub async fn mp4box_remux(tools: &Tools, input: &Path, output: &Path) -> Result<(), StageError> {
    let args: Vec<OsString> = vec![
        "-quiet".into(),
        "-itags".into(),
        "artist=placeholder".into(),
        "-keep-utc".into(),
        "-add".into(),
        input.into(),
        "-new".into(),
        output.into(),
    ];
    tools.run(Tool::Mp4Box, args).await
}

/// Raw-key decrypt of a WebM elementary stream with shaka packager.
pub async fn packager_decrypt(
    tools: &Tools,
    input: &Path,
    output: &Path,
    key_hex: &str,
    key_id_hex: &str,
) -> Result<(), StageError> {
    let args: Vec<OsString> = vec![
        "--quiet".into(),
        format!("stream=0,in={},output={}", input.display(), output.display()).into(),
        "-enable_raw_key_decryption".into(),
        "-keys".into(),
        format!("key_id={key_id_hex}:key={key_hex}").into(),
    ];
    tools.run(Tool::Packager, args).await
}

/// Merge decrypted video and audio into one file, copying streams.
pub async fn ffmpeg_merge(
    tools: &Tools,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> Result<(), StageError> {
    let args: Vec<OsString> = vec![
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-c".into(),
        "copy".into(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        output.into(),
    ];
    tools.run(Tool::Ffmpeg, args).await
}

/// `MP4Box` variant of the merge.
pub async fn mp4box_merge(
    tools: &Tools,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> Result<(), StageError> {
    let args: Vec<OsString> = vec![
        "-quiet".into(),
        "-itags".into(),
        "artist=placeholder".into(),
        "-keep-utc".into(),
        "-add".into(),
        video.into(),
        "-add".into(),
        audio.into(),
        "-new".into(),
        output.into(),
    ];
    tools.run(Tool::Mp4Box, args).await
}
