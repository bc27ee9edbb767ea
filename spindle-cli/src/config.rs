use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Optional TOML config file. Every field can also be set on the
/// command line; flags win over the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bearer_token: Option<String>,
    pub client_token: Option<String>,
    pub premium: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub audio_quality: Option<String>,
    pub video_format: Option<String>,
    pub resolution: Option<u32>,
    pub cover_size: Option<String>,
    pub download_backend: Option<String>,
    pub audio_remux_mode: Option<String>,
    pub video_remux_mode: Option<String>,
    pub exclude_tags: Option<Vec<String>>,
    pub truncate: Option<usize>,
    pub wait_interval: Option<f64>,

    pub aria2c_path: Option<String>,
    pub curl_path: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub mp4box_path: Option<String>,
    pub mp4decrypt_path: Option<String>,
    pub packager_path: Option<String>,

    /// Path template overrides; CLI flags do not cover these.
    pub album_folder_template: Option<String>,
    pub compilation_folder_template: Option<String>,
    pub podcast_folder_template: Option<String>,
    pub no_album_folder_template: Option<String>,
    pub single_disc_file_template: Option<String>,
    pub multi_disc_file_template: Option<String>,
    pub podcast_file_template: Option<String>,
    pub no_album_file_template: Option<String>,
    pub playlist_file_template: Option<String>,
    pub date_tag_template: Option<String>,
}

impl AppConfig {
    /// Default location: `<config dir>/spindle/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("spindle").join("config.toml"))
    }

    /// Load the file at `path` (or the default location). A missing
    /// file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match AppConfig::default_path() {
                Some(path) => path,
                None => return Ok(AppConfig::default()),
            },
        };

        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
