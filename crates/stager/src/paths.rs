//! Output and scratch path construction.
//!
//! Final paths are built from user-configurable folder and file
//! templates, one pair picked per item kind, with every rendered
//! segment sanitized for the filesystem. Scratch paths live under a
//! per-item directory in the temp root so cleanup is a single
//! recursive remove.

use std::path::{Path, PathBuf};

use spindle_interface::media::{MediaKind, PlaylistTags, Tags};

use crate::template::TemplateVars;

const REPLACEMENT: char = '_';

/// Path layout knobs: output and temp roots, the path templates and
/// the optional per-segment length limit.
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub album_folder_template: String,
    pub compilation_folder_template: String,
    pub podcast_folder_template: String,
    pub no_album_folder_template: String,
    pub single_disc_file_template: String,
    pub multi_disc_file_template: String,
    pub podcast_file_template: String,
    pub no_album_file_template: String,
    pub playlist_file_template: String,
    /// strftime template for the date tag value.
    pub date_tag_template: String,
    /// Maximum length of one path segment, in characters. Values
    /// below 4 disable truncation.
    pub truncate: Option<usize>,
}

impl Default for PathConfig {
    fn default() -> PathConfig {
        PathConfig {
            output_dir: PathBuf::from("./Spindle"),
            temp_dir: PathBuf::from("."),
            album_folder_template: "{album_artist}/{album}".to_string(),
            compilation_folder_template: "Compilations/{album}".to_string(),
            podcast_folder_template: "Podcasts/{album}".to_string(),
            no_album_folder_template: "{artist}/Unknown Album".to_string(),
            single_disc_file_template: "{track:02d} {title}".to_string(),
            multi_disc_file_template: "{disc}-{track:02d} {title}".to_string(),
            podcast_file_template: "{track:02d} {title}".to_string(),
            no_album_file_template: "{title}".to_string(),
            playlist_file_template: "Playlists/{playlist_artist}/{playlist_title}".to_string(),
            date_tag_template: "%Y-%m-%dT%H:%M:%SZ".to_string(),
            truncate: None,
        }
    }
}

impl PathConfig {
    fn effective_truncate(&self) -> Option<usize> {
        self.truncate.filter(|&limit| limit >= 4)
    }

    /// Make one path segment filesystem-safe.
    ///
    /// Illegal and control characters become `_`. Folder segments
    /// (`file_ext` is `None`) are truncated to the limit and may not
    /// end in a dot; file segments keep room for their extension.
    /// Truncation counts characters, not bytes.
    pub fn sanitize(&self, dirty: &str, file_ext: Option<&str>) -> String {
        let mut sanitized: String = dirty
            .chars()
            .map(|c| {
                if matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
                    || c.is_control()
                {
                    REPLACEMENT
                } else {
                    c
                }
            })
            .collect();

        let truncate = self.effective_truncate();
        match file_ext {
            None => {
                if let Some(limit) = truncate {
                    sanitized = sanitized.chars().take(limit).collect();
                }
                if sanitized.ends_with('.') {
                    sanitized.pop();
                    sanitized.push(REPLACEMENT);
                }
            }
            Some(ext) => {
                if let Some(limit) = truncate {
                    sanitized = sanitized
                        .chars()
                        .take(limit.saturating_sub(ext.chars().count()))
                        .collect();
                }
                sanitized.push_str(ext);
            }
        }

        sanitized.trim().to_string()
    }

    /// Destination of the finished file under the output root.
    pub fn final_path(
        &self,
        tags: &Tags,
        file_extension: &str,
        playlist_tags: Option<&PlaylistTags>,
    ) -> PathBuf {
        let is_podcast = matches!(
            tags.media_kind,
            Some(MediaKind::Podcast | MediaKind::PodcastVideo)
        );

        let (folder_template, file_template) = if is_podcast {
            (&self.podcast_folder_template, &self.podcast_file_template)
        } else if tags.album.is_some() {
            let folder = if tags.compilation == Some(true) {
                &self.compilation_folder_template
            } else {
                &self.album_folder_template
            };
            let file = if tags.disc_total.is_some_and(|total| total > 1) {
                &self.multi_disc_file_template
            } else {
                &self.single_disc_file_template
            };
            (folder, file)
        } else {
            (&self.no_album_folder_template, &self.no_album_file_template)
        };

        let vars = TemplateVars::from_tags(tags, playlist_tags);
        self.render_parts(&vars, folder_template, file_template, file_extension)
    }

    /// Destination of the `.m3u8` for a playlist.
    pub fn playlist_file_path(&self, playlist_tags: &PlaylistTags) -> PathBuf {
        let vars = TemplateVars::from_tags(&Tags::default(), Some(playlist_tags));
        let (folder, file) = match self.playlist_file_template.rsplit_once('/') {
            Some((folder, file)) => (folder, file),
            None => ("", self.playlist_file_template.as_str()),
        };
        self.render_parts(&vars, folder, file, ".m3u8")
    }

    fn render_parts(
        &self,
        vars: &TemplateVars,
        folder_template: &str,
        file_template: &str,
        file_extension: &str,
    ) -> PathBuf {
        let mut path = self.output_dir.clone();
        for part in folder_template.split('/').filter(|part| !part.is_empty()) {
            path.push(self.sanitize(&vars.render(part), None));
        }

        let mut file_parts = file_template.split('/').peekable();
        while let Some(part) = file_parts.next() {
            let ext = if file_parts.peek().is_none() {
                Some(file_extension)
            } else {
                None
            };
            path.push(self.sanitize(&vars.render(part), ext));
        }
        path
    }

    /// Per-item scratch directory under the temp root.
    pub fn scratch_dir(&self, scratch_id: &str) -> PathBuf {
        self.temp_dir.join(format!("spindle_{scratch_id}"))
    }

    /// An intermediate file inside the scratch directory. `role`
    /// distinguishes the stages ("encrypted", "decrypted", ...).
    pub fn temp_path(
        &self,
        scratch_id: &str,
        media_id: &str,
        role: &str,
        file_extension: &str,
    ) -> PathBuf {
        self.scratch_dir(scratch_id)
            .join(format!("{media_id}_{role}{file_extension}"))
    }
}

/// Cover image destination: a shared `Cover.jpg` next to audio files,
/// a per-file `<name>.jpg` for video.
pub fn cover_path(final_path: &Path, video: bool) -> PathBuf {
    if video {
        final_path.with_extension("jpg")
    } else {
        final_path.with_file_name("Cover.jpg")
    }
}

/// Synced lyrics sidecar next to the final file.
pub fn lyrics_path(final_path: &Path) -> PathBuf {
    final_path.with_extension("lrc")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Tags {
        Tags {
            album: Some("Night Drive".to_string()),
            album_artist: Some("Violet Hour".to_string()),
            title: Some("Mile/Marker?".to_string()),
            track: Some(4),
            track_total: Some(10),
            disc: Some(1),
            disc_total: Some(1),
            media_kind: Some(MediaKind::Song),
            ..Tags::default()
        }
    }

    #[test]
    fn illegal_characters_become_underscores() {
        let config = PathConfig::default();
        assert_eq!(config.sanitize("a\\b/c:d*e?f\"g<h>i|j", None), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(config.sanitize("tab\there", None), "tab_here");
    }

    #[test]
    fn folder_truncation_replaces_trailing_dot() {
        let config = PathConfig {
            truncate: Some(8),
            ..PathConfig::default()
        };
        assert_eq!(config.sanitize("A Very Long Album Name", None), "A Very L");
        assert_eq!(config.sanitize("Vol. 2.", None), "Vol. 2_");
    }

    #[test]
    fn file_truncation_keeps_room_for_extension() {
        let config = PathConfig {
            truncate: Some(10),
            ..PathConfig::default()
        };
        let sanitized = config.sanitize("An Overlong Title", Some(".ogg"));
        assert_eq!(sanitized, "An Ove.ogg");
        assert_eq!(sanitized.chars().count(), 10);
    }

    #[test]
    fn truncate_below_four_is_disabled() {
        let config = PathConfig {
            truncate: Some(3),
            ..PathConfig::default()
        };
        assert_eq!(config.sanitize("Untouched Name", None), "Untouched Name");
    }

    #[test]
    fn album_track_uses_album_templates() {
        let config = PathConfig {
            output_dir: PathBuf::from("/music"),
            ..PathConfig::default()
        };
        let path = config.final_path(&tags(), ".ogg", None);
        assert_eq!(
            path,
            PathBuf::from("/music/Violet Hour/Night Drive/04 Mile_Marker_.ogg")
        );
    }

    #[test]
    fn multi_disc_prefixes_disc_number() {
        let config = PathConfig {
            output_dir: PathBuf::from("/music"),
            ..PathConfig::default()
        };
        let mut tags = tags();
        tags.disc = Some(2);
        tags.disc_total = Some(2);
        let path = config.final_path(&tags, ".m4a", None);
        assert_eq!(
            path,
            PathBuf::from("/music/Violet Hour/Night Drive/2-04 Mile_Marker_.m4a")
        );
    }

    #[test]
    fn podcast_and_no_album_fallbacks() {
        let config = PathConfig {
            output_dir: PathBuf::from("/music"),
            ..PathConfig::default()
        };

        let mut episode = tags();
        episode.media_kind = Some(MediaKind::Podcast);
        episode.album = Some("Daily Show".to_string());
        episode.title = Some("Episode One".to_string());
        assert_eq!(
            config.final_path(&episode, ".ogg", None),
            PathBuf::from("/music/Podcasts/Daily Show/04 Episode One.ogg")
        );

        let mut no_album = tags();
        no_album.album = None;
        no_album.artist = Some("Violet Hour".to_string());
        assert_eq!(
            config.final_path(&no_album, ".mp4", None),
            PathBuf::from("/music/Violet Hour/Unknown Album/Mile_Marker_.mp4")
        );
    }

    #[test]
    fn playlist_path_renders_under_output_root() {
        let config = PathConfig {
            output_dir: PathBuf::from("/music"),
            ..PathConfig::default()
        };
        let playlist = PlaylistTags {
            id: "p1".to_string(),
            title: "Late Nights".to_string(),
            artist: "curator".to_string(),
            track: 1,
            track_total: 9,
        };
        assert_eq!(
            config.playlist_file_path(&playlist),
            PathBuf::from("/music/Playlists/curator/Late Nights.m3u8")
        );
    }

    #[test]
    fn scratch_paths_group_by_item() {
        let config = PathConfig {
            temp_dir: PathBuf::from("/tmp"),
            ..PathConfig::default()
        };
        assert_eq!(
            config.temp_path("deadbeef", "abc123", "encrypted", ".m4a"),
            PathBuf::from("/tmp/spindle_deadbeef/abc123_encrypted.m4a")
        );
    }
}
