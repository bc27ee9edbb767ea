//! The staging pipeline.
//!
//! One item at a time: pre-flight checks, sidecar files, download,
//! decrypt/remux, tag, move into place, and a scratch-directory
//! cleanup that runs whether or not the item succeeded.

use std::path::PathBuf;

use rand::Rng;
use spindle_interface::media::{DecryptionKey, MediaDescriptor, StreamTrack};

use crate::download::{DownloadBackend, Downloader};
use crate::error::StageError;
use crate::paths::{self, PathConfig};
use crate::playlist;
use crate::remux::{self, AudioRemuxMode, VideoRemuxMode};
use crate::tagging::Tagger;
use crate::decrypt;
use crate::tools::{Tool, ToolConfig, Tools};

/// Everything the pipeline can be configured with.
#[derive(Debug, Clone, Default)]
pub struct StagerOptions {
    pub paths: PathConfig,
    pub tool_config: ToolConfig,
    pub download_backend: DownloadBackend,
    pub audio_remux_mode: AudioRemuxMode,
    pub video_remux_mode: VideoRemuxMode,
    /// Tag field names to drop; "cover" and "all" are pseudo-fields.
    pub exclude_tags: Vec<String>,
    pub overwrite: bool,
    pub save_cover: bool,
    pub save_playlist: bool,
    pub synced_lyrics_only: bool,
    pub no_synced_lyrics_file: bool,
    pub skip_processing: bool,
    pub skip_cleanup: bool,
    pub quiet_tools: bool,
}

/// Paths one item will use, fixed up-front so every stage and the
/// cleanup agree on them.
#[derive(Debug, Clone)]
pub struct StagingPlan {
    scratch_id: String,
    pub final_path: PathBuf,
    staged_path: PathBuf,
    playlist_file_path: Option<PathBuf>,
    lyrics_path: PathBuf,
    cover_path: PathBuf,
}

pub struct Stager {
    options: StagerOptions,
    tools: Tools,
    downloader: Downloader,
    tagger: Tagger,
}

impl Stager {
    pub fn new(client: reqwest::Client, options: StagerOptions) -> Stager {
        let mut tools = Tools::discover(&options.tool_config);
        tools.quiet = options.quiet_tools;
        let downloader = Downloader::new(client.clone(), options.download_backend);
        let tagger = Tagger::new(
            client,
            options.exclude_tags.clone(),
            options.paths.date_tag_template.clone(),
        );
        Stager {
            options,
            tools,
            downloader,
            tagger,
        }
    }

    /// Fix the item's paths. The staged extension follows the output
    /// container: `.mp4` for video, `.m4a` or `.ogg` for audio.
    pub fn plan(&self, descriptor: &MediaDescriptor) -> StagingPlan {
        let video = descriptor.kind.is_video();
        let extension = if video {
            ".mp4"
        } else if descriptor.stream_info.audio.container == "mp4" {
            ".m4a"
        } else {
            ".ogg"
        };

        let scratch_id = format!("{:08x}", rand::rng().random::<u32>());
        let paths = &self.options.paths;
        let final_path =
            paths.final_path(&descriptor.tags, extension, descriptor.playlist_tags.as_ref());
        let staged_path = paths.temp_path(&scratch_id, &descriptor.media_id, "staged", extension);
        let playlist_file_path = descriptor
            .playlist_tags
            .as_ref()
            .map(|tags| paths.playlist_file_path(tags));
        let lyrics_path = paths::lyrics_path(&final_path);
        let cover_path = paths::cover_path(&final_path, video);

        StagingPlan {
            scratch_id,
            final_path,
            staged_path,
            playlist_file_path,
            lyrics_path,
            cover_path,
        }
    }

    /// Process one item end to end, returning its final path.
    pub async fn run(&self, descriptor: &MediaDescriptor) -> Result<PathBuf, StageError> {
        let plan = self.plan(descriptor);
        let result = self.process(descriptor, &plan).await;

        if !self.options.skip_cleanup {
            let scratch = self.options.paths.scratch_dir(&plan.scratch_id);
            // Best effort; a failed item may not have created it.
            let _ = tokio::fs::remove_dir_all(&scratch).await;
        }

        result.map(|_| plan.final_path)
    }

    async fn process(
        &self,
        descriptor: &MediaDescriptor,
        plan: &StagingPlan,
    ) -> Result<(), StageError> {
        if !self.options.skip_processing {
            self.initial_processing(descriptor, plan).await?;
        }

        self.preflight(descriptor, plan)?;

        if descriptor.kind.is_video() {
            self.stage_video(descriptor, plan).await?;
        } else {
            self.stage_audio(descriptor, plan).await?;
        }
        self.tagger
            .apply(&plan.staged_path, &descriptor.tags, &descriptor.cover_url)
            .await?;

        if !self.options.skip_processing {
            self.final_processing(descriptor, plan).await?;
        }
        Ok(())
    }

    /// Sidecar files that make sense even when the media download is
    /// later skipped: the cover image and the synced lyrics.
    async fn initial_processing(
        &self,
        descriptor: &MediaDescriptor,
        plan: &StagingPlan,
    ) -> Result<(), StageError> {
        if self.options.save_cover
            && !descriptor.cover_url.is_empty()
            && (self.options.overwrite || !plan.cover_path.exists())
        {
            if let Some(bytes) = self.tagger.cover_bytes(&descriptor.cover_url).await? {
                if let Some(parent) = plan.cover_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tracing::debug!(path = %plan.cover_path.display(), "writing cover");
                tokio::fs::write(&plan.cover_path, &bytes).await?;
            }
        }

        let synced = descriptor
            .lyrics
            .as_ref()
            .and_then(|lyrics| lyrics.synced.as_deref());
        if let Some(synced) = synced {
            if !self.options.no_synced_lyrics_file
                && (self.options.overwrite || !plan.lyrics_path.exists())
            {
                if let Some(parent) = plan.lyrics_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tracing::debug!(path = %plan.lyrics_path.display(), "writing synced lyrics");
                tokio::fs::write(&plan.lyrics_path, synced).await?;
            }
        }
        Ok(())
    }

    /// Everything that should stop the item before a byte is
    /// downloaded.
    fn preflight(
        &self,
        descriptor: &MediaDescriptor,
        plan: &StagingPlan,
    ) -> Result<(), StageError> {
        if self.options.synced_lyrics_only {
            return Err(StageError::SyncedLyricsOnly);
        }
        if plan.final_path.exists() && !self.options.overwrite {
            return Err(StageError::MediaFileExists(plan.final_path.clone()));
        }

        let stream = &descriptor.stream_info;
        if descriptor.kind.is_video() {
            self.require(self.options.video_remux_mode.required_tool())?;

            if descriptor.decryption_key.is_some() {
                let containers = [
                    stream.audio.container.as_str(),
                    stream
                        .video
                        .as_ref()
                        .map(|track| track.container.as_str())
                        .unwrap_or_default(),
                ];
                if containers.contains(&"mp4") {
                    self.require(Tool::Mp4Decrypt)?;
                }
                if containers.contains(&"webm") {
                    self.require(Tool::Packager)?;
                }
            }
        } else {
            if let Some(tool) = self.options.download_backend.required_tool() {
                self.require(tool)?;
            }
            if stream.audio.container == "mp4" {
                for tool in self.options.audio_remux_mode.required_tools() {
                    self.require(*tool)?;
                }
            }
        }
        Ok(())
    }

    fn require(&self, tool: Tool) -> Result<(), StageError> {
        self.tools.require(tool).map(|_| ())
    }

    async fn stage_audio(
        &self,
        descriptor: &MediaDescriptor,
        plan: &StagingPlan,
    ) -> Result<(), StageError> {
        let paths = &self.options.paths;
        let audio = &descriptor.stream_info.audio;
        let container_ext = format!(".{}", audio.container);
        let encrypted = paths.temp_path(
            &plan.scratch_id,
            &descriptor.media_id,
            "encrypted",
            &container_ext,
        );

        self.downloader
            .fetch(&self.tools, &audio.source, &encrypted)
            .await?;

        let key = descriptor
            .decryption_key
            .as_ref()
            .ok_or(StageError::MissingKey)?;

        if audio.container == "mp4" {
            match self.options.audio_remux_mode {
                AudioRemuxMode::Ffmpeg => {
                    remux::ffmpeg_decrypt_remux(
                        &self.tools,
                        &encrypted,
                        &plan.staged_path,
                        &key.audio.key,
                    )
                    .await?;
                }
                AudioRemuxMode::Mp4Decrypt => {
                    remux::mp4decrypt(&self.tools, &encrypted, &plan.staged_path, &key.audio.key)
                        .await?;
                }
                AudioRemuxMode::Mp4Box => {
                    let decrypted = paths.temp_path(
                        &plan.scratch_id,
                        &descriptor.media_id,
                        "decrypted",
                        &container_ext,
                    );
                    remux::mp4decrypt(&self.tools, &encrypted, &decrypted, &key.audio.key).await?;
                    remux::mp4box_remux(&self.tools, &decrypted, &plan.staged_path).await?;
                }
            }
        } else {
            let key_bytes = key
                .audio
                .key_bytes()
                .map_err(|err| StageError::MalformedKey(err.to_string()))?;
            decrypt::decrypt_ogg_stream(&key_bytes, &encrypted, &plan.staged_path).await?;
        }
        Ok(())
    }

    async fn stage_video(
        &self,
        descriptor: &MediaDescriptor,
        plan: &StagingPlan,
    ) -> Result<(), StageError> {
        let paths = &self.options.paths;
        let stream = &descriptor.stream_info;
        let video = stream.video.as_ref().ok_or(StageError::MissingVideoTrack)?;
        let audio = &stream.audio;

        let temp = |role: &str, track: &StreamTrack| {
            paths.temp_path(
                &plan.scratch_id,
                &descriptor.media_id,
                role,
                &format!(".{}", track.container),
            )
        };
        let decrypted_video = temp("video_decrypted", video);
        let decrypted_audio = temp("audio_decrypted", audio);

        match &descriptor.decryption_key {
            Some(keys) => {
                let encrypted_video = temp("video_encrypted", video);
                let encrypted_audio = temp("audio_encrypted", audio);
                self.downloader
                    .fetch(&self.tools, &video.source, &encrypted_video)
                    .await?;
                self.downloader
                    .fetch(&self.tools, &audio.source, &encrypted_audio)
                    .await?;

                let video_key = keys.video.as_ref().unwrap_or(&keys.audio);
                self.decrypt_track(video, &encrypted_video, &decrypted_video, video_key)
                    .await?;
                self.decrypt_track(audio, &encrypted_audio, &decrypted_audio, &keys.audio)
                    .await?;
            }
            // Unlicensed video streams in the clear.
            None => {
                self.downloader
                    .fetch(&self.tools, &video.source, &decrypted_video)
                    .await?;
                self.downloader
                    .fetch(&self.tools, &audio.source, &decrypted_audio)
                    .await?;
            }
        }

        match self.options.video_remux_mode {
            VideoRemuxMode::Ffmpeg => {
                remux::ffmpeg_merge(
                    &self.tools,
                    &decrypted_video,
                    &decrypted_audio,
                    &plan.staged_path,
                )
                .await
            }
            VideoRemuxMode::Mp4Box => {
                remux::mp4box_merge(
                    &self.tools,
                    &decrypted_video,
                    &decrypted_audio,
                    &plan.staged_path,
                )
                .await
            }
        }
    }

    async fn decrypt_track(
        &self,
        track: &StreamTrack,
        encrypted: &std::path::Path,
        decrypted: &std::path::Path,
        key: &DecryptionKey,
    ) -> Result<(), StageError> {
        if track.container == "webm" {
            remux::packager_decrypt(&self.tools, encrypted, decrypted, &key.key, &key.key_id).await
        } else {
            remux::mp4decrypt(&self.tools, encrypted, decrypted, &key.key).await
        }
    }

    async fn final_processing(
        &self,
        descriptor: &MediaDescriptor,
        plan: &StagingPlan,
    ) -> Result<(), StageError> {
        if !plan.staged_path.exists() {
            return Ok(());
        }

        if let Some(parent) = plan.final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tracing::debug!(
            from = %plan.staged_path.display(),
            to = %plan.final_path.display(),
            "moving into place"
        );
        move_file(&plan.staged_path, &plan.final_path).await?;

        if self.options.save_playlist {
            if let (Some(playlist_file), Some(playlist_tags)) =
                (&plan.playlist_file_path, &descriptor.playlist_tags)
            {
                playlist::update_playlist_file(
                    playlist_file,
                    &plan.final_path,
                    &self.options.paths.output_dir,
                    playlist_tags.track,
                )?;
            }
        }
        Ok(())
    }
}

/// Rename, falling back to copy-and-delete when the temp and output
/// roots are on different filesystems.
async fn move_file(from: &std::path::Path, to: &std::path::Path) -> Result<(), StageError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_interface::media::{
        KeyPair, Lyrics, MediaKind, StreamInfo, StreamSource, Tags,
    };

    fn descriptor(container: &str) -> MediaDescriptor {
        MediaDescriptor {
            media_id: "m1".to_string(),
            kind: MediaKind::Song,
            metadata: serde_json::Value::Null,
            tags: Tags {
                album: Some("Album".to_string()),
                album_artist: Some("Artist".to_string()),
                title: Some("Title".to_string()),
                track: Some(1),
                media_kind: Some(MediaKind::Song),
                ..Tags::default()
            },
            playlist_tags: None,
            cover_url: String::new(),
            lyrics: Some(Lyrics {
                synced: Some("[00:01.00]line\n".to_string()),
                unsynced: None,
            }),
            stream_info: StreamInfo::audio_only(StreamTrack {
                source: StreamSource::Single("http://cdn.invalid/file".to_string()),
                pssh: None,
                container: container.to_string(),
            }),
            decryption_key: Some(KeyPair::audio_only(DecryptionKey::new(
                "00".repeat(16),
                "11".repeat(16),
            ))),
        }
    }

    fn stager(options: StagerOptions) -> Stager {
        let mut stager = Stager::new(reqwest::Client::new(), options);
        // Tests must not depend on what happens to be installed.
        stager.tools = Tools::default();
        stager
    }

    #[test]
    fn staged_extension_follows_container() {
        let stager = stager(StagerOptions::default());
        assert!(stager
            .plan(&descriptor("mp4"))
            .final_path
            .to_string_lossy()
            .ends_with("01 Title.m4a"));
        assert!(stager
            .plan(&descriptor("ogg"))
            .final_path
            .to_string_lossy()
            .ends_with("01 Title.ogg"));
    }

    #[test]
    fn synced_lyrics_only_short_circuits_before_tool_checks() {
        let stager = stager(StagerOptions {
            synced_lyrics_only: true,
            download_backend: DownloadBackend::Aria2c,
            ..StagerOptions::default()
        });
        let item = descriptor("mp4");
        let plan = stager.plan(&item);
        let err = stager.preflight(&item, &plan).unwrap_err();
        assert!(matches!(err, StageError::SyncedLyricsOnly));
    }

    #[test]
    fn missing_backend_tool_is_reported_by_name() {
        let stager = stager(StagerOptions {
            download_backend: DownloadBackend::Aria2c,
            ..StagerOptions::default()
        });
        let item = descriptor("ogg");
        let plan = stager.plan(&item);
        let err = stager.preflight(&item, &plan).unwrap_err();
        assert!(matches!(err, StageError::DependencyNotFound(name) if name == "aria2c"));
    }

    #[test]
    fn mp4_audio_needs_remux_tools() {
        let stager = stager(StagerOptions::default());
        let item = descriptor("mp4");
        let plan = stager.plan(&item);
        let err = stager.preflight(&item, &plan).unwrap_err();
        assert!(matches!(err, StageError::DependencyNotFound(name) if name == "ffmpeg"));
    }

    #[tokio::test]
    async fn existing_final_file_is_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let stager = stager(StagerOptions {
            paths: PathConfig {
                output_dir: dir.path().to_path_buf(),
                ..PathConfig::default()
            },
            ..StagerOptions::default()
        });
        let item = descriptor("ogg");
        let plan = stager.plan(&item);

        tokio::fs::create_dir_all(plan.final_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&plan.final_path, b"already here")
            .await
            .unwrap();

        let err = stager.preflight(&item, &plan).unwrap_err();
        assert!(matches!(err, StageError::MediaFileExists(_)));
    }

    #[tokio::test]
    async fn lyrics_file_is_written_once_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let stager = stager(StagerOptions {
            paths: PathConfig {
                output_dir: dir.path().to_path_buf(),
                ..PathConfig::default()
            },
            ..StagerOptions::default()
        });
        let item = descriptor("ogg");
        let plan = stager.plan(&item);

        stager.initial_processing(&item, &plan).await.unwrap();
        let written = tokio::fs::read_to_string(&plan.lyrics_path).await.unwrap();
        assert_eq!(written, "[00:01.00]line\n");

        tokio::fs::write(&plan.lyrics_path, "user edit").await.unwrap();
        stager.initial_processing(&item, &plan).await.unwrap();
        let kept = tokio::fs::read_to_string(&plan.lyrics_path).await.unwrap();
        assert_eq!(kept, "user edit");
    }
}
