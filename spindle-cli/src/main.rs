mod cli;
mod config;

use std::process;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use futures::{StreamExt, pin_mut};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use spindle_interface::api::{ApiConfig, HttpSpotifyApi, SpotifyApi};
use spindle_interface::assembler::{AssemblerContext, AssemblerOptions};
use spindle_interface::{CollectionCache, ResolveError, Resolver, ResolverConfig};
use spindle_stager::{PathConfig, Stager, StagerOptions, ToolConfig};

use crate::cli::Args;
use crate::config::AppConfig;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(0) => {}
        Ok(_) => process::exit(1),
        Err(err) => {
            eprintln!("{} {err:#}", "Error:".red().bold());
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<u64> {
    let config = AppConfig::load(args.config.as_deref())?;

    let bearer_token = args
        .bearer_token
        .clone()
        .or_else(|| config.bearer_token.clone())
        .context(
            "a bearer token is required (--bearer-token, SPINDLE_BEARER_TOKEN or the config file)",
        )?;

    let client = reqwest::Client::new();
    let api = HttpSpotifyApi::new(
        client.clone(),
        ApiConfig {
            bearer_token,
            client_token: args.client_token.clone().or_else(|| config.client_token.clone()),
            premium: args.premium || config.premium.unwrap_or(false),
        },
    )?;
    let api: Arc<dyn SpotifyApi> = Arc::new(api);

    // No CDM implementation ships with the CLI; license-gated streams
    // are skipped per item either way.
    if !args.no_drm {
        warn!("no CDM is configured; licensed items will be skipped");
    }

    let options = AssemblerOptions {
        audio_quality: pick(args.audio_quality, config.audio_quality.as_deref(), "audio_quality")?,
        video_format: pick(args.video_format, config.video_format.as_deref(), "video_format")?,
        resolution: args.resolution.or(config.resolution).unwrap_or(1080),
        cover_size: pick(args.cover_size, config.cover_size.as_deref(), "cover_size")?,
        ..AssemblerOptions::default()
    };
    let resolver = Resolver::new(
        AssemblerContext {
            api,
            cache: CollectionCache::default(),
            broker: None,
            options,
        },
        ResolverConfig {
            disallowed_media_types: args.disallow.clone(),
            artist_collection: args.artist_collection.unwrap_or_default(),
        },
    );

    let stager = Stager::new(
        client,
        StagerOptions {
            paths: path_config(&args, &config),
            tool_config: tool_config(&args, &config),
            download_backend: pick(
                args.download_backend,
                config.download_backend.as_deref(),
                "download_backend",
            )?,
            audio_remux_mode: pick(
                args.audio_remux_mode,
                config.audio_remux_mode.as_deref(),
                "audio_remux_mode",
            )?,
            video_remux_mode: pick(
                args.video_remux_mode,
                config.video_remux_mode.as_deref(),
                "video_remux_mode",
            )?,
            exclude_tags: if args.exclude_tags.is_empty() {
                config.exclude_tags.clone().unwrap_or_default()
            } else {
                args.exclude_tags.clone()
            },
            overwrite: args.overwrite,
            save_cover: args.save_cover,
            save_playlist: args.save_playlist,
            synced_lyrics_only: args.synced_lyrics_only,
            no_synced_lyrics_file: args.no_synced_lyrics_file,
            skip_processing: args.skip_processing,
            skip_cleanup: args.skip_cleanup,
            quiet_tools: args.quiet,
        },
    );

    let urls = gather_urls(&args)?;
    let wait_interval = args.wait_interval.or(config.wait_interval).unwrap_or(10.0);

    let mut error_count: u64 = 0;
    for (url_index, url) in urls.iter().enumerate() {
        let url_progress = format!("[URL {}/{}]", url_index + 1, urls.len()).dimmed();
        info!("{url_progress} Processing \"{url}\"");

        let items = resolver.resolve(url);
        pin_mut!(items);

        let mut item_index: u32 = 1;
        while let Some(result) = items.next().await {
            let item_progress = format!("[Item {item_index}]").dimmed();
            match result {
                Err(err) if err.is_sequence_level() => {
                    error_count += 1;
                    error!("{url_progress} {err}");
                    break;
                }
                Err(err) => {
                    if is_media_skip(&err) {
                        let title = err.media_title().unwrap_or("Unknown Title");
                        warn!("{item_progress} Skipping \"{title}\": {err}");
                    } else {
                        error_count += 1;
                        error!("{item_progress} Error resolving item: {err}");
                    }
                }
                Ok(descriptor) => {
                    info!("{item_progress} Downloading \"{}\"", descriptor.title());
                    match stager.run(&descriptor).await {
                        Ok(final_path) => {
                            debug!("{item_progress} Placed at {}", final_path.display());
                        }
                        Err(err) if err.is_skip() => {
                            warn!(
                                "{item_progress} Skipping \"{}\": {err}",
                                descriptor.title()
                            );
                        }
                        Err(err) => {
                            error_count += 1;
                            error!(
                                "{item_progress} Error downloading \"{}\": {err}",
                                descriptor.title()
                            );
                        }
                    }
                    tokio::time::sleep(Duration::from_secs_f64(wait_interval)).await;
                }
            }
            item_index += 1;
        }
    }

    info!("Finished with {error_count} error(s)");
    Ok(error_count)
}

/// Per-item conditions that are skips, not run errors.
fn is_media_skip(err: &ResolveError) -> bool {
    matches!(
        err,
        ResolveError::MediaNotFound { .. }
            | ResolveError::MediaUnstreamable { .. }
            | ResolveError::DrmDisabled { .. }
            | ResolveError::AudioQualityUnavailable { .. }
    )
}

/// CLI flag wins, then the config file, then the type's default.
fn pick<T>(flag: Option<T>, file: Option<&str>, what: &str) -> anyhow::Result<T>
where
    T: FromStr<Err = String> + Default,
{
    if let Some(value) = flag {
        return Ok(value);
    }
    match file {
        Some(raw) => raw
            .parse()
            .map_err(|err: String| anyhow::anyhow!("config field {what}: {err}")),
        None => Ok(T::default()),
    }
}

fn path_config(args: &Args, config: &AppConfig) -> PathConfig {
    let mut paths = PathConfig::default();
    if let Some(dir) = args.output_dir.clone().or_else(|| config.output_dir.clone()) {
        paths.output_dir = dir;
    }
    if let Some(dir) = args.temp_dir.clone().or_else(|| config.temp_dir.clone()) {
        paths.temp_dir = dir;
    }
    paths.truncate = args.truncate.or(config.truncate);

    macro_rules! template {
        ($field:ident) => {
            if let Some(value) = config.$field.clone() {
                paths.$field = value;
            }
        };
    }
    template!(album_folder_template);
    template!(compilation_folder_template);
    template!(podcast_folder_template);
    template!(no_album_folder_template);
    template!(single_disc_file_template);
    template!(multi_disc_file_template);
    template!(podcast_file_template);
    template!(no_album_file_template);
    template!(playlist_file_template);
    template!(date_tag_template);

    paths
}

fn tool_config(args: &Args, config: &AppConfig) -> ToolConfig {
    let mut tools = ToolConfig::default();
    macro_rules! tool {
        ($arg:ident, $field:ident) => {
            if let Some(value) = args.$arg.clone().or_else(|| config.$arg.clone()) {
                tools.$field = value;
            }
        };
    }
    tool!(aria2c_path, aria2c);
    tool!(curl_path, curl);
    tool!(ffmpeg_path, ffmpeg);
    tool!(mp4box_path, mp4box);
    tool!(mp4decrypt_path, mp4decrypt);
    tool!(packager_path, packager);
    tools
}

/// The URL list, optionally read from text files (one URL per line,
/// blank lines ignored).
fn gather_urls(args: &Args) -> anyhow::Result<Vec<String>> {
    if !args.read_urls_as_txt {
        return Ok(args.urls.clone());
    }

    let mut urls = Vec::new();
    for path in &args.urls {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading URL list {path}"))?;
        urls.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    Ok(urls)
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
