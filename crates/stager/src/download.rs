//! Stream download backends.
//!
//! Whole-file sources can go through the built-in HTTP client or be
//! handed to `aria2c`/`curl`; segmented sources are always fetched by
//! the built-in client with bounded concurrency and assembled in
//! order.

use std::path::Path;

use futures::StreamExt;
use spindle_interface::media::StreamSource;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::StageError;
use crate::tools::{Tool, Tools};

/// Concurrent fragment fetches in flight per segmented source.
const SEGMENT_CONCURRENCY: usize = 4;

/// How whole-file sources are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadBackend {
    #[default]
    Native,
    Aria2c,
    Curl,
}

impl DownloadBackend {
    /// The external tool this backend depends on, if any.
    pub fn required_tool(&self) -> Option<Tool> {
        match self {
            DownloadBackend::Native => None,
            DownloadBackend::Aria2c => Some(Tool::Aria2c),
            DownloadBackend::Curl => Some(Tool::Curl),
        }
    }
}

impl std::str::FromStr for DownloadBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(DownloadBackend::Native),
            "aria2c" => Ok(DownloadBackend::Aria2c),
            "curl" => Ok(DownloadBackend::Curl),
            other => Err(format!("unknown download backend: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    backend: DownloadBackend,
}

impl Downloader {
    pub fn new(client: reqwest::Client, backend: DownloadBackend) -> Downloader {
        Downloader { client, backend }
    }

    pub fn backend(&self) -> DownloadBackend {
        self.backend
    }

    /// Fetch `source` into `dest`, creating parent directories.
    pub async fn fetch(
        &self,
        tools: &Tools,
        source: &StreamSource,
        dest: &Path,
    ) -> Result<(), StageError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match source {
            StreamSource::Single(url) => match self.backend {
                DownloadBackend::Native => self.fetch_single(url, dest).await,
                DownloadBackend::Aria2c => self.fetch_with_aria2c(tools, url, dest).await,
                DownloadBackend::Curl => self.fetch_with_curl(tools, url, dest).await,
            },
            StreamSource::Segments(urls) => self.fetch_segments(urls, dest).await,
        }
    }

    async fn fetch_single(&self, url: &str, dest: &Path) -> Result<(), StageError> {
        tracing::debug!(url, dest = %dest.display(), "downloading stream");
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = File::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Ordered assembly: fragments are fetched a few at a time but
    /// always appended in sequence.
    async fn fetch_segments(&self, urls: &[String], dest: &Path) -> Result<(), StageError> {
        tracing::debug!(
            segments = urls.len(),
            dest = %dest.display(),
            "downloading segmented stream"
        );

        let mut file = File::create(dest).await?;
        let mut fragments = futures::stream::iter(urls.iter().map(|url| {
            let client = self.client.clone();
            let url = url.clone();
            async move {
                client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await
            }
        }))
        .buffered(SEGMENT_CONCURRENCY);

        while let Some(fragment) = fragments.next().await {
            file.write_all(&fragment?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn fetch_with_aria2c(
        &self,
        tools: &Tools,
        url: &str,
        dest: &Path,
    ) -> Result<(), StageError> {
        let dir = dest
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_string_lossy()
            .into_owned();
        let name = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        tools
            .run(
                Tool::Aria2c,
                [
                    "--no-conf",
                    "--download-result=hide",
                    "--console-log-level=error",
                    "--summary-interval=0",
                    "--file-allocation=none",
                    url,
                    "--dir",
                    dir.as_str(),
                    "--out",
                    name.as_str(),
                ],
            )
            .await
    }

    async fn fetch_with_curl(
        &self,
        tools: &Tools,
        url: &str,
        dest: &Path,
    ) -> Result<(), StageError> {
        let dest = dest.to_string_lossy().into_owned();
        tools
            .run(Tool::Curl, ["-sSL", "-o", dest.as_str(), url])
            .await
    }
}
