//! Version sources - where the version list, launcher text and archives
//! come from.
//!
//! Two implementations:
//! - `DirectorySource`: a local directory holding `versions.json`,
//!   `launcher.md` and one `<tag>.tar.gz` per version.
//! - `HttpSource`: the same three resources fetched over HTTP(S).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::AsyncReadExt;

use crate::api::types::{ApiError, VersionDescriptor, VersionList};
use crate::config::WorkerConfig;

pub const VERSIONS_FILE: &str = "versions.json";
pub const LAUNCHER_INFO_FILE: &str = "launcher.md";
const CHUNK_SIZE: usize = 64 * 1024;

/// A download in progress: expected total size and a stream of chunks.
pub struct ArchiveStream {
    pub total: u64,
    pub chunks: BoxStream<'static, Result<Vec<u8>, ApiError>>,
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Published version list, oldest first.
    async fn versions(&self) -> Result<VersionList, ApiError>;

    /// Launcher info as markdown.
    async fn launcher_info(&self) -> Result<String, ApiError>;

    /// Open the `.tar.gz` archive of `version`.
    async fn open_archive(&self, version: &VersionDescriptor) -> Result<ArchiveStream, ApiError>;
}

/// Pick the source described by the worker configuration.
pub fn from_config(config: &WorkerConfig) -> Result<Arc<dyn VersionSource>, ApiError> {
    if let Some(dir) = &config.source_dir {
        log::info!("Using directory version source: {}", dir.display());
        return Ok(Arc::new(DirectorySource::new(dir.clone())));
    }

    match (&config.versions_url, &config.archive_url_template) {
        (Some(versions_url), Some(archive_url_template)) => {
            log::info!("Using HTTP version source: {versions_url}");
            Ok(Arc::new(HttpSource::new(
                versions_url.clone(),
                config.launcher_info_url.clone(),
                archive_url_template.clone(),
            )?))
        }
        _ => Err(ApiError::InvalidInput {
            message: "Configure either worker.source_dir or worker.versions_url and worker.archive_url_template".to_string(),
        }),
    }
}

pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl VersionSource for DirectorySource {
    async fn versions(&self) -> Result<VersionList, ApiError> {
        let path = self.root.join(VERSIONS_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ApiError::IoError {
                message: format!("Failed to read {}: {e}", path.display()),
            })?;
        parse_version_list(&content)
    }

    async fn launcher_info(&self) -> Result<String, ApiError> {
        let path = self.root.join(LAUNCHER_INFO_FILE);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ApiError::IoError {
                message: format!("Failed to read {}: {e}", path.display()),
            })
    }

    async fn open_archive(&self, version: &VersionDescriptor) -> Result<ArchiveStream, ApiError> {
        let path = self.root.join(format!("{}.tar.gz", version.tag));
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApiError::VersionNotFound {
                    tag: version.tag.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let total = file.metadata().await?.len();

        let chunks = stream::unfold(Some(file), |state| async move {
            let Some(mut file) = state else {
                return None;
            };
            let mut buf = vec![0u8; CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some(file)))
                }
                Err(e) => Some((Err(ApiError::from(e)), None)),
            }
        })
        .boxed();

        Ok(ArchiveStream { total, chunks })
    }
}

pub struct HttpSource {
    client: reqwest::Client,
    versions_url: String,
    launcher_info_url: Option<String>,
    archive_url_template: String,
}

impl HttpSource {
    pub fn new(
        versions_url: String,
        launcher_info_url: Option<String>,
        archive_url_template: String,
    ) -> Result<Self, ApiError> {
        if !archive_url_template.contains("{tag}") {
            return Err(ApiError::InvalidInput {
                message: "archive_url_template must contain {tag}".to_string(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            versions_url,
            launcher_info_url,
            archive_url_template,
        })
    }

    pub fn archive_url(&self, tag: &str) -> String {
        self.archive_url_template.replace("{tag}", tag)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        log::debug!("HTTP GET {url}");
        self.client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(network_error)
    }
}

#[async_trait]
impl VersionSource for HttpSource {
    async fn versions(&self) -> Result<VersionList, ApiError> {
        let body = self
            .get(&self.versions_url)
            .await?
            .text()
            .await
            .map_err(network_error)?;
        parse_version_list(&body)
    }

    async fn launcher_info(&self) -> Result<String, ApiError> {
        let Some(url) = &self.launcher_info_url else {
            return Ok(String::new());
        };
        self.get(url).await?.text().await.map_err(network_error)
    }

    async fn open_archive(&self, version: &VersionDescriptor) -> Result<ArchiveStream, ApiError> {
        let url = self.archive_url(&version.tag);
        let response = self.client.get(&url).send().await.map_err(network_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::VersionNotFound {
                tag: version.tag.clone(),
            });
        }
        let response = response.error_for_status().map_err(network_error)?;

        let total = response.content_length().unwrap_or(version.size);
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(network_error))
            .boxed();

        Ok(ArchiveStream { total, chunks })
    }
}

fn parse_version_list(content: &str) -> Result<VersionList, ApiError> {
    serde_json::from_str(content).map_err(|e| ApiError::ProtocolError {
        message: format!("Malformed version list: {e}"),
    })
}

fn network_error(e: reqwest::Error) -> ApiError {
    ApiError::NetworkError {
        message: e.to_string(),
    }
}
