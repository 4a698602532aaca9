use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::PresenterError;
use crate::submitter::{AttemptId, GenerationResult, GenerationSuccess};

/// Opens an artifact URL outside the workflow (browser, viewer, new tab).
pub trait Navigator: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub attempt: AttemptId,
    pub artifact_url: String,
    pub caption: String,
    pub metadata: Map<String, Value>,
}

impl ResultView {
    pub fn from_success(success: &GenerationSuccess) -> Self {
        Self {
            attempt: success.attempt,
            artifact_url: success.artifact_url.clone(),
            caption: format!(
                "Style: {} • Room: {}",
                success.settings.style, success.settings.room_type
            ),
            metadata: success.metadata.clone(),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.artifact_url.starts_with("data:")
    }
}

#[derive(Debug, Clone)]
pub struct ResultPresenter {
    http: reqwest::Client,
    download_dir: PathBuf,
}

impl ResultPresenter {
    pub fn new(
        download_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            download_dir: download_dir.into(),
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn view(&self, result: &GenerationResult) -> Option<ResultView> {
        result.success().map(ResultView::from_success)
    }

    pub fn open_full_size(
        &self,
        view: &ResultView,
        navigator: &dyn Navigator,
    ) -> Result<(), PresenterError> {
        navigator
            .open(&view.artifact_url)
            .map_err(|err| PresenterError::Navigator {
                url: view.artifact_url.clone(),
                message: format!("{err:#}"),
            })
    }

    /// Save the artifact as `design-<unix-millis>.png` under `dir`, or the
    /// configured download directory.
    pub async fn download(
        &self,
        view: &ResultView,
        dir: Option<&Path>,
    ) -> Result<PathBuf, PresenterError> {
        let bytes = self.fetch_artifact(&view.artifact_url).await?;
        let dir = dir.unwrap_or(self.download_dir.as_path());
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PresenterError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        let path = download_path(dir, chrono::Utc::now().timestamp_millis());
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| PresenterError::Io {
                path: path.clone(),
                source,
            })?;
        info!(
            attempt = %view.attempt,
            path = %path.display(),
            bytes = bytes.len(),
            "artifact downloaded"
        );
        Ok(path)
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, PresenterError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        let parsed =
            Url::parse(url).map_err(|_| PresenterError::UnsupportedUrl(url.to_string()))?;
        match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| PresenterError::UnsupportedUrl(url.to_string()))?;
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| PresenterError::Io { path, source })
            }
            "http" | "https" => {
                let response = self.http.get(parsed).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(PresenterError::FetchStatus(status.as_u16()));
                }
                Ok(response.bytes().await?.to_vec())
            }
            _ => Err(PresenterError::UnsupportedUrl(url.to_string())),
        }
    }
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, PresenterError> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or(PresenterError::InvalidDataUrl)?;
    if !header.ends_with(";base64") {
        return Err(PresenterError::InvalidDataUrl);
    }
    BASE64
        .decode(payload.trim())
        .map_err(|_| PresenterError::InvalidDataUrl)
}

fn download_path(dir: &Path, millis: i64) -> PathBuf {
    let first = dir.join(format!("design-{millis}.png"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|idx| dir.join(format!("design-{millis}-{idx}.png")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
