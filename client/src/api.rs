use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{multipart, Client, Response};
use serde_json::Value;
use shared::{
    ClassificationResponse, NormalizationOutcome, ResponseNormalizer, StatusClient,
    StatusResponse, Submission, SubmissionResponse,
};
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;

const WASTE_CLASSIFICATION_PATH: &str = "api/waste-classification";
const STOCK_DETECTION_PATH: &str = "api/stock-detection";
const TASK_STATUS_PATH: &str = "api/task-status/";

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
];

const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("webm", "video/webm"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend returned {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
    #[error("Unsupported {kind} file: {path}")]
    UnsupportedFile { kind: MediaKind, path: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Looks up the MIME type for `path` among the extensions accepted for `kind`.
pub fn media_type(path: &Path, kind: MediaKind) -> Result<&'static str, ApiError> {
    let table = match kind {
        MediaKind::Image => IMAGE_TYPES,
        MediaKind::Video => VIDEO_TYPES,
    };
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| {
            table
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .ok_or_else(|| ApiError::UnsupportedFile {
            kind,
            path: path.display().to_string(),
        })
}

/// HTTP client for the inference backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
    normalizer: Arc<ResponseNormalizer>,
}

impl BackendClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            http,
            base_url,
            normalizer: Arc::new(ResponseNormalizer::new()),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Uploads an image for waste classification and normalizes whatever
    /// the classifier answered.
    pub async fn classify_waste(&self, image: &Path) -> Result<NormalizationOutcome, ApiError> {
        let file_name = file_name(image);
        let response = self.upload(WASTE_CLASSIFICATION_PATH, image, MediaKind::Image).await?;
        let body = check(response).await?.text().await?;

        let outcome = match serde_json::from_str::<ClassificationResponse>(&body) {
            Ok(envelope) if !envelope.status.eq_ignore_ascii_case("success") => {
                return Err(ApiError::Rejected(envelope.status));
            }
            Ok(ClassificationResponse {
                classification: Some(classification),
                ..
            }) => self.normalizer.normalize(&classification, Some(&file_name)),
            Ok(_) => {
                warn!("Classification response for {} carried no classification", file_name);
                NormalizationOutcome::Unparseable
            }
            Err(err) => {
                debug!("Classification envelope did not parse ({}), trying raw text", err);
                self.normalizer.normalize_text(&body, Some(&file_name))
            }
        };

        if let Some(result) = outcome.classification() {
            for violation in result.check_invariants() {
                warn!("Classification of {}: {}", file_name, violation);
            }
        }
        info!("{}: {}", file_name, outcome.summary());
        Ok(outcome)
    }

    /// Uploads a video for stock detection. Long-running jobs come back as
    /// [`Submission::Pending`] and need to be tracked.
    pub async fn submit_stock_video(&self, video: &Path) -> Result<Submission, ApiError> {
        let response = self.upload(STOCK_DETECTION_PATH, video, MediaKind::Video).await?;
        let submission: SubmissionResponse = check(response).await?.json().await?;

        let reason = submission
            .message
            .clone()
            .unwrap_or_else(|| format!("status {}", submission.status));
        match submission.into_submission() {
            Some(Submission::Pending { task_id }) => {
                info!("Stock detection accepted as task {}", task_id);
                Ok(Submission::Pending { task_id })
            }
            Some(ready) => {
                info!("Stock detection finished synchronously");
                Ok(ready)
            }
            None => Err(ApiError::Rejected(reason)),
        }
    }

    pub async fn task_status(&self, task_id: &str) -> Result<StatusResponse, ApiError> {
        let url = self.task_status_url(task_id)?;
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    // The id is pushed as a single escaped segment; dot segments would be
    // resolved away by the URL parser, so they are refused.
    fn task_status_url(&self, task_id: &str) -> Result<Url, ApiError> {
        if matches!(task_id, "" | "." | "..") {
            return Err(ApiError::InvalidTaskId(task_id.to_string()));
        }
        let mut url = self.base_url.join(TASK_STATUS_PATH)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(task_id);
        Ok(url)
    }

    async fn upload(&self, path: &str, file: &Path, kind: MediaKind) -> Result<Response, ApiError> {
        let mime = media_type(file, kind)?;
        let bytes = tokio::fs::read(file).await.map_err(|source| ApiError::Io {
            path: file.display().to_string(),
            source,
        })?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name(file))
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        let url = self.base_url.join(path)?;
        info!("Uploading {} to {}", file.display(), url);
        Ok(self.http.post(url).multipart(form).send().await?)
    }
}

impl StatusClient for BackendClient {
    type Error = ApiError;

    async fn fetch_status(&self, task_id: &str) -> Result<StatusResponse, ApiError> {
        self.task_status(task_id).await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// Non-2xx responses surface the backend's `detail` field when it sends one.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });
    Err(ApiError::Http {
        status: status.as_u16(),
        detail,
    })
}
