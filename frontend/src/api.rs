use std::time::Duration;

use gloo_file::File as GlooFile;
use gloo_net::http::{Request, Response};
use serde_json::Value;
use shared::{
    ClassificationResponse, NormalizationOutcome, ResponseNormalizer, StatusClient,
    StatusResponse, Submission, SubmissionResponse, Timer,
};

const WASTE_CLASSIFICATION_URL: &str = "/api/waste-classification";
const STOCK_DETECTION_URL: &str = "/api/stock-detection";
const TASK_STATUS_URL: &str = "/api/task-status";

/// Status endpoint of the backend serving this page.
#[derive(Clone, Copy, Default)]
pub struct GlooStatusClient;

impl StatusClient for GlooStatusClient {
    type Error = String;

    async fn fetch_status(&self, task_id: &str) -> Result<StatusResponse, String> {
        let url = format!(
            "{}/{}",
            TASK_STATUS_URL,
            String::from(js_sys::encode_uri_component(task_id))
        );
        let response = Request::get(&url)
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;
        let response = check(response).await?;
        response
            .json::<StatusResponse>()
            .await
            .map_err(|e| format!("Failed to parse task status: {}", e))
    }
}

#[derive(Clone, Copy, Default)]
pub struct GlooTimer;

impl Timer for GlooTimer {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await
    }
}

pub async fn classify_waste(
    normalizer: &ResponseNormalizer,
    file: &GlooFile,
) -> Result<NormalizationOutcome, String> {
    let response = upload(WASTE_CLASSIFICATION_URL, file).await?;
    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {}", e))?;
    let file_name = file.name();

    let outcome = match serde_json::from_str::<ClassificationResponse>(&body) {
        Ok(envelope) if !envelope.status.eq_ignore_ascii_case("success") => {
            return Err(format!("Classification failed: {}", envelope.status));
        }
        Ok(ClassificationResponse {
            classification: Some(classification),
            ..
        }) => normalizer.normalize(&classification, Some(&file_name)),
        Ok(_) => NormalizationOutcome::Unparseable,
        Err(_) => normalizer.normalize_text(&body, Some(&file_name)),
    };
    if let Some(result) = outcome.classification() {
        for violation in result.check_invariants() {
            log::warn!("Classification of {}: {}", file_name, violation);
        }
    }
    Ok(outcome)
}

pub async fn submit_stock_video(file: &GlooFile) -> Result<Submission, String> {
    let response = upload(STOCK_DETECTION_URL, file).await?;
    let submission = response
        .json::<SubmissionResponse>()
        .await
        .map_err(|e| format!("Failed to parse response: {}", e))?;

    let reason = submission
        .message
        .clone()
        .unwrap_or_else(|| format!("status {}", submission.status));
    submission
        .into_submission()
        .ok_or_else(|| format!("Stock detection rejected: {}", reason))
}

async fn upload(url: &str, file: &GlooFile) -> Result<Response, String> {
    let form_data = web_sys::FormData::new().map_err(|_| "Failed to create form data".to_string())?;
    form_data
        .append_with_blob_and_filename("file", file.as_ref(), &file.name())
        .map_err(|_| "Failed to attach file".to_string())?;

    let request = Request::post(url)
        .body(form_data)
        .map_err(|e| format!("Failed to build request: {}", e))?;
    let response = request
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    check(response).await
}

async fn check(response: Response) -> Result<Response, String> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    Err(format!("Server error: {} - {}", status, detail))
}
