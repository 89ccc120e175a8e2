//! HTTP client for an XTTS inference server (`POST /tts`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use uuid::Uuid;

use super::helpers::{
    build_synthesis_multipart, is_wav_content_type, looks_like_wav, trim_trailing_slash,
};
use super::transport::{engine_headers, extract_error_message, shared_client, status_to_error};
use super::tts::SynthesisEngine;
use super::types::SynthesisRequest;
use crate::error::VoxError;
use crate::util::timeout::{with_deadline, with_timeout};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8020";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine client that uploads the voice reference with every request.
///
/// Performs a single attempt per call; retries belong to the job queue.
/// Unbounded unless [`with_timeout`](Self::with_timeout) is set: inside the
/// service the worker's per-attempt deadline is the only one.
#[derive(Debug, Clone)]
pub struct HttpSynthesisEngine {
    api_key: Option<String>,
    base_url: String,
    timeout: Option<Duration>,
}

impl Default for HttpSynthesisEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HttpSynthesisEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn validate_request(&self, request: &SynthesisRequest) -> Result<(), VoxError> {
        if request.text.trim().is_empty() {
            return Err(VoxError::EmptyTask);
        }
        if request.language.trim().is_empty() {
            return Err(VoxError::InvalidArgument(
                "Language cannot be empty".to_string(),
            ));
        }
        if request.voice.bytes().is_empty() {
            return Err(VoxError::InvalidArgument(
                "Voice reference cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SynthesisEngine for HttpSynthesisEngine {
    fn name(&self) -> &str {
        "xtts-http"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, VoxError> {
        self.validate_request(request)?;

        let boundary = format!("voxrelay-{}", Uuid::new_v4().simple());
        let body = build_synthesis_multipart(&boundary, request);

        let mut headers = engine_headers(self.api_key.as_deref());
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={boundary}")).map_err(
                |e| VoxError::InvalidArgument(format!("Failed to build multipart content-type: {e}")),
            )?,
        );

        let url = format!("{}/tts", trim_trailing_slash(&self.base_url));

        with_deadline(self.timeout, async {
            let response = shared_client()
                .post(url)
                .headers(headers)
                .body(body)
                .send()
                .await?;

            parse_synthesis_response(response).await
        })
        .await
    }

    async fn warm_up(&self) -> Result<(), VoxError> {
        let url = format!("{}/health", trim_trailing_slash(&self.base_url));
        let headers = engine_headers(self.api_key.as_deref());

        with_timeout(HEALTH_TIMEOUT, async {
            let response = shared_client().get(url).headers(headers).send().await?;
            let status = response.status().as_u16();
            if !(200..300).contains(&status) {
                let body = response.text().await.unwrap_or_default();
                return Err(status_to_error(status, &body));
            }
            Ok(())
        })
        .await
    }
}

async fn parse_synthesis_response(response: reqwest::Response) -> Result<Vec<u8>, VoxError> {
    let status = response.status().as_u16();
    if status != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    // Some servers report failures as a 200 with a JSON body.
    if content_type.starts_with("application/json") {
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| "Expected audio payload, got JSON response".to_string());
        return Err(VoxError::Engine(message));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(VoxError::Engine(
            "Synthesis response contained empty audio payload".to_string(),
        ));
    }

    if !is_wav_content_type(&content_type) && !looks_like_wav(&bytes) {
        return Err(VoxError::InvalidState(format!(
            "Unexpected synthesis response MIME type '{content_type}'"
        )));
    }

    Ok(bytes.to_vec())
}
