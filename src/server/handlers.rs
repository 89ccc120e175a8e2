use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::error::{ApiError, PageError};
use super::pages;
use super::state::AppState;
use crate::engine::AUDIO_MIME;
use crate::error::VoxError;
use crate::queue::{JobId, JobSnapshot, JobState, Submission};

pub const JOB_ID_HEADER: &str = "x-job-id";
const DOWNLOAD_NAME: &str = "speech_output.wav";

/// Body of the HTML form routes.
#[derive(Debug, Deserialize)]
pub struct TextForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Body of the JSON routes.
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default, alias = "input")]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub id: JobId,
    pub state: JobState,
    pub status_url: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_capacity: usize,
    pub queued: usize,
    pub workers: usize,
    pub accepting: bool,
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(pages::index(state.queue.default_language()))
}

/// `POST /`: queue the text and redirect to the job page.
pub async fn submit_form(
    State(state): State<AppState>,
    Form(form): Form<TextForm>,
) -> Result<Response, PageError> {
    let ticket = state
        .queue
        .submit(Submission::http(form.text, non_empty(form.language)))?;
    let snapshot = ticket.snapshot();
    tracing::info!(job_id = %snapshot.id, "job queued from form");
    Ok((
        StatusCode::SEE_OTHER,
        [(header::LOCATION, format!("/jobs/{}", snapshot.id))],
        Html(pages::submitted(&snapshot)),
    )
        .into_response())
}

/// `POST /synthesize`: form front door, waits and returns the audio.
pub async fn synthesize_form(
    State(state): State<AppState>,
    Form(form): Form<TextForm>,
) -> Result<Response, ApiError> {
    synthesize(&state, form.text, non_empty(form.language)).await
}

/// `POST /api/synthesize`: JSON front door, waits and returns the audio.
pub async fn synthesize_json(
    State(state): State<AppState>,
    Json(body): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    synthesize(&state, body.text, non_empty(body.language)).await
}

async fn synthesize(
    state: &AppState,
    text: String,
    language: Option<String>,
) -> Result<Response, ApiError> {
    let mut ticket = state.queue.submit(Submission::http(text, language))?;
    let id = ticket.id();
    let snapshot = ticket
        .wait_timeout(state.request_timeout)
        .await
        .map_err(|err| ApiError::from(err).with_job(id))?;

    match snapshot.state {
        JobState::Succeeded => audio_response(state, &snapshot).await,
        JobState::DeadLettered => Err(ApiError::dead_lettered(
            snapshot
                .error
                .unwrap_or_else(|| "speech synthesis failed".to_string()),
            snapshot.error_code,
        )
        .with_job(id)),
        JobState::Cancelled => Err(ApiError::from(VoxError::QueueClosed).with_job(id)),
        JobState::Queued | JobState::Running => {
            Err(ApiError::internal("job finished in a non-terminal state").with_job(id))
        }
    }
}

async fn audio_response(state: &AppState, snapshot: &JobSnapshot) -> Result<Response, ApiError> {
    let artifact = snapshot
        .artifact
        .as_deref()
        .ok_or_else(|| ApiError::internal("job succeeded without an artifact"))?;
    let path = state.store.resolve_download(artifact)?;
    let audio = tokio::fs::read(&path).await.map_err(VoxError::from)?;

    let mut response = (
        [
            (header::CONTENT_TYPE, AUDIO_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
            ),
        ],
        audio,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&snapshot.id.to_string()) {
        response.headers_mut().insert(JOB_ID_HEADER, value);
    }
    Ok(response)
}

/// `POST /api/jobs`: queue and return immediately.
pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let ticket = state
        .queue
        .submit(Submission::http(body.text, non_empty(body.language)))?;
    let id = ticket.id();
    let accepted = JobAccepted {
        id,
        state: ticket.snapshot().state,
        status_url: format!("/api/jobs/{id}"),
        download_url: format!("/download/{}", crate::store::ResultStore::artifact_name(id)),
    };
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, accepted.status_url.clone())],
        Json(accepted),
    )
        .into_response())
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    lookup(&state, &id).map(Json)
}

pub async fn job_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, PageError> {
    lookup(&state, &id)
        .map(|snapshot| Html(pages::job_status(&snapshot)))
        .map_err(PageError)
}

fn lookup(state: &AppState, raw_id: &str) -> Result<JobSnapshot, ApiError> {
    let id: JobId = raw_id
        .parse()
        .map_err(|_| ApiError::not_found(format!("job {raw_id} not found")))?;
    state
        .queue
        .get(id)
        .ok_or_else(|| ApiError::from(VoxError::JobNotFound(id.to_string())))
}

/// `GET /download/{file_name}`: stream a finished artifact.
pub async fn download(State(state): State<AppState>, Path(file_name): Path<String>) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Html(pages::not_found(&format!("File {file_name}"))),
        )
            .into_response()
    };

    let Ok(path) = state.store.resolve_download(&file_name) else {
        return not_found();
    };
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return not_found(),
        Err(err) => return PageError::from(VoxError::from(err)).into_response(),
    };
    let len = file.metadata().await.ok().map(|meta| meta.len());

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_MIME));
    if let Some(len) = len {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{file_name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let accepting = !state.queue.is_closed();
    Json(HealthResponse {
        status: if accepting { "ok" } else { "stopping" },
        queue_capacity: state.queue.capacity(),
        queued: state.queue.pending(),
        workers: state.workers,
        accepting,
    })
}

fn non_empty(language: Option<String>) -> Option<String> {
    language.filter(|lang| !lang.trim().is_empty())
}
