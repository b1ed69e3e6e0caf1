//! HTTP request handlers for the zipfix API.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::core::archive::write_archive;
use crate::core::error::PipelineError;
use crate::core::extract::read_archive;
use crate::core::pipeline::run_fix;
use crate::core::project::{
    FileAction, FileOperation, ProjectFile, state_from_files, state_to_files,
};

use super::AppState;

/// Uniform failure envelope
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

/// Handler-level failure carrying its HTTP status. Input-side problems
/// map to 400, everything past the upload boundary to 500. Diagnostic
/// detail (raw model output) stays in the server log.
pub(super) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::UploadInput(_) | PipelineError::Archive(_) => StatusCode::BAD_REQUEST,
            PipelineError::AiRequest(_)
            | PipelineError::AiResponseFormat(_)
            | PipelineError::ArchiveWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "pipeline failure");
        } else {
            tracing::warn!(error = %err, "rejected request");
        }

        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody { success: false, message: self.message }),
        )
            .into_response()
    }
}

// -- /ping --

pub(super) async fn ping() -> &'static str {
    "pong"
}

// -- /upload --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UploadResponse {
    success: bool,
    message: String,
    files: Vec<ProjectFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Pull the first file-bearing field out of a multipart body.
async fn first_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?;

        let Some(field) = field else {
            return Err(ApiError::bad_request("no file was uploaded"));
        };

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;

        return Ok((filename, bytes.to_vec()));
    }
}

pub(super) async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (filename, bytes) = first_file_field(&mut multipart).await?;

    if !filename.to_lowercase().ends_with(".zip") {
        return Err(PipelineError::UploadInput(
            "invalid file type, only .zip archives are accepted".to_string(),
        )
        .into());
    }

    let result = read_archive(&bytes, &state.filter)?;

    tracing::info!(
        archive = %filename,
        files = result.files.len(),
        skipped = result.skipped.len(),
        "upload extracted"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "File uploaded and extracted successfully ({} file(s)).",
            result.files.len()
        ),
        files: result.files,
        warnings: result.skipped,
    }))
}

// -- /upload-single --

pub(super) async fn upload_single(
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (filename, bytes) = first_file_field(&mut multipart).await?;

    let content = String::from_utf8(bytes).map_err(|_| {
        ApiError::bad_request("the uploaded file is not valid UTF-8 text")
    })?;

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully.".to_string(),
        files: vec![ProjectFile { filename, content }],
        warnings: Vec::new(),
    }))
}

// -- /fix --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FixRequest {
    files: Vec<ProjectFile>,
    #[serde(default)]
    user_prompt: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FixResponse {
    success: bool,
    message: String,
    file_changes: Vec<FileOperation>,
    suggested_changes: Vec<String>,
    updated_project_state: Vec<ProjectFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

pub(super) async fn fix(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FixRequest>,
) -> Result<Json<FixResponse>, ApiError> {
    if req.files.is_empty() {
        return Err(ApiError::bad_request(
            "No files provided for fixing. Please upload a project first.",
        ));
    }

    let prior = state_from_files(&req.files);
    // An empty prompt is a valid request meaning "general cleanup".
    let instruction = req.user_prompt.unwrap_or_default();

    let outcome = run_fix(&state.gateway, &prior, &instruction).await?;

    let count_of = |action: FileAction| {
        outcome
            .file_changes
            .iter()
            .filter(|op| op.action == action)
            .count()
    };

    Ok(Json(FixResponse {
        success: true,
        message: format!(
            "Project processing complete. {} change(s) applied (created: {}, modified: {}, deleted: {}).",
            outcome.file_changes.len(),
            count_of(FileAction::Created),
            count_of(FileAction::Modified),
            count_of(FileAction::Deleted),
        ),
        file_changes: outcome.file_changes,
        suggested_changes: outcome.suggested_changes,
        updated_project_state: state_to_files(&outcome.updated_state),
        warnings: outcome.warnings,
    }))
}

// -- /download --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DownloadRequest {
    project_state: Vec<ProjectFile>,
}

pub(super) async fn download(
    Json(req): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    let bytes = write_archive(&req.project_state)?;
    let filename = format!("fixed-project-{}.zip", Local::now().format("%Y%m%d-%H%M%S"));

    tracing::info!(entries = req.project_state.len(), bytes = bytes.len(), "archive built");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
