//! Upload acceptance: `/upload`, `/upload/lesson`, `/upload_presentation*`.
//!
//! Streams the multipart file field to a temp file on disk, enforcing the
//! 100 MiB cap mid-stream rather than buffering the whole payload
//! (ported from the chunked `field.chunk()` loop in
//! `other_examples/69c56317_altqx-akane__src-handlers.rs.rs`), then moves
//! it into place under the legacy or hierarchical layout and, where
//! applicable, enqueues a transcode job.

use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use lessonvault_core::error::Error;
use lessonvault_core::service::JobSpec;
use lessonvault_core::storage;

use crate::http::error::AppResult;
use crate::http::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_v1))
        .route("/upload/lesson", post(upload_lesson))
        .route("/upload_presentation", post(upload_presentation_unscoped))
        .route("/upload_presentation/course/{course_id}", post(upload_presentation_course))
        .route("/upload_presentation/module/{course_id}/{module_id}", post(upload_presentation_module))
}

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "wmv", "flv"];

#[derive(Serialize)]
struct UploadAccepted {
    task_id: Option<String>,
    message: &'static str,
}

struct StreamedUpload {
    original_filename: String,
    temp_path: std::path::PathBuf,
    /// Sibling non-`file` form fields read off the same multipart body,
    /// e.g. the `user_id` field `/upload` binds its v1 layout to
    /// (`original_source/server.py`'s `request.form.get('user_id')`).
    user_id: Option<String>,
}

/// Walk every field of a multipart body: stream the `file` field to a
/// temp file, rejecting anything past [`MAX_UPLOAD_BYTES`] mid-stream
/// and anything whose extension isn't in [`ALLOWED_EXTENSIONS`]; read
/// sibling text fields (`user_id`) the way
/// `other_examples/69c56317_altqx-akane__src-handlers.rs.rs:121` reads
/// non-file multipart fields.
async fn stream_upload_field(multipart: &mut Multipart) -> AppResult<StreamedUpload> {
    let mut streamed: Option<(String, std::path::PathBuf)> = None;
    let mut user_id: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("user_id") => {
                let text = field.text().await.map_err(|e| Error::BadRequest(format!("invalid user_id field: {e}")))?;
                user_id = Some(text);
                continue;
            }
            Some("file") => {}
            _ => continue,
        }

        let original_filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::BadRequest("file field is missing a filename".to_string()))?;

        let extension = original_filename.rsplit('.').next().unwrap_or("").to_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::BadRequest(format!("unsupported file extension: {extension}")).into());
        }

        let temp_path = std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), storage::sanitize_segment(&original_filename)));
        let mut file = tokio::fs::File::create(&temp_path).await.map_err(Error::from)?;

        let mut total_bytes: usize = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| Error::BadRequest(format!("failed to read upload chunk: {e}")))?
        {
            total_bytes += chunk.len();
            if total_bytes > MAX_UPLOAD_BYTES {
                drop(file);
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(Error::BadRequest("upload exceeds 100 MiB limit".to_string()).into());
            }
            file.write_all(&chunk).await.map_err(Error::from)?;
        }

        streamed = Some((original_filename, temp_path));
    }

    let (original_filename, temp_path) = streamed.ok_or_else(|| Error::BadRequest("multipart body has no file field".to_string()))?;
    Ok(StreamedUpload { original_filename, temp_path, user_id })
}

fn extension_of(filename: &str) -> String {
    filename.rsplit('.').next().unwrap_or("").to_lowercase()
}

#[derive(Deserialize)]
struct CallbackUrls {
    success_url: Option<String>,
    error_url: Option<String>,
}

fn callback_urls(state: &AppState, q: &CallbackUrls) -> AppResult<(String, String)> {
    let default = state.config.callback.default_lifecycle_url.as_deref();
    let success = q.success_url.clone().or_else(|| default.map(|d| format!("{d}/success"))).ok_or_else(|| {
        Error::BadRequest("success_url is required (no default_lifecycle_url configured)".to_string())
    })?;
    let error = q.error_url.clone().or_else(|| default.map(|d| format!("{d}/error"))).ok_or_else(|| {
        Error::BadRequest("error_url is required (no default_lifecycle_url configured)".to_string())
    })?;
    Ok((success, error))
}

async fn upload_v1(State(state): State<AppState>, Query(q): Query<CallbackUrls>, mut multipart: Multipart) -> AppResult<impl IntoResponse> {
    let upload = stream_upload_field(&mut multipart).await?;
    let (success_url, error_url) = callback_urls(&state, &q)?;

    let user_id = upload
        .user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::BadRequest("User ID missing".to_string()))?;
    let video_id = storage::sanitize_segment(upload.original_filename.trim_end_matches(&format!(".{}", extension_of(&upload.original_filename))));
    let ext = extension_of(&upload.original_filename);
    let filename = format!("{video_id}.{ext}");

    let original_dir = state.storage.v1_original_dir(&user_id);
    let upload_dir = state.storage.v1_upload_dir(&user_id);
    storage::ensure_dir(&original_dir).await?;
    storage::ensure_dir(&upload_dir).await?;

    let original_path = original_dir.join(&filename);
    let upload_path = upload_dir.join(&filename);
    tokio::fs::copy(&upload.temp_path, &original_path).await.map_err(Error::from)?;
    tokio::fs::rename(&upload.temp_path, &upload_path).await.map_err(Error::from)?;

    let hls_dir = state.storage.v1_hls_dir(&user_id, &video_id);
    let task_id = state.orchestrator.enqueue(JobSpec {
        task_id: String::new(),
        source_path: upload_path,
        hls_dir,
        success_url,
        error_url,
        user_id: Some(user_id),
        video_id: Some(video_id),
        key: None,
        key_url: None,
        context: None,
        rel: None,
        public_host: state.config.storage.public_host.clone(),
    })?;

    Ok((axum::http::StatusCode::ACCEPTED, Json(UploadAccepted { task_id: Some(task_id), message: "upload accepted" })))
}

#[derive(Deserialize)]
struct LessonUploadQuery {
    trainer_id: String,
    course_id: String,
    module_id: String,
    lesson_id: String,
    #[serde(flatten)]
    callbacks: CallbackUrls,
}

async fn upload_lesson(State(state): State<AppState>, Query(q): Query<LessonUploadQuery>, mut multipart: Multipart) -> AppResult<impl IntoResponse> {
    let upload = stream_upload_field(&mut multipart).await?;
    let (success_url, error_url) = callback_urls(&state, &q.callbacks)?;
    let ext = extension_of(&upload.original_filename);

    let rel = [
        storage::sanitize_segment(&q.trainer_id),
        storage::sanitize_segment(&q.course_id),
        storage::sanitize_segment(&q.module_id),
        storage::sanitize_segment(&q.lesson_id),
    ];
    let filename = storage::lesson_filename(&q.lesson_id, &ext);

    let original_dir = state.storage.v2_original_dir(&rel);
    let upload_dir = state.storage.v2_upload_dir(&rel);
    storage::ensure_dir(&original_dir).await?;
    storage::ensure_dir(&upload_dir).await?;

    let original_path = original_dir.join(&filename);
    let upload_path = upload_dir.join(&filename);
    tokio::fs::copy(&upload.temp_path, &original_path).await.map_err(Error::from)?;
    tokio::fs::rename(&upload.temp_path, &upload_path).await.map_err(Error::from)?;

    let hls_dir = state.storage.v2_hls_dir(&rel);
    let task_id = state.orchestrator.enqueue(JobSpec {
        task_id: String::new(),
        source_path: upload_path,
        hls_dir,
        success_url,
        error_url,
        user_id: None,
        video_id: None,
        key: None,
        key_url: None,
        context: None,
        rel: Some(storage::rel_to_string(&rel)),
        public_host: state.config.storage.public_host.clone(),
    })?;

    Ok((axum::http::StatusCode::ACCEPTED, Json(UploadAccepted { task_id: Some(task_id), message: "lesson upload accepted" })))
}

/// A presentation video needs no transcode: it is served unencrypted,
/// so the upload simply lands under `presentation_videos/` and returns
/// immediately.
async fn accept_presentation(state: &AppState, dest: std::path::PathBuf, upload: StreamedUpload) -> AppResult<impl IntoResponse> {
    if let Some(parent) = dest.parent() {
        storage::ensure_dir(parent).await?;
    }
    tokio::fs::rename(&upload.temp_path, &dest).await.map_err(Error::from)?;
    let _ = state;
    Ok((axum::http::StatusCode::CREATED, Json(UploadAccepted { task_id: None, message: "presentation accepted" })))
}

async fn upload_presentation_unscoped(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<impl IntoResponse> {
    let upload = stream_upload_field(&mut multipart).await?;
    let ext = extension_of(&upload.original_filename);
    let temp_id = uuid::Uuid::new_v4().to_string();
    let dest = state.storage.presentations_root.join("unscoped").join(format!("{temp_id}.{ext}"));
    accept_presentation(&state, dest, upload).await
}

async fn upload_presentation_course(
    State(state): State<AppState>,
    axum::extract::Path(course_id): axum::extract::Path<String>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let upload = stream_upload_field(&mut multipart).await?;
    let ext = extension_of(&upload.original_filename);
    let dest = state.storage.presentation_course_path(&course_id, &ext);
    accept_presentation(&state, dest, upload).await
}

async fn upload_presentation_module(
    State(state): State<AppState>,
    axum::extract::Path((course_id, module_id)): axum::extract::Path<(String, String)>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let upload = stream_upload_field(&mut multipart).await?;
    let ext = extension_of(&upload.original_filename);
    let dest = state.storage.presentation_module_path(&course_id, &module_id, &ext);
    accept_presentation(&state, dest, upload).await
}
