//! Attachment-only download endpoints, v1 and v2. Every response here
//! serves from `originals/` or `presentation_videos/` and always carries
//! `Content-Disposition: attachment` (spec §3 invariant iii). Unlike HLS
//! playback, presentation files are unencrypted on disk, but the
//! download route itself still sits behind the download audience gate.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use lessonvault_core::service::{Audience, DownloadType, RouteIdentifiers};
use lessonvault_core::storage;

use crate::http::error::AppResult;
use crate::http::extract::presented_token;
use crate::http::files;
use crate::http::handlers::streaming::TokenQuery;
use crate::http::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/download/{user_id}/{filename}", get(download_v1))
        .route("/download2/{trainer}/{course}/{module}/{lesson}/{filename}", get(download_v2_lesson))
        .route("/download2/course/{course_id}/{filename}", get(download_v2_course))
        .route("/download2/module/{course_id}/{module_id}/{filename}", get(download_v2_module))
}

#[utoipa::path(
    get,
    path = "/api/download/{user_id}/{filename}",
    params(("user_id" = String, Path), ("filename" = String, Path), ("token" = Option<String>, Query)),
    responses(
        (status = 200, description = "Original file as an attachment"),
        (status = 403, description = "Credential missing, expired, or not bound to this resource"),
    )
)]
pub(crate) async fn download_v1(
    State(state): State<AppState>,
    Path((user_id, filename)): Path<(String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let route = RouteIdentifiers {
        user_id: Some(user_id.clone()),
        filename: Some(filename.clone()),
        ..Default::default()
    };
    state.gate.authorize(Audience::Download, token.as_deref(), None, &route)?;

    let path = state.storage.v1_original_path(&user_id, &filename);
    Ok(files::serve_file(&path, "application/octet-stream", Some(&filename)).await?)
}

async fn download_v2_lesson(
    State(state): State<AppState>,
    Path((trainer, course, module, lesson, filename)): Path<(String, String, String, String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let rel = storage::parse_rel(&format!("{trainer}/{course}/{module}/{lesson}"))?;
    let route = RouteIdentifiers {
        rel: Some(storage::rel_to_string(&rel)),
        filename: Some(filename.clone()),
        download_type: Some(DownloadType::Lesson),
        ..Default::default()
    };
    state.gate.authorize(Audience::Download, token.as_deref(), None, &route)?;

    let dir = state.storage.v2_original_dir(&rel);
    Ok(files::serve_file(&dir.join(storage::sanitize_segment(&filename)), "application/octet-stream", Some(&filename)).await?)
}

async fn download_v2_course(
    State(state): State<AppState>,
    Path((course_id, filename)): Path<(String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let route = RouteIdentifiers {
        course_id: Some(course_id.clone()),
        filename: Some(filename.clone()),
        download_type: Some(DownloadType::Course),
        ..Default::default()
    };
    state.gate.authorize(Audience::Download, token.as_deref(), None, &route)?;

    let dir = state.storage.presentation_course_dir(&course_id);
    Ok(files::serve_file(&dir.join(storage::sanitize_segment(&filename)), "application/octet-stream", Some(&filename)).await?)
}

async fn download_v2_module(
    State(state): State<AppState>,
    Path((course_id, module_id, filename)): Path<(String, String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let route = RouteIdentifiers {
        course_id: Some(course_id.clone()),
        module_id: Some(module_id.clone()),
        filename: Some(filename.clone()),
        download_type: Some(DownloadType::Module),
        ..Default::default()
    };
    state.gate.authorize(Audience::Download, token.as_deref(), None, &route)?;

    let dir = state.storage.presentation_module_dir(&course_id, &module_id);
    Ok(files::serve_file(&dir.join(storage::sanitize_segment(&filename)), "application/octet-stream", Some(&filename)).await?)
}
