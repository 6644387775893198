//! Credential-minting endpoints: `/api/get-video-token/*`, `/api/get-download-token/*`.
//!
//! Public, unauthenticated routes — the operator's own upstream is
//! trusted to call these only on behalf of an already-authenticated
//! user. They return signed credentials and, for playback mints, an
//! absolute URL to the corresponding streaming route.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use lessonvault_core::service::{DownloadType, Platform};
use lessonvault_core::storage;

use crate::http::error::AppResult;
use crate::http::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/get-video-token/{user_id}/{filename}", get(web_token))
        .route("/api/get-video-token/mobile/{user_id}/{filename}/{video_id}", get(mobile_token))
        .route("/api/get-video-token/v2", get(v2_playback_token))
        .route("/api/get-download-token/{user_id}/{filename}", get(download_token_v1))
        .route("/api/get-download-token/v2", get(download_token_v2))
}

#[derive(Serialize, ToSchema)]
pub(crate) struct TokenResponse {
    token: String,
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    playlist_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<String>,
}

impl TokenResponse {
    fn plain(token: String, expires_in: i64) -> Self {
        Self {
            token,
            expires_in,
            playlist_url: None,
            download_url: None,
            download_base_url: None,
            extension: None,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/get-video-token/{user_id}/{filename}",
    params(("user_id" = String, Path), ("filename" = String, Path)),
    responses((status = 200, description = "Web playback credential", body = TokenResponse))
)]
pub(crate) async fn web_token(
    State(state): State<AppState>,
    Path((user_id, filename)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let ttl = state.config.credential.playback_ttl_seconds;
    let (token, _) = state.credentials.mint_web(&user_id, &filename, ttl)?;
    Ok(Json(TokenResponse::plain(token, ttl)))
}

#[utoipa::path(
    get,
    path = "/api/get-video-token/mobile/{user_id}/{filename}/{video_id}",
    params(("user_id" = String, Path), ("filename" = String, Path), ("video_id" = String, Path)),
    responses((status = 200, description = "Mobile playback credential with playlist URL", body = TokenResponse))
)]
pub(crate) async fn mobile_token(
    State(state): State<AppState>,
    Path((user_id, filename, video_id)): Path<(String, String, String)>,
) -> AppResult<impl IntoResponse> {
    let ttl = state.config.credential.playback_ttl_seconds;
    let (token, _) = state.credentials.mint_mobile(&user_id, &filename, &video_id, ttl)?;
    let playlist_url = format!(
        "https://{}/mobile/hls/{}/{}/output.m3u8",
        state.config.storage.public_host, user_id, video_id
    );
    Ok(Json(TokenResponse {
        playlist_url: Some(playlist_url),
        ..TokenResponse::plain(token, ttl)
    }))
}

#[derive(Deserialize)]
struct V2PlaybackQuery {
    user_id: String,
    rel: String,
    platform: String,
    ttl: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/get-video-token/v2",
    params(("user_id" = String, Query), ("rel" = String, Query), ("platform" = String, Query), ("ttl" = Option<i64>, Query)),
    responses((status = 200, description = "Hierarchical-layout playback credential", body = TokenResponse))
)]
pub(crate) async fn v2_playback_token(
    State(state): State<AppState>,
    Query(query): Query<V2PlaybackQuery>,
) -> AppResult<impl IntoResponse> {
    let platform = match query.platform.as_str() {
        "web" => Platform::Web,
        "mobile" => Platform::Mobile,
        other => return Err(lessonvault_core::Error::BadRequest(format!("invalid platform: {other}")).into()),
    };
    let rel = storage::parse_rel(&query.rel)?;
    let rel_str = storage::rel_to_string(&rel);
    let ttl = query.ttl.unwrap_or(state.config.credential.playback_ttl_seconds);

    let (token, _) = state.credentials.mint_v2_playback(&query.user_id, &rel_str, platform, ttl)?;

    let prefix = if platform == Platform::Mobile { "mobile/hls2" } else { "hls2" };
    let playlist_url = format!("https://{}/{}/{}/output.m3u8", state.config.storage.public_host, prefix, rel_str);

    Ok(Json(TokenResponse {
        playlist_url: Some(playlist_url),
        ..TokenResponse::plain(token, ttl)
    }))
}

#[utoipa::path(
    get,
    path = "/api/get-download-token/{user_id}/{filename}",
    params(("user_id" = String, Path), ("filename" = String, Path)),
    responses((status = 200, description = "Legacy download credential", body = TokenResponse))
)]
pub(crate) async fn download_token_v1(
    State(state): State<AppState>,
    Path((user_id, filename)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let ttl = state.config.credential.download_ttl_seconds;
    let (token, _) = state.credentials.mint_download_v1(&user_id, &filename, ttl)?;
    Ok(Json(TokenResponse::plain(token, ttl)))
}

#[derive(Deserialize)]
struct V2DownloadQuery {
    user_id: String,
    r#type: String,
    ttl: Option<i64>,
    filename: Option<String>,
    rel: Option<String>,
    course_id: Option<String>,
    module_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/get-download-token/v2",
    params(
        ("user_id" = String, Query), ("type" = String, Query), ("ttl" = Option<i64>, Query),
        ("filename" = Option<String>, Query), ("rel" = Option<String>, Query),
        ("course_id" = Option<String>, Query), ("module_id" = Option<String>, Query),
    ),
    responses((status = 200, description = "Hierarchical-layout download credential", body = TokenResponse))
)]
pub(crate) async fn download_token_v2(
    State(state): State<AppState>,
    Query(query): Query<V2DownloadQuery>,
) -> AppResult<impl IntoResponse> {
    let download_type = match query.r#type.as_str() {
        "lesson" => DownloadType::Lesson,
        "course" => DownloadType::Course,
        "module" => DownloadType::Module,
        other => return Err(lessonvault_core::Error::BadRequest(format!("invalid type: {other}")).into()),
    };
    let ttl = query.ttl.unwrap_or(state.config.credential.download_ttl_seconds);
    let require_filename = state.config.credential.require_filename_for_download;

    let (token, claims) = state.credentials.mint_v2_download(
        &query.user_id,
        download_type,
        ttl,
        query.filename.as_deref(),
        query.rel.as_deref(),
        query.course_id.as_deref(),
        query.module_id.as_deref(),
        require_filename,
    )?;

    let mut response = TokenResponse::plain(token, ttl);

    if let Some(filename) = &claims.filename {
        response.download_url = Some(build_download_url(&state, download_type, &claims, filename));
    } else {
        response.download_base_url = Some(build_download_base_url(&state, download_type, &claims));
        if download_type == DownloadType::Lesson {
            if let Some(rel) = &claims.rel {
                response.extension = sole_file_extension(&state, rel).await;
            }
        }
    }

    Ok(Json(response))
}

fn build_download_url(state: &AppState, download_type: DownloadType, claims: &lessonvault_core::Claims, filename: &str) -> String {
    let host = &state.config.storage.public_host;
    match download_type {
        DownloadType::Lesson => format!("https://{host}/download2/{}/{filename}", claims.rel.as_deref().unwrap_or_default()),
        DownloadType::Course => format!(
            "https://{host}/download2/course/{}/{filename}",
            claims.course_id.as_deref().unwrap_or_default()
        ),
        DownloadType::Module => format!(
            "https://{host}/download2/module/{}/{}/{filename}",
            claims.course_id.as_deref().unwrap_or_default(),
            claims.module_id.as_deref().unwrap_or_default(),
        ),
    }
}

fn build_download_base_url(state: &AppState, download_type: DownloadType, claims: &lessonvault_core::Claims) -> String {
    let host = &state.config.storage.public_host;
    match download_type {
        DownloadType::Lesson => format!("https://{host}/download2/{}", claims.rel.as_deref().unwrap_or_default()),
        DownloadType::Course => format!(
            "https://{host}/download2/course/{}",
            claims.course_id.as_deref().unwrap_or_default()
        ),
        DownloadType::Module => format!(
            "https://{host}/download2/module/{}/{}",
            claims.course_id.as_deref().unwrap_or_default(),
            claims.module_id.as_deref().unwrap_or_default(),
        ),
    }
}

/// If `originals/<rel>` contains exactly one file, return its lowercased
/// extension with a leading dot, per spec §4.A.
async fn sole_file_extension(state: &AppState, rel: &str) -> Option<String> {
    let segments = storage::parse_rel(rel).ok()?;
    let dir = state.storage.v2_original_dir(&segments);

    let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
    let mut sole: Option<std::path::PathBuf> = None;
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        count += 1;
        if count > 1 {
            return None;
        }
        sole = Some(entry.path());
    }

    sole.and_then(|path| path.extension().map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase())))
}
