//! Gated streaming endpoints: originals, HLS (v1 and v2), web and mobile
//! audiences. Every route here passes through [`AuthorizationGate`]
//! before any bytes are read from disk.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::path::PathBuf;

use lessonvault_core::service::{Audience, RouteIdentifiers};
use lessonvault_core::{storage, Error};

use crate::http::error::AppResult;
use crate::http::extract::{presented_token, referrer};
use crate::http::files;
use crate::http::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos-user/{user_id}/{filename}", get(serve_original_v1))
        .route("/hls/{user_id}/{video_id}/{file}", get(hls_v1_web))
        .route("/mobile/hls/{user_id}/{video_id}/{file}", get(hls_v1_mobile))
        .route("/hls2/{trainer}/{course}/{module}/{lesson}/{file}", get(hls_v2_web))
        .route("/mobile/hls2/{trainer}/{course}/{module}/{lesson}/{file}", get(hls_v2_mobile))
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/videos-user/{user_id}/{filename}",
    params(("user_id" = String, Path), ("filename" = String, Path), ("token" = Option<String>, Query)),
    responses(
        (status = 200, description = "Original upload, inline"),
        (status = 403, description = "Credential missing, expired, or not bound to this resource"),
    )
)]
pub(crate) async fn serve_original_v1(
    State(state): State<AppState>,
    Path((user_id, filename)): Path<(String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let ref_header = referrer(&headers);
    let route = RouteIdentifiers {
        user_id: Some(user_id.clone()),
        filename: Some(filename.clone()),
        ..Default::default()
    };
    state.gate.authorize(Audience::Web, token.as_deref(), ref_header.as_deref(), &route)?;

    let path = state.storage.v1_upload_path(&user_id, &filename);
    let content_type = content_type_for(&filename);
    Ok(files::serve_file(&path, content_type, None).await?)
}

async fn hls_v1_web(
    State(state): State<AppState>,
    Path((user_id, video_id, file)): Path<(String, String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let ref_header = referrer(&headers);
    let route = RouteIdentifiers {
        user_id: Some(user_id.clone()),
        ..Default::default()
    };
    let hls_dir = state.storage.v1_hls_dir(&user_id, &video_id);
    serve_hls_file(&state, Audience::Web, hls_dir, route, &file, token, ref_header, None).await
}

async fn hls_v1_mobile(
    State(state): State<AppState>,
    Path((user_id, video_id, file)): Path<(String, String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let route = RouteIdentifiers {
        user_id: Some(user_id.clone()),
        video_id: Some(video_id.clone()),
        ..Default::default()
    };
    let hls_dir = state.storage.v1_hls_dir(&user_id, &video_id);
    let base = format!("https://{}/mobile/hls/{}/{}", state.config.storage.public_host, user_id, video_id);
    serve_hls_file(&state, Audience::Mobile, hls_dir, route, &file, token, None, Some(base)).await
}

async fn hls_v2_web(
    State(state): State<AppState>,
    Path((trainer, course, module, lesson, file)): Path<(String, String, String, String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let ref_header = referrer(&headers);
    let rel = storage::parse_rel(&format!("{trainer}/{course}/{module}/{lesson}"))?;
    let rel_str = storage::rel_to_string(&rel);
    let route = RouteIdentifiers {
        rel: Some(rel_str),
        ..Default::default()
    };
    let hls_dir = state.storage.v2_hls_dir(&rel);
    serve_hls_file(&state, Audience::Web, hls_dir, route, &file, token, ref_header, None).await
}

async fn hls_v2_mobile(
    State(state): State<AppState>,
    Path((trainer, course, module, lesson, file)): Path<(String, String, String, String, String)>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = presented_token(&headers, q.token.as_deref());
    let rel = storage::parse_rel(&format!("{trainer}/{course}/{module}/{lesson}"))?;
    let rel_str = storage::rel_to_string(&rel);
    let route = RouteIdentifiers {
        rel: Some(rel_str.clone()),
        ..Default::default()
    };
    let hls_dir = state.storage.v2_hls_dir(&rel);
    let base = format!("https://{}/mobile/hls2/{}", state.config.storage.public_host, rel_str);
    serve_hls_file(&state, Audience::Mobile, hls_dir, route, &file, token, None, Some(base)).await
}

/// Shared core for the four HLS routes: gate, then dispatch on `file`
/// (`output.m3u8`, `key`, or a `.ts` segment). `rewrite_base`, when set,
/// marks a mobile route and triggers playlist rewriting.
#[allow(clippy::too_many_arguments)]
async fn serve_hls_file(
    state: &AppState,
    audience: Audience,
    hls_dir: PathBuf,
    route: RouteIdentifiers,
    file: &str,
    token: Option<String>,
    referrer: Option<String>,
    rewrite_base: Option<String>,
) -> AppResult<Response> {
    state.gate.authorize(audience, token.as_deref(), referrer.as_deref(), &route)?;
    let presented = token.unwrap_or_default();

    match file {
        "output.m3u8" => {
            let manifest_path = hls_dir.join("output.m3u8");
            let text = tokio::fs::read_to_string(&manifest_path).await.map_err(Error::from)?;
            let out = match rewrite_base {
                Some(base) => lessonvault_core::playlist::rewrite_for_mobile(&text, &base, &presented),
                None => text,
            };
            Ok(files::m3u8_response(out))
        }
        "key" => Ok(files::serve_file(&hls_dir.join("enc.key"), "application/octet-stream", None).await?),
        _ if file.ends_with(".ts") => Ok(files::serve_file(&hls_dir.join(storage::sanitize_segment(file)), "video/mp2t", None).await?),
        _ => Err(Error::NotFound(format!("unknown hls artifact: {file}")).into()),
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().unwrap_or("").to_lowercase().as_str() {
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        _ => "application/octet-stream",
    }
}
