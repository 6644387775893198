//! Shared file-serving helper.
//!
//! Every response that returns stored bytes carries the same
//! no-store/no-cache triad (spec §3 invariant iv); only `originals/`
//! content carries `Content-Disposition: attachment` (invariant iii).

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio_util::io::ReaderStream;

use lessonvault_core::Error;

pub async fn serve_file(path: &std::path::Path, content_type: &str, attachment_name: Option<&str>) -> Result<Response, Error> {
    let file = tokio::fs::File::open(path).await.map_err(Error::from)?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0");

    response = match attachment_name {
        Some(name) => response.header(header::CONTENT_DISPOSITION, content_disposition(name)),
        None => response,
    };

    response
        .body(body)
        .map_err(|e| Error::Internal(format!("failed to build file response: {e}")))
}

/// `filename` carries an ASCII fallback plus an RFC 5987 `filename*` for
/// clients that honor it, since stored names may contain non-ASCII text.
fn content_disposition(name: &str) -> HeaderValue {
    let ascii_fallback: String = name.chars().map(|c| if c.is_ascii() && c != '"' { c } else { '_' }).collect();
    let encoded = utf8_percent_encode(name, NON_ALPHANUMERIC);
    let value = format!("attachment; filename=\"{ascii_fallback}\"; filename*=UTF-8''{encoded}");
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub fn m3u8_response(text: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-mpegURL"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        text,
    )
        .into_response()
}
