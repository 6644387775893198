//! Credential and referrer extraction shared by every gated handler.
//!
//! A credential is accepted either as `Authorization: Bearer <token>` or
//! as a `?token=` query parameter; both forms are checked by every
//! gated route per spec §6.

use axum::http::HeaderMap;

#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[must_use]
pub fn presented_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    bearer_token(headers).or_else(|| query_token.map(str::to_string))
}

#[must_use]
pub fn referrer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_strips_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn presented_token_falls_back_to_query() {
        let headers = HeaderMap::new();
        assert_eq!(presented_token(&headers, Some("qtok")).as_deref(), Some("qtok"));
    }

    #[test]
    fn presented_token_prefers_header_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer htok"));
        assert_eq!(presented_token(&headers, Some("qtok")).as_deref(), Some("htok"));
    }
}
