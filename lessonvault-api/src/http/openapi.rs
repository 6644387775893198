//! OpenAPI document, exposed only in development mode (`http/mod.rs`).

use utoipa::OpenApi;

use super::handlers::{download, health, streaming, tokens};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        tokens::web_token,
        tokens::mobile_token,
        tokens::v2_playback_token,
        tokens::download_token_v1,
        tokens::download_token_v2,
        streaming::serve_original_v1,
        download::download_v1,
    ),
    components(schemas(tokens::TokenResponse)),
    tags(
        (name = "tokens", description = "Credential minting for playback and download"),
        (name = "streaming", description = "Gated HLS and original-file streaming"),
        (name = "download", description = "Attachment downloads"),
    )
)]
pub struct ApiDoc;
