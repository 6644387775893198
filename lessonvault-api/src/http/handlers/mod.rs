pub mod download;
pub mod health;
pub mod streaming;
pub mod tokens;
pub mod upload;
