pub mod config;
pub mod error;
pub mod logging;
pub mod playlist;
pub mod service;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use service::{Audience, AuthorizationGate, Claims, CredentialService, RouteIdentifiers, TranscodeOrchestrator};
pub use storage::StorageLayout;
