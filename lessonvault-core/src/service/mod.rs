pub mod authz;
pub mod credential;
pub mod transcode;

pub use authz::{Audience, AuthorizationGate, RouteIdentifiers};
pub use credential::{Claims, CredentialService, DownloadType, Platform};
pub use transcode::{JobSpec, JobStatus, TranscodeOrchestrator};
