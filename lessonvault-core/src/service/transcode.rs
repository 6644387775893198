//! Asynchronous transcode orchestrator.
//!
//! An in-process FIFO job queue (`tokio::sync::mpsc`) fronting a pool of
//! `tokio::spawn`-ed workers bounded by a `Semaphore`, each shelling out
//! to an external `ffmpeg` via `tokio::process::Command`
//! (ported from the builder shape in `sceneforged-av`'s `ToolCommand`)
//! and firing a best-effort callback through `reqwest`. The external
//! task-queue broker the spec assumes is out of scope; this in-process
//! queue plays its role for a single running instance, in the spirit of
//! the teacher's `AuditPartitionManager::start_auto_management`
//! background-task pattern (`synctv-core/src/service/audit_partition_manager.rs`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{CallbackConfig, TranscodeConfig};
use crate::error::{Error, Result};
use crate::storage::StorageLayout;

/// Status of a submitted job, tracked only in memory for the lifetime of
/// the process; there is no persistence or revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Parameters for one transcode job, as accepted by [`TranscodeOrchestrator::enqueue`].
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub task_id: String,
    pub source_path: PathBuf,
    pub hls_dir: PathBuf,
    pub success_url: String,
    pub error_url: String,
    pub user_id: Option<String>,
    pub video_id: Option<String>,
    pub key: Option<[u8; 16]>,
    pub key_url: Option<String>,
    /// Opaque passthrough fields mirrored into both callback payloads,
    /// and used to derive `hls_path` for v2 jobs (`rel`).
    pub context: Option<serde_json::Value>,
    pub rel: Option<String>,
    pub public_host: String,
}

#[derive(Serialize)]
struct CallbackPayload<'a> {
    status: &'a str,
    user_id: Option<&'a str>,
    video_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hls_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a serde_json::Value>,
}

/// Submits jobs onto a FIFO channel and runs a bounded pool of workers
/// that execute them against the real filesystem and `ffmpeg` binary.
#[derive(Clone)]
pub struct TranscodeOrchestrator {
    sender: mpsc::UnboundedSender<JobSpec>,
    statuses: Arc<DashMap<String, JobStatus>>,
}

impl TranscodeOrchestrator {
    /// Spawn `max_concurrent_jobs` workers consuming a shared FIFO queue.
    #[must_use]
    pub fn spawn(storage: StorageLayout, transcode: TranscodeConfig, callback: CallbackConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<JobSpec>();
        let receiver = Arc::new(Mutex::new(receiver));
        let statuses: Arc<DashMap<String, JobStatus>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(transcode.max_concurrent_jobs));
        let storage = Arc::new(storage);
        let transcode = Arc::new(transcode);
        let callback = Arc::new(callback);

        for worker_id in 0..transcode.max_concurrent_jobs {
            let receiver = receiver.clone();
            let statuses = statuses.clone();
            let semaphore = semaphore.clone();
            let storage = storage.clone();
            let transcode = transcode.clone();
            let callback = callback.clone();

            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        info!(worker_id, "transcode worker channel closed, shutting down");
                        break;
                    };

                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    statuses.insert(job.task_id.clone(), JobStatus::Running);
                    let task_id = job.task_id.clone();

                    match run_job(&job, &storage, &transcode, &callback).await {
                        Ok(()) => {
                            statuses.insert(task_id, JobStatus::Succeeded);
                        }
                        Err(e) => {
                            error!(task_id = %job.task_id, error = %e, "transcode job failed");
                            statuses.insert(task_id, JobStatus::Failed);
                        }
                    }
                }
            });
        }

        Self { sender, statuses }
    }

    /// Enqueue a job; returns immediately with a `task_id`. At-least-once
    /// delivery is assumed by the queue this stands in for; steps are
    /// written to tolerate being re-run.
    pub fn enqueue(&self, mut spec: JobSpec) -> Result<String> {
        if spec.task_id.is_empty() {
            spec.task_id = Uuid::new_v4().to_string();
        }
        let task_id = spec.task_id.clone();
        self.statuses.insert(task_id.clone(), JobStatus::Queued);
        self.sender
            .send(spec)
            .map_err(|_| Error::Internal("transcode queue is closed".to_string()))?;
        Ok(task_id)
    }

    #[must_use]
    pub fn status(&self, task_id: &str) -> Option<JobStatus> {
        self.statuses.get(task_id).map(|entry| entry.clone())
    }
}

/// Executes one job end to end: key material, key-info file, the
/// external `ffmpeg` invocation, then a best-effort callback.
async fn run_job(
    job: &JobSpec,
    storage: &StorageLayout,
    transcode: &TranscodeConfig,
    callback: &CallbackConfig,
) -> Result<()> {
    crate::storage::ensure_dir(&job.hls_dir).await?;

    let key_path = job.hls_dir.join("enc.key");
    let key_bytes = match job.key {
        Some(k) => k,
        None => {
            let mut k = [0u8; 16];
            rand::rng().fill_bytes(&mut k);
            k
        }
    };
    tokio::fs::write(&key_path, key_bytes).await?;

    let key_url = job.key_url.clone().unwrap_or_else(|| resolve_key_url(job, storage));
    write_keyinfo(&job.hls_dir, &key_url, &key_path).await?;

    let playlist_path = job.hls_dir.join("output.m3u8");
    let invoke_result = invoke_ffmpeg(job, transcode, &playlist_path).await;

    match invoke_result {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(&job.source_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %job.source_path.display(), error = %e, "failed to remove source after successful transcode");
                }
            }
            let hls_path = derive_hls_path(job, storage);
            deliver_callback(callback, &job.success_url, &CallbackPayload {
                status: "success",
                user_id: job.user_id.as_deref(),
                video_id: job.video_id.as_deref(),
                hls_path: Some(hls_path),
                error: None,
                message: "transcode completed successfully",
                context: job.context.as_ref(),
            })
            .await;
            Ok(())
        }
        Err(e) => {
            deliver_callback(callback, &job.error_url, &CallbackPayload {
                status: "error",
                user_id: job.user_id.as_deref(),
                video_id: job.video_id.as_deref(),
                hls_path: None,
                error: Some(&e.to_string()),
                message: "transcode failed",
                context: job.context.as_ref(),
            })
            .await;
            Err(e)
        }
    }
}

/// `key_url`, when not supplied by the caller: `https://<host>/hls2/<rel>/key`
/// for a v2 job, `https://<host>/<user_id>/<video_id>/key` otherwise.
fn resolve_key_url(job: &JobSpec, storage: &StorageLayout) -> String {
    if storage.is_v2_hls_dir(&job.hls_dir) {
        if let Some(rel) = &job.rel {
            return format!("https://{}/hls2/{}/key", job.public_host, rel);
        }
    }
    format!(
        "https://{}/{}/{}/key",
        job.public_host,
        job.user_id.as_deref().unwrap_or_default(),
        job.video_id.as_deref().unwrap_or_default(),
    )
}

fn derive_hls_path(job: &JobSpec, storage: &StorageLayout) -> String {
    if storage.is_v2_hls_dir(&job.hls_dir) {
        if let Some(rel) = &job.rel {
            return format!("/hls2/{rel}/output.m3u8");
        }
    }
    format!(
        "/hls/{}/{}/output.m3u8",
        job.user_id.as_deref().unwrap_or_default(),
        job.video_id.as_deref().unwrap_or_default(),
    )
}

/// Line 1: the public key URL. Line 2: the absolute local key path, per
/// the spec's correction of the source's inconsistent (sometimes
/// relative) path.
async fn write_keyinfo(hls_dir: &Path, key_url: &str, key_path: &Path) -> Result<()> {
    let absolute_key_path = if key_path.is_absolute() {
        key_path.to_path_buf()
    } else {
        std::env::current_dir()?.join(key_path)
    };
    let contents = format!("{}\n{}\n", key_url, absolute_key_path.display());
    tokio::fs::write(hls_dir.join("enc.keyinfo"), contents).await?;
    Ok(())
}

async fn invoke_ffmpeg(job: &JobSpec, transcode: &TranscodeConfig, playlist_path: &Path) -> Result<()> {
    let keyinfo_path = job.hls_dir.join("enc.keyinfo");
    let segment_template = job.hls_dir.join("segment_%03d.ts");

    let output = Command::new(&transcode.ffmpeg_path)
        .arg("-y")
        .arg("-i")
        .arg(&job.source_path)
        .arg("-c:v")
        .arg("libx264")
        .arg("-c:a")
        .arg("aac")
        .arg("-hls_time")
        .arg(transcode.segment_seconds.to_string())
        .arg("-hls_list_size")
        .arg("0")
        .arg("-hls_key_info_file")
        .arg(&keyinfo_path)
        .arg("-hls_segment_filename")
        .arg(&segment_template)
        .arg(playlist_path)
        .output()
        .await
        .map_err(|e| Error::TranscodeFailed(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        return Err(Error::TranscodeFailed(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

async fn deliver_callback(callback: &CallbackConfig, url: &str, payload: &CallbackPayload<'_>) {
    let client = reqwest::Client::new();
    let mut request = client
        .post(url)
        .timeout(Duration::from_secs(callback.timeout_seconds))
        .json(payload);

    if let Some(bearer) = &callback.bearer {
        request = request.bearer_auth(bearer);
    }

    if let Err(e) = request.send().await {
        warn!(url, error = %e, "callback delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    #[test]
    fn resolve_key_url_prefers_v2_layout() {
        let storage = StorageLayout::new(&StorageConfig::default());
        let rel = crate::storage::parse_rel("t1/c1/m1/l1").unwrap();
        let job = JobSpec {
            task_id: "t".to_string(),
            source_path: PathBuf::from("uploads/t1/c1/m1/l1/l1_lesson.mp4"),
            hls_dir: storage.v2_hls_dir(&rel),
            success_url: String::new(),
            error_url: String::new(),
            user_id: None,
            video_id: None,
            key: None,
            key_url: None,
            context: None,
            rel: Some(crate::storage::rel_to_string(&rel)),
            public_host: "host".to_string(),
        };
        assert_eq!(resolve_key_url(&job, &storage), "https://host/hls2/t1/c1/m1/l1/key");
    }

    #[test]
    fn resolve_key_url_falls_back_to_v1_layout() {
        let storage = StorageLayout::new(&StorageConfig::default());
        let job = JobSpec {
            task_id: "t".to_string(),
            source_path: PathBuf::from("uploads/u1/v1.mp4"),
            hls_dir: storage.v1_hls_dir("u1", "v1"),
            success_url: String::new(),
            error_url: String::new(),
            user_id: Some("u1".to_string()),
            video_id: Some("v1".to_string()),
            key: None,
            key_url: None,
            context: None,
            rel: None,
            public_host: "host".to_string(),
        };
        assert_eq!(resolve_key_url(&job, &storage), "https://host/u1/v1/key");
    }

    #[tokio::test]
    async fn write_keyinfo_emits_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("enc.key");
        tokio::fs::write(&key_path, [0u8; 16]).await.unwrap();

        write_keyinfo(dir.path(), "https://host/hls/u1/v1/key", &key_path)
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(dir.path().join("enc.keyinfo")).await.unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "https://host/hls/u1/v1/key");
        let path_line = lines.next().unwrap();
        assert!(Path::new(path_line).is_absolute());
    }
}
