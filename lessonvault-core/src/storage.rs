//! Deterministic path resolution across the four storage roots
//! (`uploads/`, `originals/`, `hls/`, `presentation_videos/`).
//!
//! Pure functions only, plus `tokio::fs::create_dir_all` on ingest paths.
//! Every path component derived from caller-supplied input passes
//! [`sanitize_segment`] first.

use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// Strip directory separators, NULs, and leading dots from a single path
/// component. Idempotent: re-applying to an already-sanitized string is
/// a no-op.
#[must_use]
pub fn sanitize_segment(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Split a `rel` string (`trainer/course/module/lesson`) into its four
/// segments, rejecting traversal sequences and absolute paths.
pub fn parse_rel(rel: &str) -> Result<[String; 4]> {
    if rel.starts_with('/') || rel.contains("..") {
        return Err(Error::BadRequest(format!("invalid rel path: {rel}")));
    }

    let parts: Vec<&str> = rel.split('/').collect();
    if parts.len() != 4 {
        return Err(Error::BadRequest(format!(
            "rel must have exactly 4 segments (trainer/course/module/lesson), got {}",
            parts.len()
        )));
    }

    let mut segments = [String::new(), String::new(), String::new(), String::new()];
    for (i, part) in parts.iter().enumerate() {
        let clean = sanitize_segment(part);
        if clean.is_empty() || clean != *part {
            return Err(Error::BadRequest(format!("invalid rel segment: {part}")));
        }
        segments[i] = clean;
    }

    Ok(segments)
}

/// Rejoin parsed `rel` segments into the canonical `/`-joined string.
#[must_use]
pub fn rel_to_string(segments: &[String; 4]) -> String {
    segments.join("/")
}

/// The canonical filename for a lesson's stored video: `<lesson_id>_lesson.<ext>`.
#[must_use]
pub fn lesson_filename(lesson_id: &str, ext: &str) -> String {
    format!("{}_lesson.{}", sanitize_segment(lesson_id), ext.to_lowercase())
}

#[derive(Clone)]
pub struct StorageLayout {
    pub uploads_root: PathBuf,
    pub originals_root: PathBuf,
    pub hls_root: PathBuf,
    pub presentations_root: PathBuf,
}

impl StorageLayout {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            uploads_root: PathBuf::from(&config.uploads_root),
            originals_root: PathBuf::from(&config.originals_root),
            hls_root: PathBuf::from(&config.hls_root),
            presentations_root: PathBuf::from(&config.presentations_root),
        }
    }

    // -- Legacy (v1): <root>/<user_id>/<video_id>/... --------------------

    #[must_use]
    pub fn v1_upload_dir(&self, user_id: &str) -> PathBuf {
        self.uploads_root.join(sanitize_segment(user_id))
    }

    #[must_use]
    pub fn v1_upload_path(&self, user_id: &str, filename: &str) -> PathBuf {
        self.v1_upload_dir(user_id).join(sanitize_segment(filename))
    }

    #[must_use]
    pub fn v1_original_dir(&self, user_id: &str) -> PathBuf {
        self.originals_root.join(sanitize_segment(user_id))
    }

    #[must_use]
    pub fn v1_original_path(&self, user_id: &str, filename: &str) -> PathBuf {
        self.v1_original_dir(user_id).join(sanitize_segment(filename))
    }

    #[must_use]
    pub fn v1_hls_dir(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.hls_root
            .join(sanitize_segment(user_id))
            .join(sanitize_segment(video_id))
    }

    // -- Hierarchical (v2): <root>/<trainer>/<course>/<module>/<lesson>/. --

    fn v2_dir(root: &Path, rel: &[String; 4]) -> PathBuf {
        root.join(&rel[0]).join(&rel[1]).join(&rel[2]).join(&rel[3])
    }

    #[must_use]
    pub fn v2_upload_dir(&self, rel: &[String; 4]) -> PathBuf {
        Self::v2_dir(&self.uploads_root, rel)
    }

    #[must_use]
    pub fn v2_original_dir(&self, rel: &[String; 4]) -> PathBuf {
        Self::v2_dir(&self.originals_root, rel)
    }

    #[must_use]
    pub fn v2_hls_dir(&self, rel: &[String; 4]) -> PathBuf {
        Self::v2_dir(&self.hls_root, rel)
    }

    // -- Presentation videos: outside both schemes, unencrypted. ----------

    #[must_use]
    pub fn presentation_course_path(&self, course_id: &str, ext: &str) -> PathBuf {
        self.presentations_root
            .join("courses")
            .join(sanitize_segment(course_id))
            .join(format!("presentation.{}", ext.to_lowercase()))
    }

    #[must_use]
    pub fn presentation_course_dir(&self, course_id: &str) -> PathBuf {
        self.presentations_root
            .join("courses")
            .join(sanitize_segment(course_id))
    }

    #[must_use]
    pub fn presentation_module_path(&self, course_id: &str, module_id: &str, ext: &str) -> PathBuf {
        self.presentations_root
            .join("modules")
            .join(sanitize_segment(course_id))
            .join(sanitize_segment(module_id))
            .join(format!("presentation.{}", ext.to_lowercase()))
    }

    #[must_use]
    pub fn presentation_module_dir(&self, course_id: &str, module_id: &str) -> PathBuf {
        self.presentations_root
            .join("modules")
            .join(sanitize_segment(course_id))
            .join(sanitize_segment(module_id))
    }

    /// The depth (beneath an `hls_root`) at which a directory is
    /// recognized as a v2 (hierarchical) layout: more than two path
    /// components means `trainer/course/module/lesson`.
    #[must_use]
    pub fn is_v2_hls_dir(&self, hls_dir: &Path) -> bool {
        hls_dir
            .strip_prefix(&self.hls_root)
            .map(|rel| rel.components().count() > 2)
            .unwrap_or(false)
    }
}

pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
