//! Credential minting and verification.
//!
//! Stateless HMAC-SHA256 signed tokens carrying a claim set bound to
//! (audience, resource, action). Ported from the teacher's
//! `JwtService` (`synctv-core/src/service/auth/jwt.rs`) shape, but using
//! a single symmetric secret (HS256) as spec'd rather than the teacher's
//! RS256 keypair, and a richer, mostly-optional claim set.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Audience selector embedded in every credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Mobile,
    Download,
}

/// Which v2 download route a credential permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadType {
    Lesson,
    Course,
    Module,
}

/// The full claim set. Fields not relevant to a given mint operation are
/// omitted from the serialized token entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub download_type: Option<DownloadType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

fn envelope(ttl_seconds: i64) -> (i64, i64, String) {
    let now = Utc::now().timestamp();
    (now, now + ttl_seconds, Uuid::new_v4().to_string())
}

/// Stateless mint/verify service over a single process-wide HMAC secret.
#[derive(Clone)]
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl CredentialService {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("failed to sign credential: {e}")))
    }

    /// `verify(credential) -> claims | Invalid`. Does not enforce binding;
    /// that is the authorization gate's job.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| Error::Unauthorized("invalid or expired credential".to_string()))
    }

    pub fn mint_web(&self, user_id: &str, filename: &str, ttl_seconds: i64) -> Result<(String, Claims)> {
        let (iat, exp, jti) = envelope(ttl_seconds);
        let claims = Claims {
            user_id: user_id.to_string(),
            filename: Some(filename.to_string()),
            video_id: None,
            rel: None,
            download_type: None,
            course_id: None,
            module_id: None,
            platform: Platform::Web,
            action: None,
            iat,
            exp,
            jti,
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn mint_mobile(
        &self,
        user_id: &str,
        filename: &str,
        video_id: &str,
        ttl_seconds: i64,
    ) -> Result<(String, Claims)> {
        let (iat, exp, jti) = envelope(ttl_seconds);
        let claims = Claims {
            user_id: user_id.to_string(),
            filename: Some(filename.to_string()),
            video_id: Some(video_id.to_string()),
            rel: None,
            download_type: None,
            course_id: None,
            module_id: None,
            platform: Platform::Mobile,
            action: None,
            iat,
            exp,
            jti,
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn mint_download_v1(&self, user_id: &str, filename: &str, ttl_seconds: i64) -> Result<(String, Claims)> {
        let (iat, exp, jti) = envelope(ttl_seconds);
        let claims = Claims {
            user_id: user_id.to_string(),
            filename: Some(filename.to_string()),
            video_id: None,
            rel: None,
            download_type: None,
            course_id: None,
            module_id: None,
            platform: Platform::Download,
            action: Some("download".to_string()),
            iat,
            exp,
            jti,
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// `mint_v2_playback`: `platform` must be `web` or `mobile`.
    pub fn mint_v2_playback(
        &self,
        user_id: &str,
        rel: &str,
        platform: Platform,
        ttl_seconds: i64,
    ) -> Result<(String, Claims)> {
        if platform == Platform::Download {
            return Err(Error::BadRequest(
                "mint_v2_playback accepts only web or mobile platforms".to_string(),
            ));
        }
        let (iat, exp, jti) = envelope(ttl_seconds);
        let claims = Claims {
            user_id: user_id.to_string(),
            filename: None,
            video_id: None,
            rel: Some(rel.to_string()),
            download_type: None,
            course_id: None,
            module_id: None,
            platform,
            action: None,
            iat,
            exp,
            jti,
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// `mint_v2_download`. Enforces the required-field matrix from spec §4.A:
    ///
    /// | type    | required           |
    /// |---------|--------------------|
    /// | lesson  | `rel`              |
    /// | course  | `course_id`        |
    /// | module  | `course_id`, `module_id` |
    ///
    /// `filename` is optional unless `require_filename` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn mint_v2_download(
        &self,
        user_id: &str,
        download_type: DownloadType,
        ttl_seconds: i64,
        filename: Option<&str>,
        rel: Option<&str>,
        course_id: Option<&str>,
        module_id: Option<&str>,
        require_filename: bool,
    ) -> Result<(String, Claims)> {
        match download_type {
            DownloadType::Lesson => {
                if rel.is_none() {
                    return Err(Error::BadRequest("rel is required for type=lesson".to_string()));
                }
            }
            DownloadType::Course => {
                if course_id.is_none() {
                    return Err(Error::BadRequest("course_id is required for type=course".to_string()));
                }
            }
            DownloadType::Module => {
                if course_id.is_none() || module_id.is_none() {
                    return Err(Error::BadRequest(
                        "course_id and module_id are required for type=module".to_string(),
                    ));
                }
            }
        }
        if require_filename && filename.is_none() {
            return Err(Error::BadRequest("filename is required".to_string()));
        }

        let (iat, exp, jti) = envelope(ttl_seconds);
        let claims = Claims {
            user_id: user_id.to_string(),
            filename: filename.map(str::to_string),
            video_id: None,
            rel: rel.map(str::to_string),
            download_type: Some(download_type),
            course_id: course_id.map(str::to_string),
            module_id: module_id.map(str::to_string),
            platform: Platform::Download,
            action: Some("download".to_string()),
            iat,
            exp,
            jti,
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CredentialService {
        CredentialService::new("test-secret")
    }

    #[test]
    fn web_credential_round_trips() {
        let svc = service();
        let (token, minted) = svc.mint_web("u1", "lesson.mp4", 3600).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.filename.as_deref(), Some("lesson.mp4"));
        assert_eq!(claims.platform, Platform::Web);
        assert_eq!(claims.jti, minted.jti);
        assert!(claims.video_id.is_none());
    }

    #[test]
    fn mobile_credential_carries_video_id() {
        let svc = service();
        let (token, _) = svc.mint_mobile("u1", "lesson.mp4", "v1", 3600).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.platform, Platform::Mobile);
        assert_eq!(claims.video_id.as_deref(), Some("v1"));
    }

    #[test]
    fn download_v1_credential_sets_action_and_platform() {
        let svc = service();
        let (token, _) = svc.mint_download_v1("u1", "lesson.mp4", 900).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.action.as_deref(), Some("download"));
        assert_eq!(claims.platform, Platform::Download);
    }

    #[test]
    fn v2_playback_rejects_download_platform() {
        let svc = service();
        let err = svc
            .mint_v2_playback("u1", "t/c/m/l", Platform::Download, 3600)
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn v2_download_matrix_enforced() {
        let svc = service();
        assert!(svc
            .mint_v2_download("u1", DownloadType::Lesson, 900, None, None, None, None, false)
            .is_err());
        assert!(svc
            .mint_v2_download("u1", DownloadType::Lesson, 900, None, Some("t/c/m/l"), None, None, false)
            .is_ok());
        assert!(svc
            .mint_v2_download("u1", DownloadType::Module, 900, None, None, Some("c1"), None, false)
            .is_err());
        assert!(svc
            .mint_v2_download("u1", DownloadType::Module, 900, None, None, Some("c1"), Some("m1"), false)
            .is_ok());
    }

    #[test]
    fn v2_download_require_filename_flag_enforced() {
        let svc = service();
        let err = svc
            .mint_v2_download("u1", DownloadType::Course, 900, None, None, Some("c1"), None, true)
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(svc
            .mint_v2_download("u1", DownloadType::Course, 900, Some("f.mp4"), None, Some("c1"), None, true)
            .is_ok());
    }

    #[test]
    fn expired_ttl_zero_fails_verification() {
        let svc = service();
        let (token, _) = svc.mint_web("u1", "lesson.mp4", 0).unwrap();
        std::thread::sleep(std::time::Duration::from_secs(1));
        assert!(svc.verify(&token).is_err());
    }

    #[test]
    fn tampered_token_fails_verification() {
        let svc = service();
        let (token, _) = svc.mint_web("u1", "lesson.mp4", 3600).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = "dGFtcGVyZWQ";
        let tampered = parts.join(".");
        assert!(svc.verify(&tampered).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let svc = service();
        assert!(svc.verify("not-a-token").is_err());
    }
}
