//! Per-audience authorization gate.
//!
//! Reformulates the teacher's `AuthUser` extractor
//! (`synctv-api/src/http/middleware.rs`) — which verifies a bearer token
//! and hands back a typed identity — into a gate that also checks that
//! the verified claims are *bound* to the exact resource named by the
//! route. Three audiences (web, mobile, download) share one verification
//! step and diverge only in which bindings and which headers they check.

use tracing::warn;

use crate::error::{Error, Result};
use crate::service::credential::{Claims, CredentialService, DownloadType, Platform};

/// Which audience policy a route enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Web,
    Mobile,
    Download,
}

/// The identifiers a route names, gathered from the URL path and query
/// string. Fields the route doesn't name are left `None`; the gate
/// treats an absent route identifier as vacuously satisfied.
#[derive(Debug, Clone, Default)]
pub struct RouteIdentifiers {
    pub user_id: Option<String>,
    pub filename: Option<String>,
    pub video_id: Option<String>,
    pub rel: Option<String>,
    pub download_type: Option<DownloadType>,
    pub course_id: Option<String>,
    pub module_id: Option<String>,
}

/// A route identifier matches its claim only when both are present; an
/// absent claim (the mint operation never set it) makes the check
/// vacuous, per spec's web/mobile binding rule.
fn binding_matches<T: PartialEq>(route: Option<&T>, claim: Option<&T>) -> bool {
    match (route, claim) {
        (Some(r), Some(c)) => r == c,
        _ => true,
    }
}

/// Checks `user_id`, `filename`, `rel` bindings shared by the web and
/// mobile policies.
fn web_like_bindings_hold(claims: &Claims, route: &RouteIdentifiers) -> bool {
    binding_matches(route.user_id.as_ref(), Some(&claims.user_id))
        && binding_matches(route.filename.as_ref(), claims.filename.as_ref())
        && binding_matches(route.rel.as_ref(), claims.rel.as_ref())
}

/// Evaluates the three audience policies against verified claims. Holds
/// no state of its own beyond the credential service and configuration
/// flags it is constructed with.
#[derive(Clone)]
pub struct AuthorizationGate {
    credentials: CredentialService,
    require_filename_for_download: bool,
    allowed_origins: Vec<String>,
}

impl AuthorizationGate {
    #[must_use]
    pub fn new(credentials: CredentialService, require_filename_for_download: bool, allowed_origins: Vec<String>) -> Self {
        Self {
            credentials,
            require_filename_for_download,
            allowed_origins,
        }
    }

    fn referrer_allowed(&self, referrer: &str) -> bool {
        self.allowed_origins.iter().any(|origin| referrer.starts_with(origin.as_str()))
    }

    /// Verify a presented credential, then check it is bound to `identifiers`
    /// under `audience`'s policy. Returns the verified claims on success.
    /// Every rejection path logs its specific cause and returns a generic
    /// 403-mapped error to the caller, per spec §4.C / §7.
    pub fn authorize(
        &self,
        audience: Audience,
        presented: Option<&str>,
        referrer: Option<&str>,
        identifiers: &RouteIdentifiers,
    ) -> Result<Claims> {
        let Some(token) = presented else {
            return Err(Error::MissingCredential("no credential presented".to_string()));
        };

        let claims = self.credentials.verify(token)?;

        match audience {
            Audience::Web => self.authorize_web(&claims, referrer, identifiers)?,
            Audience::Mobile => self.authorize_mobile(&claims, identifiers)?,
            Audience::Download => self.authorize_download(&claims, identifiers)?,
        }

        Ok(claims)
    }

    fn authorize_web(&self, claims: &Claims, referrer: Option<&str>, route: &RouteIdentifiers) -> Result<()> {
        if claims.platform == Platform::Mobile {
            warn!(jti = %claims.jti, "web gate rejected a mobile-scoped credential");
            return Err(Error::Unauthorized("audience mismatch".to_string()));
        }
        if !web_like_bindings_hold(claims, route) {
            warn!(jti = %claims.jti, "web gate rejected a credential with mismatched resource binding");
            return Err(Error::Unauthorized("binding mismatch".to_string()));
        }
        match referrer {
            Some(r) if self.referrer_allowed(r) => Ok(()),
            Some(r) => {
                warn!(jti = %claims.jti, referrer = r, "web gate rejected an unrecognized referrer");
                Err(Error::Unauthorized("referrer not allowed".to_string()))
            }
            None => {
                warn!(jti = %claims.jti, "web gate rejected a request with no referrer");
                Err(Error::Unauthorized("referrer required".to_string()))
            }
        }
    }

    fn authorize_mobile(&self, claims: &Claims, route: &RouteIdentifiers) -> Result<()> {
        if claims.platform != Platform::Mobile {
            warn!(jti = %claims.jti, "mobile gate rejected a non-mobile-scoped credential");
            return Err(Error::Unauthorized("audience mismatch".to_string()));
        }
        if !web_like_bindings_hold(claims, route) || !binding_matches(route.video_id.as_ref(), claims.video_id.as_ref()) {
            warn!(jti = %claims.jti, "mobile gate rejected a credential with mismatched resource binding");
            return Err(Error::Unauthorized("binding mismatch".to_string()));
        }
        Ok(())
    }

    fn authorize_download(&self, claims: &Claims, route: &RouteIdentifiers) -> Result<()> {
        let is_download_audience = claims.action.as_deref() == Some("download") || claims.platform == Platform::Download;
        if !is_download_audience {
            warn!(jti = %claims.jti, "download gate rejected a credential with no download marker");
            return Err(Error::Unauthorized("audience mismatch".to_string()));
        }

        if route.user_id.as_deref().is_some_and(|u| u != claims.user_id) {
            warn!(jti = %claims.jti, "download gate rejected a credential with mismatched user_id");
            return Err(Error::Unauthorized("binding mismatch".to_string()));
        }
        if self.require_filename_for_download && !binding_matches(route.filename.as_ref(), claims.filename.as_ref()) {
            warn!(jti = %claims.jti, "download gate rejected a credential with mismatched filename");
            return Err(Error::Unauthorized("binding mismatch".to_string()));
        }
        if !binding_matches(route.rel.as_ref(), claims.rel.as_ref())
            || !binding_matches(route.download_type.as_ref(), claims.download_type.as_ref())
            || !binding_matches(route.course_id.as_ref(), claims.course_id.as_ref())
            || !binding_matches(route.module_id.as_ref(), claims.module_id.as_ref())
        {
            warn!(jti = %claims.jti, "download gate rejected a credential with mismatched hierarchical binding");
            return Err(Error::Unauthorized("binding mismatch".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(require_filename: bool) -> AuthorizationGate {
        AuthorizationGate::new(
            CredentialService::new("test-secret"),
            require_filename,
            vec!["https://focustagency.com".to_string()],
        )
    }

    #[test]
    fn web_route_requires_matching_referrer() {
        let g = gate(false);
        let (token, _) = g.credentials.mint_web("u1", "lesson.mp4", 3600).unwrap();
        let route = RouteIdentifiers {
            user_id: Some("u1".to_string()),
            filename: Some("lesson.mp4".to_string()),
            ..Default::default()
        };
        assert!(g
            .authorize(Audience::Web, Some(&token), Some("https://focustagency.com/x"), &route)
            .is_ok());
        assert!(g.authorize(Audience::Web, Some(&token), None, &route).is_err());
        assert!(g
            .authorize(Audience::Web, Some(&token), Some("https://evil.example.com"), &route)
            .is_err());
    }

    #[test]
    fn web_route_rejects_mismatched_filename() {
        let g = gate(false);
        let (token, _) = g.credentials.mint_web("u1", "a.mp4", 3600).unwrap();
        let route = RouteIdentifiers {
            user_id: Some("u1".to_string()),
            filename: Some("b.mp4".to_string()),
            ..Default::default()
        };
        assert!(g
            .authorize(Audience::Web, Some(&token), Some("https://focustagency.com/x"), &route)
            .is_err());
    }

    #[test]
    fn mobile_credential_rejected_by_web_gate() {
        let g = gate(false);
        let (token, _) = g.credentials.mint_mobile("u1", "a.mp4", "v1", 3600).unwrap();
        let route = RouteIdentifiers {
            user_id: Some("u1".to_string()),
            ..Default::default()
        };
        assert!(g
            .authorize(Audience::Web, Some(&token), Some("https://focustagency.com/x"), &route)
            .is_err());
    }

    #[test]
    fn mobile_gate_needs_no_referrer_but_checks_video_id() {
        let g = gate(false);
        let (token, _) = g.credentials.mint_mobile("u1", "a.mp4", "v1", 3600).unwrap();
        let good_route = RouteIdentifiers {
            user_id: Some("u1".to_string()),
            video_id: Some("v1".to_string()),
            ..Default::default()
        };
        assert!(g.authorize(Audience::Mobile, Some(&token), None, &good_route).is_ok());

        let bad_route = RouteIdentifiers {
            user_id: Some("u1".to_string()),
            video_id: Some("v2".to_string()),
            ..Default::default()
        };
        assert!(g.authorize(Audience::Mobile, Some(&token), None, &bad_route).is_err());
    }

    #[test]
    fn download_gate_ignores_filename_unless_flag_set() {
        let g = gate(false);
        let (token, _) = g.credentials.mint_download_v1("u1", "a.mp4", 900).unwrap();
        let route = RouteIdentifiers {
            user_id: Some("u1".to_string()),
            filename: Some("different.mp4".to_string()),
            ..Default::default()
        };
        assert!(g.authorize(Audience::Download, Some(&token), None, &route).is_ok());

        let strict = gate(true);
        let (token2, _) = strict.credentials.mint_download_v1("u1", "a.mp4", 900).unwrap();
        assert!(strict.authorize(Audience::Download, Some(&token2), None, &route).is_err());
    }

    #[test]
    fn download_gate_enforces_user_id_binding() {
        let g = gate(false);
        let (token, _) = g.credentials.mint_download_v1("u1", "a.mp4", 900).unwrap();
        let route = RouteIdentifiers {
            user_id: Some("someone-else".to_string()),
            ..Default::default()
        };
        assert!(g.authorize(Audience::Download, Some(&token), None, &route).is_err());
    }

    #[test]
    fn missing_credential_is_rejected_before_verification() {
        let g = gate(false);
        assert!(g.authorize(Audience::Web, None, Some("https://focustagency.com"), &RouteIdentifiers::default()).is_err());
    }
}
