use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
    session::{Session, SessionState},
};

/// Name of the cookie carrying the signed session reference.
pub const SESSION_COOKIE: &str = "ft_session";

/// Header accepted in `Env::Local` only: authenticates as the given SSN without a session.
pub const DEV_SSN_HEADER: &str = "x-user-ssn";

/// Claims
///
/// Payload of the signed session token. The token alone is not sufficient: `sid` must
/// still name a live session in the session store.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the SSN of the logged-in user.
    pub sub: String,
    /// Session id in the server-side store.
    pub sid: Uuid,
    pub role: Role,
    /// Expiration Time (exp), seconds since the epoch. Matches the session expiry.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers use `ssn` as the acting
/// identity and `role` for access control.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub ssn: String,
    pub role: Role,
    /// None when authenticated through the local development header.
    pub session_id: Option<Uuid>,
}

impl AuthUser {
    /// require
    ///
    /// Role gate used at the top of every role-specific handler.
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(ssn = %self.ssn, role = %self.role, "role not permitted");
            Err(ApiError::Forbidden)
        }
    }
}

/// issue_token
///
/// Signs the cookie token for a freshly created session.
pub fn issue_token(config: &AppConfig, session: &Session) -> Result<String, ApiError> {
    let claims = Claims {
        sub: session.ssn.clone(),
        sid: session.id,
        role: session.role,
        exp: session.expires_at.timestamp().max(0) as usize,
        iat: session.created_at.timestamp().max(0) as usize,
    };

    let key = EncodingKey::from_secret(config.session_secret.as_bytes());
    encode(&Header::default(), &claims, &key)
        .map_err(|e| ApiError::Internal(format!("Failed to sign session token: {}", e)))
}

/// session_cookie
///
/// HttpOnly cookie scoped to the whole site; `Secure` outside local development.
pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .max_age(time::Duration::minutes(config.session_ttl_minutes))
        .build()
}

/// The removal template for the session cookie; must match the issuing path.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn cookie_token(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. Local bypass: `x-user-ssn` naming a user with a role (only in `Env::Local`).
/// 2. Token: `Authorization: Bearer` header, else the session cookie.
/// 3. Token validation: signature and expiry.
/// 4. Session lookup: the referenced session must be live and belong to the token subject.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // 1. Local development bypass
        if config.env == Env::Local {
            if let Some(ssn) = parts
                .headers
                .get(DEV_SSN_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                let repo = RepositoryState::from_ref(state);
                match repo.resolve_role(ssn).await {
                    Ok(Some(role)) => {
                        return Ok(AuthUser {
                            ssn: ssn.to_string(),
                            role,
                            session_id: None,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("dev bypass role lookup failed: {}", e),
                }
            }
        }
        // Fall through to the regular session flow.

        // 2. Token extraction
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(ApiError::Unauthorized)?;

        // 3. Token validation
        let key = DecodingKey::from_secret(config.session_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = match decode::<Claims>(&token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                    other => tracing::debug!("session token rejected: {:?}", other),
                }
                return Err(ApiError::Unauthorized);
            }
        };

        // 4. Session lookup
        let sessions = SessionState::from_ref(state);
        let session = sessions
            .get(claims.sid)
            .await
            .ok_or(ApiError::Unauthorized)?;

        if session.ssn != claims.sub {
            tracing::warn!(session_id = %session.id, "token subject does not match session");
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser {
            ssn: session.ssn,
            role: session.role,
            session_id: Some(session.id),
        })
    }
}

/// Lets handlers take `Option<AuthUser>` where anonymous access is allowed.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(
            <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            ssn: "100".into(),
            role,
            session_id: None,
        }
    }

    #[test]
    fn test_require_allows_listed_role() {
        assert!(user(Role::Admin).require(&[Role::Admin]).is_ok());
        assert!(
            user(Role::Mentor)
                .require(&[Role::Mentor, Role::InternshipCoordinator])
                .is_ok()
        );
    }

    #[test]
    fn test_require_rejects_other_roles() {
        let err = user(Role::Student).require(&[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn test_session_cookie_flags() {
        let config = AppConfig::default();
        let cookie = session_cookie(&config, "token".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_ne!(cookie.secure(), Some(true));
    }
}
