use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{error::AppError, tokens::TokenService};

const MISSING_TOKEN: &str = "No token, authorization denied";

/// AuthAdmin
///
/// The resolved identity of an authenticated request: the admin id carried in a
/// verified session or access token. Handlers behind the gate take this as an
/// argument to learn who is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthAdmin {
    pub id: Uuid,
}

/// authorize
///
/// The gate decision on its own, with the clock passed in. The header is checked
/// before the token service is consulted, so a request with no credentials never
/// reaches signature verification.
pub fn authorize(
    headers: &HeaderMap,
    tokens: &TokenService,
    now: i64,
) -> Result<AuthAdmin, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_string()))?;

    let id = tokens.verify(token, now)?;
    Ok(AuthAdmin { id })
}

/// The credentials of a `Bearer` header value. The scheme name is matched
/// case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then_some(token.trim())
}

/// AuthAdmin Extractor Implementation
///
/// 1. Reuses the identity `require_admin` already stored in the request extensions.
/// 2. Otherwise pulls the `TokenService` out of the state and runs `authorize`.
///
/// Rejection: `AppError`, which renders as 401 with a JSON body.
impl<S> FromRequestParts<S> for AuthAdmin
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(admin) = parts.extensions.get::<AuthAdmin>() {
            return Ok(*admin);
        }

        let tokens = TokenService::from_ref(state);
        let admin = authorize(&parts.headers, &tokens, Utc::now().timestamp());
        if let Err(e) = &admin {
            tracing::debug!(error = %e, uri = %parts.uri, "request rejected by auth gate");
        }
        admin
    }
}

/// require_admin
///
/// Route layer for every protected router. The handler only runs once `AuthAdmin`
/// has resolved; the identity is then stashed in the extensions so the handler's
/// own `AuthAdmin` argument does not verify the token a second time.
pub async fn require_admin(admin: AuthAdmin, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(admin);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, tokens::TokenError};
    use axum::http::HeaderValue;
    use std::collections::HashMap;

    const T0: i64 = 1_700_000_000;

    fn tokens() -> TokenService {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgres://unused"),
            ("JWT_SECRET", "gate-test-access"),
            ("JWT_REFRESH_SECRET", "gate-test-refresh"),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        TokenService::new(&config)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = authorize(&HeaderMap::new(), &tokens(), T0).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == MISSING_TOKEN));
    }

    #[test]
    fn raw_token_without_bearer_scheme_is_unauthorized() {
        let service = tokens();
        let token = service.issue_session(Uuid::new_v4(), T0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&token).unwrap());

        assert!(matches!(
            authorize(&headers, &service, T0),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn scheme_name_is_case_insensitive() {
        let service = tokens();
        let admin = Uuid::new_v4();
        let token = service.issue_session(admin, T0).unwrap();

        for scheme in ["bearer", "BEARER", "BeArEr"] {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("{scheme} {token}")).unwrap(),
            );
            assert_eq!(authorize(&headers, &service, T0).unwrap().id, admin);
        }

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(authorize(&basic, &service, T0), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn valid_session_token_resolves_the_admin() {
        let service = tokens();
        let admin = Uuid::new_v4();
        let token = service.issue_session(admin, T0).unwrap();

        assert_eq!(authorize(&bearer(&token), &service, T0 + 60).unwrap(), AuthAdmin { id: admin });
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let service = tokens();
        let token = service.issue_access(Uuid::new_v4(), T0).unwrap();

        assert!(matches!(
            authorize(&bearer(&token), &service, T0 + 16 * 60),
            Err(AppError::Token(TokenError::Expired))
        ));
    }

    #[test]
    fn refresh_token_does_not_open_the_gate() {
        let service = tokens();
        let token = service.issue_refresh(Uuid::new_v4(), T0).unwrap();

        assert!(matches!(
            authorize(&bearer(&token), &service, T0),
            Err(AppError::Token(TokenError::Invalid))
        ));
    }
}
