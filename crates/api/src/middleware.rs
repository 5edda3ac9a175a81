use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use sickfits_auth::{token_from_cookie_header, SessionTokenService};

use crate::context::SessionContext;

#[derive(Clone)]
pub struct SessionState {
    pub tokens: Arc<SessionTokenService>,
}

/// Resolve the session cookie into a [`SessionContext`].
///
/// Never rejects: a missing or forged cookie yields an anonymous context and
/// the permission gate decides what that caller may do.
pub async fn session_middleware(
    State(state): State<SessionState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = resolve_session(&state, req.headers());
    req.extensions_mut().insert(session);
    next.run(req).await
}

fn resolve_session(state: &SessionState, headers: &HeaderMap) -> SessionContext {
    let Some(token) = extract_cookie_token(headers) else {
        return SessionContext::anonymous();
    };

    match state.tokens.verify(token) {
        Ok(user_id) => SessionContext::signed_in(user_id),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring session cookie");
            SessionContext::anonymous()
        }
    }
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(token_from_cookie_header)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use sickfits_core::UserId;

    use super::*;

    fn state() -> SessionState {
        SessionState {
            tokens: Arc::new(SessionTokenService::new(&SecretString::from("test-secret".to_string()))),
        }
    }

    #[test]
    fn valid_cookie_resolves_user() {
        let state = state();
        let user_id = UserId::new();
        let token = state.tokens.issue(user_id).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; token={token}")).unwrap(),
        );

        assert_eq!(resolve_session(&state, &headers).user_id(), Some(user_id));
    }

    #[test]
    fn missing_or_forged_cookie_is_anonymous() {
        let state = state();
        assert_eq!(resolve_session(&state, &HeaderMap::new()), SessionContext::anonymous());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=not-a-jwt"));
        assert_eq!(resolve_session(&state, &headers), SessionContext::anonymous());
    }
}
