use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use billtrack_auth::AuthProvider;

use crate::app::errors;
use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub provider: Arc<dyn AuthProvider>,
}

/// Resolve the caller for every request.
///
/// No `Authorization` header means an anonymous caller. A header that is
/// present but malformed, or a token the provider rejects, is a 401: a bad
/// credential is never silently downgraded to anonymous.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .map_err(|status| errors::json_error(status, "unauthorized", "malformed authorization header"))?
        .map(str::to_owned);

    let identity = match token {
        Some(token) => {
            let identity = state.provider.verify(&token).await.map_err(|e| {
                tracing::info!(error = %e, "credential rejected");
                errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
            })?;
            Some(identity)
        }
        None => None,
    };

    req.extensions_mut().insert(CallerContext::new(identity));

    Ok(next.run(req).await)
}

/// Bearer token from the `Authorization` header; `Ok(None)` when absent.
pub fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, StatusCode> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Some(token))
}
