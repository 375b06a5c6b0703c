use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::extractors::authenticate;
use crate::{error::ApiError, state::AppState};

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("x-user-email");

pub fn is_protected(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

/// Guards the configured path prefixes with a bearer check and forwards the
/// caller's identity as `x-user-id` / `x-user-email`. Other paths pass through.
pub async fn access_gateway(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_protected(request.uri().path(), &state.config.protected_prefixes) {
        return Ok(next.run(request).await);
    }

    let claims = authenticate(request.headers(), &state.keys)?;

    let user_id = HeaderValue::from_str(&claims.user_id.to_string())
        .context("user id is not a valid header value")?;
    let email =
        HeaderValue::from_str(&claims.email).context("email is not a valid header value")?;

    let headers = request.headers_mut();
    headers.insert(USER_ID_HEADER, user_id);
    headers.insert(USER_EMAIL_HEADER, email);

    debug!(user_id = %claims.user_id, path = %request.uri().path(), "gateway passed");
    Ok(next.run(request).await)
}
