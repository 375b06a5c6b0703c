use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::error::ApiError;

pub const AUTH_REQUIRED: &str = "Authorization token required";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Token part of `Authorization: Bearer <token>`, if the header has that shape.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Runs the full bearer check: header shape, then signature and expiry.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<Claims, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::Unauthorized(AUTH_REQUIRED.into()))?;

    keys.verify(token).ok_or_else(|| {
        warn!("invalid or expired token");
        ApiError::Unauthorized(INVALID_TOKEN.into())
    })
}

/// Verifies the bearer token on its own, independent of the gateway.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authenticate(&parts.headers, &keys).map(AuthUser)
    }
}

/// `Json<T>` whose rejections use the `{"error": ...}` body like every other failure.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!(status = %rejection.status(), "rejected request body");
                Err(ApiError::BadRequest(json_rejection_message(&rejection)))
            }
        }
    }
}

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body".into(),
        _ => rejection.body_text(),
    }
}
