use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CredentialsRequest, LoginResponse, PublicUser, UserEnvelope},
        extractors::{AuthUser, JsonBody},
        repo::StoreError,
        services::{create_user, is_valid_email, normalize_email, validate_user, AuthError},
    },
    error::ApiError,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/api/profile", get(get_profile))
}

/// Pulls a normalized email and the password out of the body, or a 400.
fn credentials(payload: CredentialsRequest) -> Result<(String, String), ApiError> {
    match (payload.email, payload.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Ok((normalize_email(&email), password))
        }
        _ => Err(ApiError::BadRequest("Email and password are required".into())),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let (email, password) = credentials(payload)?;

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    let user = match create_user(state.store.as_ref(), &email, &password).await {
        Ok(u) => u,
        Err(AuthError::Store(StoreError::Duplicate)) => {
            warn!(email = %email, "email already registered");
            return Err(ApiError::Conflict("User already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (email, password) = credentials(payload)?;

    let user = validate_user(state.store.as_ref(), &email, &password)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login rejected");
            ApiError::Unauthorized(INVALID_CREDENTIALS.into())
        })?;

    let token = state
        .keys
        .sign(user.id, &user.email)
        .map_err(|e| ApiError::Internal(e.context("sign token")))?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: PublicUser::from(user),
    }))
}

/// Re-checks the bearer token itself instead of trusting the gateway headers.
#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = state
        .store
        .find_by_email(&claims.email)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.user_id, "token subject no longer exists");
            ApiError::NotFound("User not found".into())
        })?;

    Ok(Json(UserEnvelope {
        user: PublicUser::from(user),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::repo::MemoryUserStore;

    #[test]
    fn credentials_require_both_fields() {
        let missing_password = CredentialsRequest {
            email: Some("a@x.com".into()),
            password: None,
        };
        assert!(matches!(
            credentials(missing_password),
            Err(ApiError::BadRequest(_))
        ));

        let blank_email = CredentialsRequest {
            email: Some("   ".into()),
            password: Some("secret123".into()),
        };
        assert!(matches!(credentials(blank_email), Err(ApiError::BadRequest(_))));

        let ok = CredentialsRequest {
            email: Some(" A@X.com".into()),
            password: Some("secret123".into()),
        };
        let (email, password) = credentials(ok).unwrap();
        assert_eq!(email, "a@x.com");
        assert_eq!(password, "secret123");
    }

    // No gateway layer here: the handler must still enforce the bearer check.
    fn bare_profile_app(state: AppState) -> Router {
        profile_routes().with_state(state)
    }

    async fn get_profile_with(app: Router, auth: Option<String>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().uri("/api/profile");
        if let Some(auth) = auth {
            req = req.header(AUTHORIZATION, auth);
        }
        let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn profile_handler_checks_token_without_gateway() {
        let state = AppState::fake(Arc::new(MemoryUserStore::new()));

        let (status, body) = get_profile_with(bare_profile_app(state.clone()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authorization token required");

        let (status, body) =
            get_profile_with(bare_profile_app(state), Some("Bearer garbage".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn profile_handler_returns_public_fields() {
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::fake(store.clone());
        let user = create_user(store.as_ref(), "a@x.com", "secret123").await.unwrap();
        let token = state.keys.sign(user.id, &user.email).unwrap();

        let (status, body) =
            get_profile_with(bare_profile_app(state), Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        let profile = body["user"].as_object().unwrap();
        assert_eq!(profile["id"], user.id.to_string());
        assert_eq!(profile["email"], "a@x.com");
        assert!(profile.contains_key("createdAt"));
        assert!(profile.contains_key("updatedAt"));
        assert_eq!(profile.len(), 4);
    }

    #[tokio::test]
    async fn profile_for_unknown_subject_is_not_found() {
        let state = AppState::fake(Arc::new(MemoryUserStore::new()));
        let token = state.keys.sign(Uuid::new_v4(), "ghost@x.com").unwrap();

        let (status, body) =
            get_profile_with(bare_profile_app(state), Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }
}
