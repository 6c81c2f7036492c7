//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};

use super::AppState;
use crate::auth::{hash_password, verify_password, PasswordError, UNKNOWN_USER_HASH};
use crate::store::{Backend, NewUser, User};
use crate::web::dto::{
    LoginRequest, RegisterRequest, SuccessResponse, TokenResponse, UserInfo, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Hash on the blocking pool.
async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing task failed: {}", e);
            ApiError::internal("Failed to hash password")
        })?
        .map_err(|e| match e {
            PasswordError::TooShort | PasswordError::TooLong => {
                ApiError::unprocessable(format!("Password error: {}", e))
            }
            other => {
                tracing::error!("Password hashing failed: {}", other);
                ApiError::internal("Failed to hash password")
            }
        })
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash).is_ok())
        .await
        .map_err(|e| {
            tracing::error!("Password verification task failed: {}", e);
            ApiError::internal("Failed to verify password")
        })
}

fn token_response<S: Backend>(state: &AppState<S>, user: User) -> Result<TokenResponse, ApiError> {
    let jwt = state.jwt()?;
    Ok(TokenResponse {
        token: jwt.issue(user.id, &user.username)?,
        expires_in: jwt.expiry_secs(),
        user: user.into(),
    })
}

/// POST /api/register - Create an account and sign in.
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 409, description = "Username already exists"),
        (status = 422, description = "Invalid username or password"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn register<S: Backend>(
    State(state): State<AppState<S>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let password_hash = hash_blocking(req.password).await?;

    let user = state
        .store
        .create_user(NewUser::new(req.username, password_hash))
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(token_response(&state, user)?)))
}

/// POST /api/login - Exchange credentials for a token.
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login<S: Backend>(
    State(state): State<AppState<S>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(user) = state.store.get_user_by_username(&req.username).await? else {
        verify_blocking(req.password, UNKNOWN_USER_HASH.to_string()).await?;
        tracing::info!(username = %req.username, "Failed login");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_blocking(req.password, user.password.clone()).await? {
        tracing::info!(username = %req.username, "Failed login");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(token_response(&state, user)?))
}

/// GET /api/user - The signed-in account.
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn current_user<S: Backend>(
    State(state): State<AppState<S>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserInfo>, ApiError> {
    // A token can outlive its account only if the store was reset
    let user = state
        .store
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(Json(user.into()))
}

/// POST /api/logout - Revoke the presented token.
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Token revoked", body = SuccessResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout<S: Backend>(
    State(state): State<AppState<S>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.jwt()?.revoke(&claims).await;
    tracing::info!(user_id = claims.sub, "User logged out");
    Ok(Json(SuccessResponse::ok()))
}
