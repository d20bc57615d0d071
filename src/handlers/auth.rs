use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use tracing::{info, warn};

use crate::auth::{AuthError, LoginCredentials};
use crate::AppState;

/// Creates the router for authentication endpoints
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

/// Exchange staff credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    let account = state
        .auth
        .authenticate(payload.username.trim(), &payload.password)
        .await
        .map_err(|e| {
            warn!(username = %payload.username.trim(), "Login rejected");
            e
        })?;

    let token = state.auth.generate_token(&account)?;
    info!(user_id = account.id, is_staff = account.is_staff, "User logged in");
    Ok(Json(token))
}
