use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{AuthIdentity, LoginRequest, LoginResponse, RegisterRequest};
use crate::auth::extractors::AuthUser;
use crate::error::Error;
use crate::state::AppState;
use crate::users::dto::UserView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    Ok(Json(state.auth().login(payload).await?))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), Error> {
    let view = state.auth().register(payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> Result<Json<AuthIdentity>, Error> {
    // A token can outlive its account; a stale subject reads as invalid.
    let principal = state
        .users()
        .principal_by_email(&email)
        .await?
        .ok_or(Error::InvalidToken)?;
    Ok(Json(AuthIdentity {
        email: principal.email,
        first_name: principal.first_name,
        last_name: principal.last_name,
    }))
}
