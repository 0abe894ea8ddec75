use anyhow::Context;
use axum::{
    extract::{FromRef, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{AuthUser, JwtKeys},
    error::AppResult,
    state::AppState,
    users::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, UserFilter, UserResponse},
        services,
    },
};

pub const USER_ID_HEADER: &str = "userid";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/login", post(login))
        .route("/users/:user_id", get(get_user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = services::register(state.users.as_ref(), payload).await?;
    Ok(Json(user))
}

/// Token and public id go out both as headers and in the body.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let keys = JwtKeys::from_ref(&state);
    let session =
        services::authenticate(state.users.as_ref(), &keys, &payload.email, &payload.password)
            .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", session.token))
            .context("token header value")?,
    );
    headers.insert(
        HeaderName::from_static(USER_ID_HEADER),
        HeaderValue::from_str(&session.user_id).context("user id header value")?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            token: session.token,
            user_id: session.user_id,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Vec<UserResponse>>> {
    debug!(%caller, suffix = ?filter.email_suffix, "listing users");
    let users = services::list_users(state.users.as_ref(), filter.email_suffix.as_deref()).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let user = services::get_user(state.users.as_ref(), &user_id).await?;
    Ok(Json(user))
}
