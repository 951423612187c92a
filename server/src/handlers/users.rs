use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::User;
use crate::services::accounts;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::JsonBody;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub is_staff: bool,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_staff: user.is_staff,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenView {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// POST /users/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Credentials>,
) -> Result<Response, AppError> {
    let user = accounts::register(state.store.as_ref(), &body.email, &body.password).await?;
    Ok(created(UserView::from(user), "User registered"))
}

/// POST /users/token
pub async fn obtain_token(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Credentials>,
) -> Result<Response, AppError> {
    let user = accounts::authenticate(state.store.as_ref(), &body.email, &body.password).await?;
    let access = state
        .jwt
        .generate_token(&user)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(success(
        TokenView {
            access,
            token_type: "Bearer",
            expires_in: state.jwt.expiration_minutes() * 60,
        },
        "Token issued",
    ))
}

/// GET /users/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Response, AppError> {
    let user = state
        .store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;
    Ok(success(UserView::from(user), "Current user"))
}
