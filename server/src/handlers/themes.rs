use axum::extract::State;
use axum::response::Response;

use crate::auth::{AdminUser, CurrentUser};
use crate::models::NewShowTheme;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::JsonBody;
use crate::utils::response::{created, success};

/// GET /show-themes
pub async fn list_themes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Response, AppError> {
    let themes = state.store.list_themes().await?;
    Ok(success(themes, "Show themes"))
}

/// POST /show-themes
pub async fn create_theme(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(body): JsonBody<NewShowTheme>,
) -> Result<Response, AppError> {
    body.validate().into_result()?;
    let theme = state
        .store
        .create_theme(NewShowTheme {
            name: body.name.trim().to_string(),
        })
        .await?;
    Ok(created(theme, "Show theme created"))
}
