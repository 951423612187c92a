//! Permission extractors.
//!
//! Handlers state their access rule in their signature: [`CurrentUser`]
//! for any authenticated caller (reads, owner-scoped reservations),
//! [`AdminUser`] for catalog and session mutations.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use tracing::warn;
use uuid::Uuid;

use crate::auth::{JwtError, JwtService};
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub is_staff: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError("Authentication credentials were not provided".to_string())
            })?;

        let token = JwtService::extract_from_header(header).ok_or_else(|| {
            AppError::AuthError("Expected 'Authorization: Bearer <token>'".to_string())
        })?;

        let claims = state.jwt.validate_token(token).map_err(|e| {
            warn!(error = %e, uri = %parts.uri, "Rejected bearer token");
            match e {
                JwtError::ExpiredToken => AppError::AuthError("Token has expired".to_string()),
                _ => AppError::AuthError("Invalid token".to_string()),
            }
        })?;

        let user = CurrentUser {
            id: claims
                .user_id()
                .map_err(|_| AppError::AuthError("Invalid token".to_string()))?,
            email: claims.email,
            is_staff: claims.is_staff,
        };
        parts.extensions.insert(user.clone());

        Ok(user)
    }
}

/// An authenticated caller with the staff flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            warn!(user_id = %user.id, uri = %parts.uri, "Non-admin attempted a write");
            return Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ));
        }
        Ok(Self(user))
    }
}
