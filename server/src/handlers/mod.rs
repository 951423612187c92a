use axum::extract::OriginalUri;
use axum::http::{Method, Uri};
use axum::response::Response;
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod domes;
pub mod reservations;
pub mod sessions;
pub mod shows;
pub mod themes;
pub mod users;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "planetarium-api",
    };

    success(payload, "Health check successful")
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for '{}'", uri.path()))
}

/// Method fallback for resource routes: callers authenticate before learning
/// which methods a resource supports.
pub async fn method_not_allowed(
    _user: CurrentUser,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> AppError {
    AppError::MethodNotAllowed(format!(
        "Method \"{method}\" not allowed on '{}'",
        uri.path()
    ))
}
