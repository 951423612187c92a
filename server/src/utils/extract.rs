//! Body and query extractors whose rejections use the API error envelope.

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::utils::error::{AppError, FieldErrors};

/// Key for body errors that belong to no single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// `Json<T>` that answers malformed bodies with a `400` keyed by the offending field.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection_error(&rejection)),
        }
    }
}

fn json_rejection_error(rejection: &JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            AppError::InvalidFields(data_error_fields(&err.body_text()))
        }
        JsonRejection::JsonSyntaxError(_) | JsonRejection::MissingJsonContentType(_) => {
            AppError::InvalidFields(FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text()))
        }
        _ => AppError::ValidationError(rejection.body_text()),
    }
}

/// Keys a serde_json data error by its path, so a ticket without a session
/// lands on `tickets[0].show_session`.
fn data_error_fields(text: &str) -> FieldErrors {
    let detail = text.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(text);
    let detail = detail
        .rfind(" at line ")
        .map_or(detail, |position| &detail[..position]);

    let (path, message) = match detail.split_once(": ") {
        Some((path, message)) if is_field_path(path) => (Some(path), message),
        _ => (None, detail),
    };

    if let Some(field) = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.strip_suffix('`'))
    {
        let key = match path {
            Some(path) => format!("{path}.{field}"),
            None => field.to_string(),
        };
        return FieldErrors::single(key, "This field is required.");
    }

    FieldErrors::single(path.unwrap_or(NON_FIELD_ERRORS), message)
}

fn is_field_path(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}

/// `Query<T>` that answers malformed query strings with a `400` validation error.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}

/// `Path<T>` whose rejection is a `404`: a non-numeric id names no resource.
pub struct PathId<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::NotFound(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_nested_field_is_keyed_by_path() {
        let fields = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             tickets[0]: missing field `show_session` at line 1 column 29",
        );
        assert_eq!(
            fields.get("tickets[0].show_session").unwrap(),
            ["This field is required.".to_string()]
        );
    }

    #[test]
    fn test_missing_top_level_field() {
        let fields = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             missing field `description` at line 1 column 13",
        );
        assert!(fields.get("description").is_some());
    }

    #[test]
    fn test_wrong_type_keeps_serde_message() {
        let fields = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             tickets[1].row: invalid type: string \"a\", expected i32 at line 1 column 40",
        );
        assert_eq!(
            fields.get("tickets[1].row").unwrap(),
            ["invalid type: string \"a\", expected i32".to_string()]
        );
    }

    #[test]
    fn test_unlocated_error_goes_to_non_field_errors() {
        let fields = data_error_fields(
            "Failed to deserialize the JSON body into the target type: \
             invalid type: integer `1`, expected a map at line 1 column 1",
        );
        assert!(fields.get(NON_FIELD_ERRORS).is_some());
    }
}
