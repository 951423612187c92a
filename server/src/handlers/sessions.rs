use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{AdminUser, CurrentUser};
use crate::handlers::domes::DomeView;
use crate::handlers::shows::ShowView;
use crate::models::{
    NewShowSession, PlanetariumDome, Seat, SessionFilter, ShowSession, ShowSessionPatch,
};
use crate::services::reservations::validate_ticket;
use crate::state::AppState;
use crate::store::PlanetariumStore;
use crate::utils::error::{AppError, FieldErrors};
use crate::utils::extract::{JsonBody, PathId, QueryParams};
use crate::utils::response::{created, no_content, success};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Default, Deserialize)]
pub struct SessionListParams {
    /// `YYYY-MM-DD`, matched against the UTC day of `show_time`.
    pub date: Option<String>,
    pub astronomy_show: Option<i64>,
}

impl SessionListParams {
    fn filter(&self) -> Result<SessionFilter, AppError> {
        let date = match self.date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                    FieldErrors::single("date", "Date has wrong format. Use YYYY-MM-DD.")
                })?,
            ),
            _ => None,
        };
        Ok(SessionFilter {
            date,
            astronomy_show_id: self.astronomy_show,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ShowSessionDetail {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub astronomy_show: ShowView,
    pub planetarium_dome: DomeView,
    pub taken_places: Vec<Seat>,
}

/// GET /show-sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    _user: CurrentUser,
    QueryParams(params): QueryParams<SessionListParams>,
) -> Result<Response, AppError> {
    let filter = params.filter()?;
    let sessions = state.store.list_sessions(&filter).await?;
    Ok(success(sessions, "Show sessions"))
}

/// GET /show-sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    _user: CurrentUser,
    PathId(id): PathId<i64>,
) -> Result<Response, AppError> {
    let session = find_session(state.store.as_ref(), id).await?;

    let show = state
        .store
        .find_show(session.astronomy_show_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Astronomy show {} not found",
                session.astronomy_show_id
            ))
        })?;
    let dome = state
        .store
        .find_dome(session.planetarium_dome_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Planetarium dome {} not found",
                session.planetarium_dome_id
            ))
        })?;
    let taken_places = state.store.taken_seats(session.id).await?;

    Ok(success(
        ShowSessionDetail {
            id: session.id,
            show_time: session.show_time,
            astronomy_show: ShowView::from(show),
            planetarium_dome: DomeView::from(dome),
            taken_places,
        },
        "Show session",
    ))
}

/// POST /show-sessions
pub async fn create_session(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(body): JsonBody<NewShowSession>,
) -> Result<Response, AppError> {
    check_references(state.store.as_ref(), &body).await?;
    let session = state.store.create_session(body).await?;
    info!(session_id = session.id, "Show session created");
    Ok(created(session, "Show session created"))
}

/// PUT /show-sessions/:id
pub async fn replace_session(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathId(id): PathId<i64>,
    JsonBody(body): JsonBody<NewShowSession>,
) -> Result<Response, AppError> {
    find_session(state.store.as_ref(), id).await?;
    save_session(state.store.as_ref(), id, body).await
}

/// PATCH /show-sessions/:id
pub async fn update_session(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathId(id): PathId<i64>,
    JsonBody(patch): JsonBody<ShowSessionPatch>,
) -> Result<Response, AppError> {
    let current = find_session(state.store.as_ref(), id).await?;
    save_session(state.store.as_ref(), id, patch.apply_to(&current)).await
}

/// DELETE /show-sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathId(id): PathId<i64>,
) -> Result<Response, AppError> {
    if !state.store.delete_session(id).await? {
        return Err(session_not_found(id));
    }
    info!(session_id = id, "Show session deleted");
    Ok(no_content())
}

async fn save_session(
    store: &dyn PlanetariumStore,
    id: i64,
    session: NewShowSession,
) -> Result<Response, AppError> {
    let dome = check_references(store, &session).await?;

    let stranded = store
        .taken_seats(id)
        .await?
        .into_iter()
        .filter(|seat| !validate_ticket(seat.row, seat.seat, &dome).is_empty())
        .count();
    if stranded > 0 {
        return Err(FieldErrors::single(
            "planetarium_dome",
            format!(
                "{stranded} sold seat(s) fall outside dome '{}' ({} rows x {} seats)",
                dome.name, dome.rows, dome.seats_in_row
            ),
        )
        .into());
    }

    let session = store
        .update_session(id, session)
        .await?
        .ok_or_else(|| session_not_found(id))?;
    info!(session_id = id, "Show session updated");
    Ok(success(session, "Show session updated"))
}

async fn find_session(store: &dyn PlanetariumStore, id: i64) -> Result<ShowSession, AppError> {
    store
        .find_session(id)
        .await?
        .ok_or_else(|| session_not_found(id))
}

/// Both the show and the dome a session points at must exist. Returns the dome.
async fn check_references(
    store: &dyn PlanetariumStore,
    session: &NewShowSession,
) -> Result<PlanetariumDome, AppError> {
    let mut errors = FieldErrors::new();
    if store.find_show(session.astronomy_show_id).await?.is_none() {
        errors.add(
            "astronomy_show",
            format!(
                "Invalid pk \"{}\" - object does not exist.",
                session.astronomy_show_id
            ),
        );
    }
    let dome = store.find_dome(session.planetarium_dome_id).await?;
    if dome.is_none() {
        errors.add(
            "planetarium_dome",
            format!(
                "Invalid pk \"{}\" - object does not exist.",
                session.planetarium_dome_id
            ),
        );
    }
    match dome {
        Some(dome) if errors.is_empty() => Ok(dome),
        _ => Err(errors.into()),
    }
}

fn session_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Show session {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_filter_parses_iso_day() {
        let params = SessionListParams {
            date: Some("2022-06-02".to_string()),
            astronomy_show: Some(3),
        };
        let filter = params.filter().unwrap();
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2022, 6, 2));
        assert_eq!(filter.astronomy_show_id, Some(3));
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let params = SessionListParams {
            date: Some("02/06/2022".to_string()),
            ..Default::default()
        };
        match params.filter() {
            Err(AppError::InvalidFields(fields)) => assert!(fields.get("date").is_some()),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
