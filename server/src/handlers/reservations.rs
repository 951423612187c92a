use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::models::{
    NewReservation, ReservationListing, ReservationWithTickets, Ticket, TicketWithSession,
};
use crate::services::reservations;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{JsonBody, QueryParams};
use crate::utils::pagination::PageParams;
use crate::utils::response::{created, success};

#[derive(Debug, Serialize)]
pub struct ReservationView<T> {
    pub id: i64,
    pub tickets: Vec<T>,
    pub created_at: DateTime<Utc>,
}

impl From<ReservationWithTickets> for ReservationView<Ticket> {
    fn from(value: ReservationWithTickets) -> Self {
        Self {
            id: value.reservation.id,
            tickets: value.tickets,
            created_at: value.reservation.created_at,
        }
    }
}

impl From<ReservationListing> for ReservationView<TicketWithSession> {
    fn from(value: ReservationListing) -> Self {
        Self {
            id: value.reservation.id,
            tickets: value.tickets,
            created_at: value.reservation.created_at,
        }
    }
}

/// POST /reservations
pub async fn create_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(body): JsonBody<NewReservation>,
) -> Result<Response, AppError> {
    let reservation =
        reservations::create_reservation(state.store.as_ref(), user.id, &body.tickets).await?;
    Ok(created(ReservationView::from(reservation), "Reservation created"))
}

/// GET /reservations
pub async fn list_reservations(
    State(state): State<AppState>,
    user: CurrentUser,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Response, AppError> {
    let page = state
        .store
        .list_reservations(user.id, params.pagination()?)
        .await?
        .map(ReservationView::<TicketWithSession>::from);
    Ok(success(page, "Reservations"))
}
