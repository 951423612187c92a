//! Reservation engine.
//!
//! A reservation is accepted as a whole or not at all. Every requested seat
//! is range-checked against the dome of its session and checked for repeats
//! within the batch before anything is written; the store's unique
//! (session, row, seat) constraint settles races between concurrent requests.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{NewTicket, PlanetariumDome, ReservationWithTickets};
use crate::store::{PlanetariumStore, StoreError};
use crate::utils::error::{AppError, FieldErrors};

/// Checks that `row` and `seat` fall inside the dome's seat grid.
///
/// Each offending field gets a message naming the valid range, e.g.
/// `row number must be in available range: (1, rows): (1, 20)`.
pub fn validate_ticket(row: i32, seat: i32, dome: &PlanetariumDome) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (value, field, dome_field, limit) in [
        (row, "row", "rows", dome.rows),
        (seat, "seat", "seats_in_row", dome.seats_in_row),
    ] {
        if !(1..=limit).contains(&value) {
            errors.add(
                field,
                format!(
                    "{field} number must be in available range: (1, {dome_field}): (1, {limit})"
                ),
            );
        }
    }
    errors
}

/// Validates `tickets` and persists them under one new reservation for `user_id`.
pub async fn create_reservation(
    store: &dyn PlanetariumStore,
    user_id: Uuid,
    tickets: &[NewTicket],
) -> Result<ReservationWithTickets, AppError> {
    if tickets.is_empty() {
        return Err(AppError::InvalidFields(FieldErrors::single(
            "tickets",
            "this list may not be empty",
        )));
    }

    let mut errors = FieldErrors::new();
    let mut domes: HashMap<i64, Option<PlanetariumDome>> = HashMap::new();
    let mut requested = HashSet::new();

    for (index, ticket) in tickets.iter().enumerate() {
        let prefix = format!("tickets[{index}]");

        let dome = match domes.get(&ticket.show_session_id) {
            Some(dome) => dome.clone(),
            None => {
                let dome = store.session_dome(ticket.show_session_id).await?;
                domes.insert(ticket.show_session_id, dome.clone());
                dome
            }
        };

        match dome {
            Some(dome) => {
                errors.merge_prefixed(&prefix, validate_ticket(ticket.row, ticket.seat, &dome))
            }
            None => errors.add(
                format!("{prefix}.show_session"),
                format!("show session {} does not exist", ticket.show_session_id),
            ),
        }

        if !requested.insert((ticket.show_session_id, ticket.row, ticket.seat)) {
            errors.add(
                prefix,
                format!(
                    "seat (row {}, seat {}) of show session {} is requested more than once",
                    ticket.row, ticket.seat, ticket.show_session_id
                ),
            );
        }
    }
    errors.into_result()?;

    match store.create_reservation(user_id, tickets).await {
        Ok(created) => {
            info!(
                reservation_id = created.reservation.id,
                user_id = %user_id,
                tickets = created.tickets.len(),
                "Reservation created"
            );
            Ok(created)
        }
        Err(err @ StoreError::SeatTaken { .. }) => {
            warn!(user_id = %user_id, error = %err, "Reservation lost a seat race");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
