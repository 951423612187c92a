use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::models::session::ShowSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    #[serde(rename = "show_session")]
    pub show_session_id: i64,
    #[serde(rename = "reservation")]
    pub reservation_id: i64,
}

// Hand-written: `#[derive(FromRow)]` shadows its `row` argument with a field of that name.
impl<'r> FromRow<'r, PgRow> for Ticket {
    fn from_row(record: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: record.try_get("id")?,
            row: record.try_get("row")?,
            seat: record.try_get("seat")?,
            show_session_id: record.try_get("show_session_id")?,
            reservation_id: record.try_get("reservation_id")?,
        })
    }
}

/// One requested seat in a reservation body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewTicket {
    pub row: i32,
    pub seat: i32,
    #[serde(rename = "show_session")]
    pub show_session_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReservation {
    pub tickets: Vec<NewTicket>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationWithTickets {
    pub reservation: Reservation,
    pub tickets: Vec<Ticket>,
}

/// A ticket with its session embedded, as shown in reservation listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketWithSession {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session: ShowSession,
    #[serde(rename = "reservation")]
    pub reservation_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationListing {
    pub reservation: Reservation,
    pub tickets: Vec<TicketWithSession>,
}
