//! Persistence for the catalog, sessions, reservations and accounts.
//!
//! [`PlanetariumStore`] is implemented by [`PgStore`] for production and by
//! [`MemoryStore`] for local runs and tests. Both guarantee that a
//! reservation and its tickets are written all-or-nothing and that no two
//! tickets ever share a (session, row, seat).

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AstronomyShow, NewAstronomyShow, NewPlanetariumDome, NewShowSession, NewShowTheme, NewTicket,
    NewUser, PlanetariumDome, ReservationListing, ReservationWithTickets, Seat, SessionFilter,
    ShowFilter, ShowSession, ShowSessionSummary, ShowTheme, ShowWithThemes, User,
};
use crate::utils::pagination::{Page, Pagination};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The (session, row, seat) of `tickets[index]` is already ticketed.
    #[error("seat (row {row}, seat {seat}) of show session {show_session} is already taken")]
    SeatTaken {
        index: usize,
        show_session: i64,
        row: i32,
        seat: i32,
    },

    /// The session of `tickets[index]` vanished before the insert.
    #[error("show session {show_session} does not exist")]
    UnknownSession { index: usize, show_session: i64 },

    #[error("{field}: {message}")]
    Conflict { field: String, message: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PlanetariumStore: Send + Sync {
    // Accounts

    /// Fails with [`StoreError::Conflict`] on `email` when the address is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    // Catalog

    async fn create_theme(&self, theme: NewShowTheme) -> StoreResult<ShowTheme>;

    async fn list_themes(&self) -> StoreResult<Vec<ShowTheme>>;

    /// Returns the themes that exist among `ids`, ordered by id.
    async fn find_themes(&self, ids: &[i64]) -> StoreResult<Vec<ShowTheme>>;

    /// Theme ids are expected to be validated by the caller.
    async fn create_show(&self, show: NewAstronomyShow) -> StoreResult<ShowWithThemes>;

    /// Distinct shows matching `filter`, ordered by id.
    async fn list_shows(
        &self,
        filter: &ShowFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<ShowWithThemes>>;

    async fn find_show(&self, id: i64) -> StoreResult<Option<ShowWithThemes>>;

    async fn set_show_image(&self, id: i64, image: &str) -> StoreResult<Option<AstronomyShow>>;

    async fn create_dome(&self, dome: NewPlanetariumDome) -> StoreResult<PlanetariumDome>;

    async fn list_domes(&self) -> StoreResult<Vec<PlanetariumDome>>;

    async fn find_dome(&self, id: i64) -> StoreResult<Option<PlanetariumDome>>;

    // Sessions

    async fn create_session(&self, session: NewShowSession) -> StoreResult<ShowSession>;

    async fn update_session(
        &self,
        id: i64,
        session: NewShowSession,
    ) -> StoreResult<Option<ShowSession>>;

    /// Deletes the session and its tickets. Returns `false` if it did not exist.
    async fn delete_session(&self, id: i64) -> StoreResult<bool>;

    async fn find_session(&self, id: i64) -> StoreResult<Option<ShowSession>>;

    /// Sessions ordered by show time, with capacity and available seats.
    async fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<ShowSessionSummary>>;

    /// The dome a session takes place in.
    async fn session_dome(&self, session_id: i64) -> StoreResult<Option<PlanetariumDome>>;

    async fn taken_seats(&self, session_id: i64) -> StoreResult<Vec<Seat>>;

    // Reservations

    /// Inserts one reservation owned by `user_id` and all `tickets`, or nothing.
    async fn create_reservation(
        &self,
        user_id: Uuid,
        tickets: &[NewTicket],
    ) -> StoreResult<ReservationWithTickets>;

    /// The user's reservations, newest first.
    async fn list_reservations(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> StoreResult<Page<ReservationListing>>;
}
