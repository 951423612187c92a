pub mod dome;
pub mod reservation;
pub mod session;
pub mod show;
pub mod user;

pub use dome::{NewPlanetariumDome, PlanetariumDome};
pub use reservation::{
    NewReservation, NewTicket, Reservation, ReservationListing, ReservationWithTickets, Ticket,
    TicketWithSession,
};
pub use session::{
    NewShowSession, Seat, SessionFilter, ShowSession, ShowSessionPatch, ShowSessionSummary,
};
pub use show::{AstronomyShow, NewAstronomyShow, NewShowTheme, ShowFilter, ShowTheme, ShowWithThemes};
pub use user::{NewUser, User};
