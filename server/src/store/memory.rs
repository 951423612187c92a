use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    AstronomyShow, NewAstronomyShow, NewPlanetariumDome, NewShowSession, NewShowTheme, NewTicket,
    NewUser, PlanetariumDome, Reservation, ReservationListing, ReservationWithTickets, Seat,
    SessionFilter, ShowFilter, ShowSession, ShowSessionSummary, ShowTheme, ShowWithThemes, Ticket,
    TicketWithSession, User,
};
use crate::store::{PlanetariumStore, StoreError, StoreResult};
use crate::utils::pagination::{Page, Pagination};

#[derive(Default)]
struct State {
    next_id: i64,
    users: HashMap<Uuid, User>,
    themes: BTreeMap<i64, ShowTheme>,
    shows: BTreeMap<i64, AstronomyShow>,
    show_themes: BTreeMap<i64, BTreeSet<i64>>,
    domes: BTreeMap<i64, PlanetariumDome>,
    sessions: BTreeMap<i64, ShowSession>,
    reservations: BTreeMap<i64, Reservation>,
    tickets: BTreeMap<i64, Ticket>,
    /// Mirrors the unique (session, row, seat) constraint.
    claimed: HashSet<(i64, i32, i32)>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn show_with_themes(&self, show: &AstronomyShow) -> ShowWithThemes {
        let themes = self
            .show_themes
            .get(&show.id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.themes.get(id).cloned())
            .collect();
        ShowWithThemes {
            show: show.clone(),
            themes,
        }
    }

    fn tickets_for_session(&self, session_id: i64) -> impl Iterator<Item = &Ticket> {
        self.tickets
            .values()
            .filter(move |ticket| ticket.show_session_id == session_id)
    }

    fn remove_session(&mut self, id: i64) -> bool {
        if self.sessions.remove(&id).is_none() {
            return false;
        }
        let doomed: Vec<Ticket> = self.tickets_for_session(id).cloned().collect();
        for ticket in doomed {
            self.tickets.remove(&ticket.id);
            self.claimed
                .remove(&(ticket.show_session_id, ticket.row, ticket.seat));
        }
        true
    }
}

/// Store backed by process memory; one write lock serializes all mutations.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed tickets across all sessions.
    pub async fn ticket_count(&self) -> usize {
        self.state.read().await.tickets.len()
    }
}

#[async_trait]
impl PlanetariumStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict {
                field: "email".to_string(),
                message: "a user with this email already exists".to_string(),
            });
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_theme(&self, theme: NewShowTheme) -> StoreResult<ShowTheme> {
        let mut state = self.state.write().await;
        let theme = ShowTheme {
            id: state.allocate_id(),
            name: theme.name,
        };
        state.themes.insert(theme.id, theme.clone());
        Ok(theme)
    }

    async fn list_themes(&self) -> StoreResult<Vec<ShowTheme>> {
        Ok(self.state.read().await.themes.values().cloned().collect())
    }

    async fn find_themes(&self, ids: &[i64]) -> StoreResult<Vec<ShowTheme>> {
        let state = self.state.read().await;
        Ok(state
            .themes
            .values()
            .filter(|theme| ids.contains(&theme.id))
            .cloned()
            .collect())
    }

    async fn create_show(&self, show: NewAstronomyShow) -> StoreResult<ShowWithThemes> {
        let mut state = self.state.write().await;
        let created = AstronomyShow {
            id: state.allocate_id(),
            title: show.title,
            description: show.description,
            image: None,
        };
        let theme_ids: BTreeSet<i64> = show
            .show_theme
            .into_iter()
            .filter(|id| state.themes.contains_key(id))
            .collect();
        state.show_themes.insert(created.id, theme_ids);
        state.shows.insert(created.id, created.clone());
        Ok(state.show_with_themes(&created))
    }

    async fn list_shows(
        &self,
        filter: &ShowFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<ShowWithThemes>> {
        let state = self.state.read().await;
        let matching: Vec<ShowWithThemes> = state
            .shows
            .values()
            .map(|show| state.show_with_themes(show))
            .filter(|show| filter.matches(show))
            .collect();
        Ok(pagination.slice(matching))
    }

    async fn find_show(&self, id: i64) -> StoreResult<Option<ShowWithThemes>> {
        let state = self.state.read().await;
        Ok(state.shows.get(&id).map(|show| state.show_with_themes(show)))
    }

    async fn set_show_image(&self, id: i64, image: &str) -> StoreResult<Option<AstronomyShow>> {
        let mut state = self.state.write().await;
        Ok(state.shows.get_mut(&id).map(|show| {
            show.image = Some(image.to_string());
            show.clone()
        }))
    }

    async fn create_dome(&self, dome: NewPlanetariumDome) -> StoreResult<PlanetariumDome> {
        let mut state = self.state.write().await;
        let dome = PlanetariumDome {
            id: state.allocate_id(),
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
        };
        state.domes.insert(dome.id, dome.clone());
        Ok(dome)
    }

    async fn list_domes(&self) -> StoreResult<Vec<PlanetariumDome>> {
        Ok(self.state.read().await.domes.values().cloned().collect())
    }

    async fn find_dome(&self, id: i64) -> StoreResult<Option<PlanetariumDome>> {
        Ok(self.state.read().await.domes.get(&id).cloned())
    }

    async fn create_session(&self, session: NewShowSession) -> StoreResult<ShowSession> {
        let mut state = self.state.write().await;
        let session = ShowSession {
            id: state.allocate_id(),
            astronomy_show_id: session.astronomy_show_id,
            planetarium_dome_id: session.planetarium_dome_id,
            show_time: session.show_time,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn update_session(
        &self,
        id: i64,
        session: NewShowSession,
    ) -> StoreResult<Option<ShowSession>> {
        let mut state = self.state.write().await;
        Ok(state.sessions.get_mut(&id).map(|existing| {
            existing.astronomy_show_id = session.astronomy_show_id;
            existing.planetarium_dome_id = session.planetarium_dome_id;
            existing.show_time = session.show_time;
            existing.clone()
        }))
    }

    async fn delete_session(&self, id: i64) -> StoreResult<bool> {
        Ok(self.state.write().await.remove_session(id))
    }

    async fn find_session(&self, id: i64) -> StoreResult<Option<ShowSession>> {
        Ok(self.state.read().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<ShowSessionSummary>> {
        let state = self.state.read().await;
        let mut summaries: Vec<ShowSessionSummary> = state
            .sessions
            .values()
            .filter(|session| filter.matches(session))
            .filter_map(|session| {
                let show = state.shows.get(&session.astronomy_show_id)?;
                let dome = state.domes.get(&session.planetarium_dome_id)?;
                let sold = state.tickets_for_session(session.id).count() as i64;
                Some(ShowSessionSummary {
                    id: session.id,
                    show_time: session.show_time,
                    astronomy_show_title: show.title.clone(),
                    planetarium_dome_name: dome.name.clone(),
                    planetarium_dome_capacity: dome.capacity(),
                    tickets_available: dome.capacity() - sold,
                })
            })
            .collect();
        summaries.sort_by_key(|summary| (summary.show_time, summary.id));
        Ok(summaries)
    }

    async fn session_dome(&self, session_id: i64) -> StoreResult<Option<PlanetariumDome>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(&session_id)
            .and_then(|session| state.domes.get(&session.planetarium_dome_id))
            .cloned())
    }

    async fn taken_seats(&self, session_id: i64) -> StoreResult<Vec<Seat>> {
        let state = self.state.read().await;
        let mut seats: Vec<Seat> = state
            .tickets_for_session(session_id)
            .map(|ticket| Seat {
                row: ticket.row,
                seat: ticket.seat,
            })
            .collect();
        seats.sort();
        Ok(seats)
    }

    async fn create_reservation(
        &self,
        user_id: Uuid,
        tickets: &[NewTicket],
    ) -> StoreResult<ReservationWithTickets> {
        let mut state = self.state.write().await;

        // Check every ticket before touching state so a failure leaves nothing behind.
        let mut batch = HashSet::new();
        for (index, ticket) in tickets.iter().enumerate() {
            if !state.sessions.contains_key(&ticket.show_session_id) {
                return Err(StoreError::UnknownSession {
                    index,
                    show_session: ticket.show_session_id,
                });
            }
            let key = (ticket.show_session_id, ticket.row, ticket.seat);
            if state.claimed.contains(&key) || !batch.insert(key) {
                return Err(StoreError::SeatTaken {
                    index,
                    show_session: ticket.show_session_id,
                    row: ticket.row,
                    seat: ticket.seat,
                });
            }
        }

        let reservation = Reservation {
            id: state.allocate_id(),
            created_at: Utc::now(),
            user_id,
        };
        state.reservations.insert(reservation.id, reservation.clone());

        let mut created = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let ticket = Ticket {
                id: state.allocate_id(),
                row: ticket.row,
                seat: ticket.seat,
                show_session_id: ticket.show_session_id,
                reservation_id: reservation.id,
            };
            state
                .claimed
                .insert((ticket.show_session_id, ticket.row, ticket.seat));
            state.tickets.insert(ticket.id, ticket.clone());
            created.push(ticket);
        }

        Ok(ReservationWithTickets {
            reservation,
            tickets: created,
        })
    }

    async fn list_reservations(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> StoreResult<Page<ReservationListing>> {
        let state = self.state.read().await;
        let mut owned: Vec<&Reservation> = state
            .reservations
            .values()
            .filter(|reservation| reservation.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let listings = owned
            .into_iter()
            .map(|reservation| ReservationListing {
                reservation: reservation.clone(),
                tickets: state
                    .tickets
                    .values()
                    .filter(|ticket| ticket.reservation_id == reservation.id)
                    .filter_map(|ticket| {
                        let session = state.sessions.get(&ticket.show_session_id)?;
                        Some(TicketWithSession {
                            id: ticket.id,
                            row: ticket.row,
                            seat: ticket.seat,
                            show_session: session.clone(),
                            reservation_id: ticket.reservation_id,
                        })
                    })
                    .collect(),
            })
            .collect();
        Ok(pagination.slice(listings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn seeded() -> (MemoryStore, ShowSession) {
        let store = MemoryStore::new();
        let show = store
            .create_show(NewAstronomyShow {
                title: "Sample astronomy show".to_string(),
                description: "Sample description".to_string(),
                show_theme: vec![],
            })
            .await
            .unwrap();
        let dome = store
            .create_dome(NewPlanetariumDome {
                name: "Blue".to_string(),
                rows: 20,
                seats_in_row: 20,
            })
            .await
            .unwrap();
        let session = store
            .create_session(NewShowSession {
                astronomy_show_id: show.show.id,
                planetarium_dome_id: dome.id,
                show_time: Utc.with_ymd_and_hms(2022, 6, 2, 14, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        (store, session)
    }

    fn ticket(session: &ShowSession, row: i32, seat: i32) -> NewTicket {
        NewTicket {
            row,
            seat,
            show_session_id: session.id,
        }
    }

    #[tokio::test]
    async fn test_taken_seat_rejects_whole_batch() {
        let (store, session) = seeded().await;
        let user = Uuid::new_v4();
        store
            .create_reservation(user, &[ticket(&session, 1, 1)])
            .await
            .unwrap();

        let err = store
            .create_reservation(user, &[ticket(&session, 2, 2), ticket(&session, 1, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::SeatTaken { index: 1, .. }));
        assert_eq!(store.ticket_count().await, 1);
        assert_eq!(
            store.taken_seats(session.id).await.unwrap(),
            vec![Seat { row: 1, seat: 1 }]
        );
    }

    #[tokio::test]
    async fn test_available_seats_tracks_tickets() {
        let (store, session) = seeded().await;
        store
            .create_reservation(
                Uuid::new_v4(),
                &[ticket(&session, 1, 1), ticket(&session, 1, 2)],
            )
            .await
            .unwrap();

        let summaries = store.list_sessions(&SessionFilter::default()).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].planetarium_dome_capacity, 400);
        assert_eq!(summaries[0].tickets_available, 398);
    }

    #[tokio::test]
    async fn test_delete_session_frees_its_seats() {
        let (store, session) = seeded().await;
        store
            .create_reservation(Uuid::new_v4(), &[ticket(&session, 5, 5)])
            .await
            .unwrap();

        assert!(store.delete_session(session.id).await.unwrap());
        assert_eq!(store.ticket_count().await, 0);
        assert!(!store.delete_session(session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reservations_are_scoped_and_newest_first() {
        let (store, session) = seeded().await;
        let owner = Uuid::new_v4();
        let first = store
            .create_reservation(owner, &[ticket(&session, 1, 1)])
            .await
            .unwrap();
        let second = store
            .create_reservation(owner, &[ticket(&session, 1, 2)])
            .await
            .unwrap();
        store
            .create_reservation(Uuid::new_v4(), &[ticket(&session, 1, 3)])
            .await
            .unwrap();

        let page = store
            .list_reservations(owner, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.results[0].reservation.id, second.reservation.id);
        assert_eq!(page.results[1].reservation.id, first.reservation.id);
        assert_eq!(page.results[0].tickets[0].show_session, session);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let new_user = NewUser {
            email: "astro@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_staff: false,
        };
        store.create_user(new_user.clone()).await.unwrap();
        let err = store.create_user(new_user).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}
