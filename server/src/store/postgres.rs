use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::models::{
    AstronomyShow, NewAstronomyShow, NewPlanetariumDome, NewShowSession, NewShowTheme, NewTicket,
    NewUser, PlanetariumDome, Reservation, ReservationListing, ReservationWithTickets, Seat,
    SessionFilter, ShowFilter, ShowSession, ShowSessionSummary, ShowTheme, ShowWithThemes, Ticket,
    TicketWithSession, User,
};
use crate::store::{PlanetariumStore, StoreError, StoreResult};
use crate::utils::pagination::{Page, Pagination};

const SHOW_FILTER: &str = r#"
    ($1::TEXT IS NULL OR s.title ILIKE '%' || $1 || '%')
    AND ($2::BIGINT[] IS NULL OR EXISTS (
        SELECT 1 FROM astronomy_show_themes st
        WHERE st.astronomy_show_id = s.id AND st.show_theme_id = ANY($2)
    ))
"#;

#[derive(FromRow)]
struct ShowThemeLink {
    astronomy_show_id: i64,
    id: i64,
    name: String,
}

struct TicketSessionRow {
    id: i64,
    row: i32,
    seat: i32,
    reservation_id: i64,
    show_session_id: i64,
    astronomy_show_id: i64,
    planetarium_dome_id: i64,
    show_time: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TicketSessionRow {
    fn from_row(record: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: record.try_get("id")?,
            row: record.try_get("row")?,
            seat: record.try_get("seat")?,
            reservation_id: record.try_get("reservation_id")?,
            show_session_id: record.try_get("show_session_id")?,
            astronomy_show_id: record.try_get("astronomy_show_id")?,
            planetarium_dome_id: record.try_get("planetarium_dome_id")?,
            show_time: record.try_get("show_time")?,
        })
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    async fn attach_themes(&self, shows: Vec<AstronomyShow>) -> StoreResult<Vec<ShowWithThemes>> {
        let ids: Vec<i64> = shows.iter().map(|show| show.id).collect();
        let links: Vec<ShowThemeLink> = sqlx::query_as(
            r#"
            SELECT st.astronomy_show_id, t.id, t.name
            FROM astronomy_show_themes st
            JOIN show_themes t ON t.id = st.show_theme_id
            WHERE st.astronomy_show_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_show: HashMap<i64, Vec<ShowTheme>> = HashMap::new();
        for link in links {
            by_show
                .entry(link.astronomy_show_id)
                .or_default()
                .push(ShowTheme {
                    id: link.id,
                    name: link.name,
                });
        }

        Ok(shows
            .into_iter()
            .map(|show| ShowWithThemes {
                themes: by_show.remove(&show.id).unwrap_or_default(),
                show,
            })
            .collect())
    }
}

/// Escapes LIKE metacharacters so user input matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl PlanetariumStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, is_staff)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, is_staff, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict {
                    field: "email".to_string(),
                    message: "a user with this email already exists".to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            "SELECT id, email, password_hash, is_staff, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            "SELECT id, email, password_hash, is_staff, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_theme(&self, theme: NewShowTheme) -> StoreResult<ShowTheme> {
        let theme = sqlx::query_as("INSERT INTO show_themes (name) VALUES ($1) RETURNING id, name")
            .bind(&theme.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(theme)
    }

    async fn list_themes(&self) -> StoreResult<Vec<ShowTheme>> {
        let themes = sqlx::query_as("SELECT id, name FROM show_themes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(themes)
    }

    async fn find_themes(&self, ids: &[i64]) -> StoreResult<Vec<ShowTheme>> {
        let themes =
            sqlx::query_as("SELECT id, name FROM show_themes WHERE id = ANY($1) ORDER BY id")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(themes)
    }

    async fn create_show(&self, show: NewAstronomyShow) -> StoreResult<ShowWithThemes> {
        let mut tx = self.pool.begin().await?;

        let created: AstronomyShow = sqlx::query_as(
            r#"
            INSERT INTO astronomy_shows (title, description)
            VALUES ($1, $2)
            RETURNING id, title, description, image
            "#,
        )
        .bind(&show.title)
        .bind(&show.description)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO astronomy_show_themes (astronomy_show_id, show_theme_id)
            SELECT $1, t.id FROM show_themes t WHERE t.id = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(created.id)
        .bind(&show.show_theme)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut shows = self.attach_themes(vec![created]).await?;
        shows.pop().ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn list_shows(
        &self,
        filter: &ShowFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<ShowWithThemes>> {
        let title = filter.title.as_deref().map(escape_like);

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM astronomy_shows s WHERE {SHOW_FILTER}"
        ))
        .bind(&title)
        .bind(&filter.theme_ids)
        .fetch_one(&self.pool)
        .await?;

        let shows: Vec<AstronomyShow> = sqlx::query_as(&format!(
            r#"
            SELECT s.id, s.title, s.description, s.image
            FROM astronomy_shows s
            WHERE {SHOW_FILTER}
            ORDER BY s.id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(&title)
        .bind(&filter.theme_ids)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let results = self.attach_themes(shows).await?;
        Ok(Page::new(count, pagination, results))
    }

    async fn find_show(&self, id: i64) -> StoreResult<Option<ShowWithThemes>> {
        let show: Option<AstronomyShow> = sqlx::query_as(
            "SELECT id, title, description, image FROM astronomy_shows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match show {
            Some(show) => Ok(self.attach_themes(vec![show]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn set_show_image(&self, id: i64, image: &str) -> StoreResult<Option<AstronomyShow>> {
        let show = sqlx::query_as(
            r#"
            UPDATE astronomy_shows SET image = $2 WHERE id = $1
            RETURNING id, title, description, image
            "#,
        )
        .bind(id)
        .bind(image)
        .fetch_optional(&self.pool)
        .await?;
        Ok(show)
    }

    async fn create_dome(&self, dome: NewPlanetariumDome) -> StoreResult<PlanetariumDome> {
        let dome = sqlx::query_as(
            r#"
            INSERT INTO planetarium_domes (name, "rows", seats_in_row)
            VALUES ($1, $2, $3)
            RETURNING id, name, "rows", seats_in_row
            "#,
        )
        .bind(&dome.name)
        .bind(dome.rows)
        .bind(dome.seats_in_row)
        .fetch_one(&self.pool)
        .await?;
        Ok(dome)
    }

    async fn list_domes(&self) -> StoreResult<Vec<PlanetariumDome>> {
        let domes = sqlx::query_as(
            r#"SELECT id, name, "rows", seats_in_row FROM planetarium_domes ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(domes)
    }

    async fn find_dome(&self, id: i64) -> StoreResult<Option<PlanetariumDome>> {
        let dome = sqlx::query_as(
            r#"SELECT id, name, "rows", seats_in_row FROM planetarium_domes WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(dome)
    }

    async fn create_session(&self, session: NewShowSession) -> StoreResult<ShowSession> {
        let session = sqlx::query_as(
            r#"
            INSERT INTO show_sessions (astronomy_show_id, planetarium_dome_id, show_time)
            VALUES ($1, $2, $3)
            RETURNING id, astronomy_show_id, planetarium_dome_id, show_time
            "#,
        )
        .bind(session.astronomy_show_id)
        .bind(session.planetarium_dome_id)
        .bind(session.show_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn update_session(
        &self,
        id: i64,
        session: NewShowSession,
    ) -> StoreResult<Option<ShowSession>> {
        let session = sqlx::query_as(
            r#"
            UPDATE show_sessions
            SET astronomy_show_id = $2, planetarium_dome_id = $3, show_time = $4
            WHERE id = $1
            RETURNING id, astronomy_show_id, planetarium_dome_id, show_time
            "#,
        )
        .bind(id)
        .bind(session.astronomy_show_id)
        .bind(session.planetarium_dome_id)
        .bind(session.show_time)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM show_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_session(&self, id: i64) -> StoreResult<Option<ShowSession>> {
        let session = sqlx::query_as(
            r#"
            SELECT id, astronomy_show_id, planetarium_dome_id, show_time
            FROM show_sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<ShowSessionSummary>> {
        let sessions = sqlx::query_as(
            r#"
            SELECT
                ss.id,
                ss.show_time,
                a.title AS astronomy_show_title,
                d.name AS planetarium_dome_name,
                (d."rows"::BIGINT * d.seats_in_row) AS planetarium_dome_capacity,
                (d."rows"::BIGINT * d.seats_in_row - COUNT(t.id)) AS tickets_available
            FROM show_sessions ss
            JOIN astronomy_shows a ON a.id = ss.astronomy_show_id
            JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
            LEFT JOIN tickets t ON t.show_session_id = ss.id
            WHERE ($1::DATE IS NULL OR (ss.show_time AT TIME ZONE 'UTC')::DATE = $1)
              AND ($2::BIGINT IS NULL OR ss.astronomy_show_id = $2)
            GROUP BY ss.id, a.title, d.name, d."rows", d.seats_in_row
            ORDER BY ss.show_time, ss.id
            "#,
        )
        .bind(filter.date)
        .bind(filter.astronomy_show_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn session_dome(&self, session_id: i64) -> StoreResult<Option<PlanetariumDome>> {
        let dome = sqlx::query_as(
            r#"
            SELECT d.id, d.name, d."rows", d.seats_in_row
            FROM show_sessions ss
            JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
            WHERE ss.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(dome)
    }

    async fn taken_seats(&self, session_id: i64) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as(
            r#"
            SELECT "row", seat FROM tickets
            WHERE show_session_id = $1
            ORDER BY "row", seat
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn create_reservation(
        &self,
        user_id: Uuid,
        tickets: &[NewTicket],
    ) -> StoreResult<ReservationWithTickets> {
        // Dropping `tx` on any early return rolls the whole batch back.
        let mut tx = self.pool.begin().await?;

        let reservation: Reservation = sqlx::query_as(
            "INSERT INTO reservations (user_id) VALUES ($1) RETURNING id, created_at, user_id",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(tickets.len());
        for (index, ticket) in tickets.iter().enumerate() {
            let inserted = sqlx::query_as::<_, Ticket>(
                r#"
                INSERT INTO tickets ("row", seat, show_session_id, reservation_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, "row", seat, show_session_id, reservation_id
                "#,
            )
            .bind(ticket.row)
            .bind(ticket.seat)
            .bind(ticket.show_session_id)
            .bind(reservation.id)
            .fetch_one(&mut *tx)
            .await;

            match inserted {
                Ok(ticket) => created.push(ticket),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    return Err(StoreError::SeatTaken {
                        index,
                        show_session: ticket.show_session_id,
                        row: ticket.row,
                        seat: ticket.seat,
                    });
                }
                Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                    return Err(StoreError::UnknownSession {
                        index,
                        show_session: ticket.show_session_id,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;

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
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let reservations: Vec<Reservation> = sqlx::query_as(
            r#"
            SELECT id, created_at, user_id FROM reservations
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = reservations.iter().map(|r| r.id).collect();
        let rows: Vec<TicketSessionRow> = sqlx::query_as(
            r#"
            SELECT
                t.id, t."row", t.seat, t.reservation_id,
                ss.id AS show_session_id, ss.astronomy_show_id, ss.planetarium_dome_id, ss.show_time
            FROM tickets t
            JOIN show_sessions ss ON ss.id = t.show_session_id
            WHERE t.reservation_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_reservation: HashMap<i64, Vec<TicketWithSession>> = HashMap::new();
        for row in rows {
            by_reservation
                .entry(row.reservation_id)
                .or_default()
                .push(TicketWithSession {
                    id: row.id,
                    row: row.row,
                    seat: row.seat,
                    show_session: ShowSession {
                        id: row.show_session_id,
                        astronomy_show_id: row.astronomy_show_id,
                        planetarium_dome_id: row.planetarium_dome_id,
                        show_time: row.show_time,
                    },
                    reservation_id: row.reservation_id,
                });
        }

        let results = reservations
            .into_iter()
            .map(|reservation| ReservationListing {
                tickets: by_reservation.remove(&reservation.id).unwrap_or_default(),
                reservation,
            })
            .collect();
        Ok(Page::new(count, pagination, results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_decodes_from_pg_row<T: for<'r> FromRow<'r, PgRow>>() {}

    #[test]
    fn test_seat_grid_rows_decode() {
        assert_decodes_from_pg_row::<Seat>();
        assert_decodes_from_pg_row::<Ticket>();
        assert_decodes_from_pg_row::<TicketSessionRow>();
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("stars"), "stars");
    }
}
