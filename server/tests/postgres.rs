//! Store tests against a live PostgreSQL database.
//!
//! Ignored by default because they need a database. Run with:
//! `DATABASE_URL=postgres://... cargo test --test postgres -- --ignored`
//!
//! Every test creates its own shows, domes, sessions and users, so they can
//! share one database and run in parallel.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use planetarium_server::models::{
    NewAstronomyShow, NewPlanetariumDome, NewShowSession, NewShowTheme, NewTicket, NewUser,
    SessionFilter, ShowFilter, ShowSession,
};
use planetarium_server::services::reservations;
use planetarium_server::store::{PgStore, PlanetariumStore, StoreError};
use planetarium_server::utils::pagination::Pagination;

async fn store() -> Arc<PgStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");
    let store = PgStore::connect(&url, 10).await.unwrap();
    store.migrate().await.unwrap();
    Arc::new(store)
}

fn tag() -> String {
    Uuid::new_v4().simple().to_string()
}

async fn user(store: &PgStore) -> Uuid {
    store
        .create_user(NewUser {
            email: format!("{}@example.com", tag()),
            password_hash: "not-a-real-hash".to_string(),
            is_staff: false,
        })
        .await
        .unwrap()
        .id
}

/// A fresh show, a 20 x 20 dome and one session of it at `show_time`.
async fn session_at(store: &PgStore, show_time: chrono::DateTime<Utc>) -> ShowSession {
    let show = store
        .create_show(NewAstronomyShow {
            title: format!("Sample astronomy show {}", tag()),
            description: "Sample description".to_string(),
            show_theme: vec![],
        })
        .await
        .unwrap();
    let dome = store
        .create_dome(NewPlanetariumDome {
            name: format!("Blue {}", tag()),
            rows: 20,
            seats_in_row: 20,
        })
        .await
        .unwrap();
    store
        .create_session(NewShowSession {
            astronomy_show_id: show.show.id,
            planetarium_dome_id: dome.id,
            show_time,
        })
        .await
        .unwrap()
}

fn ticket(session: &ShowSession, row: i32, seat: i32) -> NewTicket {
    NewTicket {
        row,
        seat,
        show_session_id: session.id,
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at DATABASE_URL
async fn test_reservation_round_trips_tickets() {
    let store = store().await;
    let owner = user(&store).await;
    let session = session_at(&store, Utc::now()).await;

    let created = store
        .create_reservation(owner, &[ticket(&session, 1, 1), ticket(&session, 1, 2)])
        .await
        .unwrap();
    assert_eq!(created.tickets.len(), 2);
    assert_eq!(created.tickets[0].row, 1);

    let taken = store.taken_seats(session.id).await.unwrap();
    assert_eq!(taken.len(), 2);
    assert_eq!((taken[1].row, taken[1].seat), (1, 2));

    let listing = store
        .list_reservations(owner, Pagination::default())
        .await
        .unwrap();
    assert_eq!(listing.count, 1);
    assert_eq!(listing.results[0].tickets[0].show_session.id, session.id);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at DATABASE_URL
async fn test_taken_seat_maps_to_seat_taken_and_rolls_back() {
    let store = store().await;
    let session = session_at(&store, Utc::now()).await;

    store
        .create_reservation(user(&store).await, &[ticket(&session, 5, 5)])
        .await
        .unwrap();

    let err = store
        .create_reservation(
            user(&store).await,
            &[ticket(&session, 5, 6), ticket(&session, 5, 5)],
        )
        .await
        .unwrap_err();
    match err {
        StoreError::SeatTaken {
            index, row, seat, ..
        } => assert_eq!((index, row, seat), (1, 5, 5)),
        other => panic!("unexpected error: {other:?}"),
    }

    // (5, 6) was inserted before the failure and must be gone with it.
    let taken = store.taken_seats(session.id).await.unwrap();
    assert_eq!(taken.len(), 1);
    assert_eq!((taken[0].row, taken[0].seat), (5, 5));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at DATABASE_URL
async fn test_missing_session_maps_to_unknown_session() {
    let store = store().await;
    let session = session_at(&store, Utc::now()).await;

    let err = store
        .create_reservation(
            user(&store).await,
            &[
                ticket(&session, 1, 1),
                NewTicket {
                    row: 1,
                    seat: 1,
                    show_session_id: i64::MAX,
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnknownSession { index: 1, show_session } if show_session == i64::MAX
    ));
    assert!(store.taken_seats(session.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at DATABASE_URL
async fn test_concurrent_claims_commit_one_ticket() {
    let store = store().await;
    let session = session_at(&store, Utc::now()).await;

    let mut users = Vec::new();
    for _ in 0..8 {
        users.push(user(&store).await);
    }

    let attempts: Vec<_> = users
        .into_iter()
        .map(|owner| {
            let store = Arc::clone(&store);
            let request = [ticket(&session, 7, 7)];
            tokio::spawn(async move {
                reservations::create_reservation(&*store, owner, &request).await
            })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        if attempt.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.taken_seats(session.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at DATABASE_URL
async fn test_session_summary_counts_and_utc_date_filter() {
    let store = store().await;
    // 23:30 UTC: still June 2nd in UTC whatever the server's time zone.
    let show_time = Utc.with_ymd_and_hms(2031, 6, 2, 23, 30, 0).unwrap();
    let session = session_at(&store, show_time).await;
    store
        .create_reservation(
            user(&store).await,
            &[ticket(&session, 1, 1), ticket(&session, 2, 2), ticket(&session, 3, 3)],
        )
        .await
        .unwrap();

    let filter = SessionFilter {
        date: NaiveDate::from_ymd_opt(2031, 6, 2),
        astronomy_show_id: Some(session.astronomy_show_id),
    };
    let sessions = store.list_sessions(&filter).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].planetarium_dome_capacity, 400);
    assert_eq!(sessions[0].tickets_available, 397);

    let next_day = SessionFilter {
        date: Some((show_time + Duration::days(1)).date_naive()),
        astronomy_show_id: Some(session.astronomy_show_id),
    };
    assert!(store.list_sessions(&next_day).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL at DATABASE_URL
async fn test_show_filter_by_title_and_themes() {
    let store = store().await;
    let marker = tag();
    let theme = store
        .create_theme(NewShowTheme {
            name: format!("Nebulae {marker}"),
        })
        .await
        .unwrap();

    let tagged = store
        .create_show(NewAstronomyShow {
            title: format!("NEBULA {}", marker.to_uppercase()),
            description: "d".to_string(),
            show_theme: vec![theme.id],
        })
        .await
        .unwrap();
    store
        .create_show(NewAstronomyShow {
            title: format!("nebula {marker}"),
            description: "d".to_string(),
            show_theme: vec![],
        })
        .await
        .unwrap();

    let by_title = store
        .list_shows(
            &ShowFilter {
                title: Some(marker.clone()),
                theme_ids: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_title.count, 2);

    let by_theme = store
        .list_shows(
            &ShowFilter {
                title: Some(marker.clone()),
                theme_ids: Some(vec![theme.id]),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_theme.count, 1);
    assert_eq!(by_theme.results[0].show.id, tagged.show.id);
    assert_eq!(by_theme.results[0].theme_ids(), vec![theme.id]);

    // LIKE metacharacters match literally.
    let literal = store
        .list_shows(
            &ShowFilter {
                title: Some(format!("%{marker}")),
                theme_ids: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(literal.count, 0);
}
