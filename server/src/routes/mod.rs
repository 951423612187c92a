use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    domes, health_check, method_not_allowed, not_found, reservations, sessions, shows, themes, users,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let config = state.config.clone();

    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/token", post(users::obtain_token))
        .route("/me", get(users::me));

    // Shows are write-once: PUT, PATCH and DELETE fall through to 405.
    let show_routes = Router::new()
        .route(
            "/",
            get(shows::list_shows)
                .post(shows::create_show)
                .fallback(method_not_allowed),
        )
        .route("/:id", get(shows::get_show).fallback(method_not_allowed))
        .route(
            "/:id/upload-image",
            post(shows::upload_image)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        );

    let session_routes = Router::new()
        .route(
            "/",
            get(sessions::list_sessions)
                .post(sessions::create_session)
                .fallback(method_not_allowed),
        )
        .route(
            "/:id",
            get(sessions::get_session)
                .put(sessions::replace_session)
                .patch(sessions::update_session)
                .delete(sessions::delete_session)
                .fallback(method_not_allowed),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/users", user_routes)
        .route(
            "/show-themes",
            get(themes::list_themes)
                .post(themes::create_theme)
                .fallback(method_not_allowed),
        )
        .nest("/astronomy-shows", show_routes)
        .route(
            "/planetarium-domes",
            get(domes::list_domes)
                .post(domes::create_dome)
                .fallback(method_not_allowed),
        )
        .nest("/show-sessions", session_routes)
        .route(
            "/reservations",
            get(reservations::list_reservations)
                .post(reservations::create_reservation)
                .fallback(method_not_allowed),
        )
        .nest_service("/media", ServeDir::new(&config.media_root))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(&config))
        .layer(create_cors_layer(&config))
}
