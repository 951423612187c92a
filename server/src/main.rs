use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use planetarium_server::config::Config;
use planetarium_server::routes::create_routes;
use planetarium_server::services::accounts;
use planetarium_server::state::AppState;
use planetarium_server::store::{MemoryStore, PgStore, PlanetariumStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("planetarium_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let store: Arc<dyn PlanetariumStore> = match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url, config.max_connections)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Successfully connected to database");

            store.migrate().await.expect("Failed to run migrations");
            tracing::info!("Migrations run successfully");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        accounts::ensure_admin(store.as_ref(), email, password)
            .await
            .expect("Failed to create the admin account");
    }

    let addr = config.bind_addr;
    let app = create_routes(AppState::new(config, store));

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
