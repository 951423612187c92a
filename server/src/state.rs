use std::sync::Arc;

use crate::auth::JwtService;
use crate::config::Config;
use crate::store::PlanetariumStore;

/// Shared by every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlanetariumStore>,
    pub jwt: JwtService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn PlanetariumStore>) -> Self {
        let jwt = JwtService::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.jwt_expiration_minutes,
        );
        Self {
            store,
            jwt,
            config: Arc::new(config),
        }
    }
}
