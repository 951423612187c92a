use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3001);
const DEFAULT_JWT_SECRET: &str = "planetarium-development-secret-change-me";
const DEFAULT_JWT_ISSUER: &str = "planetarium-api";
const DEFAULT_JWT_EXPIRATION_MINUTES: i64 = 1440;
const DEFAULT_MEDIA_ROOT: &str = "./media";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiration_minutes: i64,
    pub media_root: PathBuf,
    pub max_upload_bytes: usize,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    /// Enables HSTS.
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let production = env::var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using the development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            database_url: non_empty_var("DATABASE_URL"),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            bind_addr: parse_var("BIND_ADDR", SocketAddr::from(DEFAULT_BIND_ADDR)),
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_JWT_ISSUER.to_string()),
            jwt_expiration_minutes: parse_var(
                "JWT_EXPIRATION_MINUTES",
                DEFAULT_JWT_EXPIRATION_MINUTES,
            ),
            media_root: non_empty_var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT)),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            admin_email: non_empty_var("ADMIN_EMAIL"),
            admin_password: non_empty_var("ADMIN_PASSWORD"),
            cors_allowed_origins: split_origins(
                &env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            production,
        }
    }

    /// Settings for tests and local tooling: in-memory store, fixed secret.
    pub fn for_media_root(media_root: impl Into<PathBuf>) -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            jwt_expiration_minutes: DEFAULT_JWT_EXPIRATION_MINUTES,
            media_root: media_root.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            admin_email: None,
            admin_password: None,
            cors_allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Config: ignoring unparsable {}='{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        std::env::set_var("PLANETARIUM_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var("PLANETARIUM_TEST_PARSE_VAR", 7u32), 7);
        std::env::set_var("PLANETARIUM_TEST_PARSE_VAR", " 12 ");
        assert_eq!(parse_var("PLANETARIUM_TEST_PARSE_VAR", 7u32), 12);
        std::env::remove_var("PLANETARIUM_TEST_PARSE_VAR");
    }

    #[test]
    fn test_split_origins_skips_blanks() {
        assert_eq!(
            split_origins(" http://a.test, ,http://b.test,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_for_media_root_uses_memory_store() {
        let config = Config::for_media_root("/tmp/media");
        assert!(config.database_url.is_none());
        assert_eq!(config.media_root, PathBuf::from("/tmp/media"));
    }
}
