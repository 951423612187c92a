use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::models::user::{normalize_email, validate_credentials};
use crate::models::{NewUser, User};
use crate::store::PlanetariumStore;
use crate::utils::error::AppError;

/// Creates a regular (non-staff) account.
pub async fn register(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    create_account(store, email, password, false).await
}

async fn create_account(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
    is_staff: bool,
) -> Result<User, AppError> {
    validate_credentials(email, password).into_result()?;

    let password_hash = hash_password(password)
        .map_err(|e| AppError::InternalServerError(format!("password hashing failed: {e}")))?;

    let user = store
        .create_user(NewUser {
            email: normalize_email(email),
            password_hash,
            is_staff,
        })
        .await?;

    info!(user_id = %user.id, is_staff, "Account created");
    Ok(user)
}

/// Resolves email and password to a user, or fails with `401`.
pub async fn authenticate(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let invalid = || AppError::AuthError("No active account found with the given credentials".to_string());

    let user = store
        .find_user_by_email(&normalize_email(email))
        .await?
        .ok_or_else(invalid)?;

    if verify_password(password, &user.password_hash) {
        Ok(user)
    } else {
        Err(invalid())
    }
}

/// Creates the configured admin account unless the email is already registered.
pub async fn ensure_admin(
    store: &dyn PlanetariumStore,
    email: &str,
    password: &str,
) -> Result<(), AppError> {
    if store
        .find_user_by_email(&normalize_email(email))
        .await?
        .is_some()
    {
        info!("Admin account already present");
        return Ok(());
    }
    create_account(store, email, password, true).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let store = MemoryStore::new();
        let user = register(&store, "Astro@Example.com", "stargazer42")
            .await
            .unwrap();
        assert_eq!(user.email, "astro@example.com");
        assert!(!user.is_staff);

        let found = authenticate(&store, "astro@example.com", "stargazer42")
            .await
            .unwrap();
        assert_eq!(found.id, user.id);

        let err = authenticate(&store, "astro@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_weak_passwords() {
        let store = MemoryStore::new();
        register(&store, "astro@example.com", "stargazer42")
            .await
            .unwrap();

        let duplicate = register(&store, "ASTRO@example.com", "stargazer42")
            .await
            .unwrap_err();
        assert_eq!(duplicate.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let weak = register(&store, "other@example.com", "short")
            .await
            .unwrap_err();
        assert_eq!(weak.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = MemoryStore::new();
        ensure_admin(&store, "admin@example.com", "adminpass1")
            .await
            .unwrap();
        ensure_admin(&store, "admin@example.com", "adminpass1")
            .await
            .unwrap();

        let admin = store
            .find_user_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_staff);
    }
}
