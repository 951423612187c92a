use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::auth::{AdminUser, CurrentUser};
use crate::models::{NewPlanetariumDome, PlanetariumDome};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::JsonBody;
use crate::utils::response::{created, success};

#[derive(Debug, Serialize)]
pub struct DomeView {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

impl From<PlanetariumDome> for DomeView {
    fn from(dome: PlanetariumDome) -> Self {
        Self {
            capacity: dome.capacity(),
            id: dome.id,
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
        }
    }
}

/// GET /planetarium-domes
pub async fn list_domes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Response, AppError> {
    let domes: Vec<DomeView> = state
        .store
        .list_domes()
        .await?
        .into_iter()
        .map(DomeView::from)
        .collect();
    Ok(success(domes, "Planetarium domes"))
}

/// POST /planetarium-domes
pub async fn create_dome(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(body): JsonBody<NewPlanetariumDome>,
) -> Result<Response, AppError> {
    body.validate().into_result()?;
    let dome = state
        .store
        .create_dome(NewPlanetariumDome {
            name: body.name.trim().to_string(),
            ..body
        })
        .await?;
    Ok(created(DomeView::from(dome), "Planetarium dome created"))
}
