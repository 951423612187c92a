use std::collections::BTreeSet;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{AdminUser, CurrentUser};
use crate::models::show::parse_id_list;
use crate::models::{NewAstronomyShow, ShowFilter, ShowTheme, ShowWithThemes};
use crate::services::images;
use crate::state::AppState;
use crate::utils::error::{AppError, FieldErrors};
use crate::utils::extract::{JsonBody, PathId, QueryParams};
use crate::utils::pagination::Pagination;
use crate::utils::response::{created, success};

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Default, Deserialize)]
pub struct ShowListParams {
    pub title: Option<String>,
    /// Comma separated theme ids, e.g. `1,4`.
    pub show_theme: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ShowListParams {
    fn filter(&self) -> Result<ShowFilter, AppError> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string);
        let theme_ids = match self.show_theme.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(parse_id_list(raw)?),
            _ => None,
        };
        Ok(ShowFilter { title, theme_ids })
    }
}

/// List item: themes by name.
#[derive(Debug, Serialize)]
pub struct ShowListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub show_theme: Vec<String>,
    pub image: Option<String>,
}

impl From<ShowWithThemes> for ShowListItem {
    fn from(value: ShowWithThemes) -> Self {
        Self {
            id: value.show.id,
            title: value.show.title,
            description: value.show.description,
            show_theme: value.themes.into_iter().map(|theme| theme.name).collect(),
            image: value.show.image,
        }
    }
}

/// Nested form used inside session details: themes by id.
#[derive(Debug, Serialize)]
pub struct ShowView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub show_theme: Vec<i64>,
    pub image: Option<String>,
}

impl From<ShowWithThemes> for ShowView {
    fn from(value: ShowWithThemes) -> Self {
        Self {
            show_theme: value.theme_ids(),
            id: value.show.id,
            title: value.show.title,
            description: value.show.description,
            image: value.show.image,
        }
    }
}

/// Detail view: full theme objects.
#[derive(Debug, Serialize)]
pub struct ShowDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub show_theme: Vec<ShowTheme>,
    pub image: Option<String>,
}

impl From<ShowWithThemes> for ShowDetail {
    fn from(value: ShowWithThemes) -> Self {
        Self {
            id: value.show.id,
            title: value.show.title,
            description: value.show.description,
            show_theme: value.themes,
            image: value.show.image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShowImage {
    pub id: i64,
    pub image: Option<String>,
}

/// GET /astronomy-shows
pub async fn list_shows(
    State(state): State<AppState>,
    _user: CurrentUser,
    QueryParams(params): QueryParams<ShowListParams>,
) -> Result<Response, AppError> {
    let filter = params.filter()?;
    let pagination = Pagination::from_params(params.page, params.page_size)?;

    let page = state
        .store
        .list_shows(&filter, pagination)
        .await?
        .map(ShowListItem::from);
    Ok(success(page, "Astronomy shows"))
}

/// POST /astronomy-shows
///
/// An `image` key in the body is ignored. Images are attached through the
/// upload endpoint only.
pub async fn create_show(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(body): JsonBody<NewAstronomyShow>,
) -> Result<Response, AppError> {
    body.validate().into_result()?;

    let theme_ids: Vec<i64> = body
        .show_theme
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !theme_ids.is_empty() {
        let known = state.store.find_themes(&theme_ids).await?;
        if let Some(missing) = theme_ids
            .iter()
            .find(|id| !known.iter().any(|theme| theme.id == **id))
        {
            return Err(AppError::InvalidFields(FieldErrors::single(
                "show_theme",
                format!("Invalid pk \"{missing}\" - object does not exist."),
            )));
        }
    }

    let show = state
        .store
        .create_show(NewAstronomyShow {
            title: body.title.trim().to_string(),
            description: body.description.trim().to_string(),
            show_theme: theme_ids,
        })
        .await?;
    info!(show_id = show.show.id, "Astronomy show created");

    Ok(created(ShowDetail::from(show), "Astronomy show created"))
}

/// GET /astronomy-shows/:id
pub async fn get_show(
    State(state): State<AppState>,
    _user: CurrentUser,
    PathId(id): PathId<i64>,
) -> Result<Response, AppError> {
    let show = state
        .store
        .find_show(id)
        .await?
        .ok_or_else(|| show_not_found(id))?;
    Ok(success(ShowDetail::from(show), "Astronomy show"))
}

/// POST /astronomy-shows/:id/upload-image
pub async fn upload_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathId(id): PathId<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    if state.store.find_show(id).await?.is_none() {
        return Err(show_not_found(id));
    }

    let mut multipart = multipart.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let data = read_image_field(&mut multipart).await?;

    let reference = images::store_image(&state.config.media_root, &data).await?;
    let show = state
        .store
        .set_show_image(id, &reference)
        .await?
        .ok_or_else(|| show_not_found(id))?;
    info!(show_id = id, image = %reference, "Astronomy show image uploaded");

    Ok(success(
        ShowImage {
            id: show.id,
            image: show.image,
        },
        "Image uploaded",
    ))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    let invalid =
        |message: String| AppError::InvalidFields(FieldErrors::single(IMAGE_FIELD, message));

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let bytes = field.bytes().await.map_err(|e| invalid(e.body_text()))?;
        if bytes.is_empty() {
            return Err(invalid("The submitted file is empty.".to_string()));
        }
        return Ok(bytes.to_vec());
    }

    Err(invalid("No file was submitted.".to_string()))
}

fn show_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Astronomy show {id} not found"))
}
