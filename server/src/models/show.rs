use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::error::FieldErrors;

pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShowTheme {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShowTheme {
    pub name: String,
}

impl NewShowTheme {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "name", &self.name);
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AstronomyShow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

/// A show together with its theme tags, ordered by theme id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowWithThemes {
    pub show: AstronomyShow,
    pub themes: Vec<ShowTheme>,
}

impl ShowWithThemes {
    pub fn theme_ids(&self) -> Vec<i64> {
        self.themes.iter().map(|theme| theme.id).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAstronomyShow {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub show_theme: Vec<i64>,
}

impl NewAstronomyShow {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "title", &self.title);
        if self.description.trim().is_empty() {
            errors.add("description", "this field may not be blank");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Matches shows tagged with any of these themes.
    pub theme_ids: Option<Vec<i64>>,
}

impl ShowFilter {
    pub fn matches(&self, show: &ShowWithThemes) -> bool {
        let title_ok = self.title.as_ref().map_or(true, |needle| {
            show.show.title.to_lowercase().contains(&needle.to_lowercase())
        });
        let theme_ok = self.theme_ids.as_ref().map_or(true, |ids| {
            show.themes.iter().any(|theme| ids.contains(&theme.id))
        });
        title_ok && theme_ok
    }
}

/// Parses a comma separated id list such as `1,4`.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, FieldErrors> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                FieldErrors::single("show_theme", format!("'{part}' is not a valid id"))
            })
        })
        .collect()
}

pub(crate) fn check_name(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "this field may not be blank");
    } else if value.chars().count() > MAX_NAME_LEN {
        errors.add(
            field,
            format!("ensure this field has no more than {MAX_NAME_LEN} characters"),
        );
    }
}
