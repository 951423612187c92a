use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShowSession {
    pub id: i64,
    #[serde(rename = "astronomy_show")]
    pub astronomy_show_id: i64,
    #[serde(rename = "planetarium_dome")]
    pub planetarium_dome_id: i64,
    pub show_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShowSession {
    #[serde(rename = "astronomy_show")]
    pub astronomy_show_id: i64,
    #[serde(rename = "planetarium_dome")]
    pub planetarium_dome_id: i64,
    pub show_time: DateTime<Utc>,
}

/// Body of a `PATCH`; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowSessionPatch {
    #[serde(rename = "astronomy_show")]
    pub astronomy_show_id: Option<i64>,
    #[serde(rename = "planetarium_dome")]
    pub planetarium_dome_id: Option<i64>,
    pub show_time: Option<DateTime<Utc>>,
}

impl ShowSessionPatch {
    pub fn apply_to(self, session: &ShowSession) -> NewShowSession {
        NewShowSession {
            astronomy_show_id: self.astronomy_show_id.unwrap_or(session.astronomy_show_id),
            planetarium_dome_id: self
                .planetarium_dome_id
                .unwrap_or(session.planetarium_dome_id),
            show_time: self.show_time.unwrap_or(session.show_time),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// UTC calendar day of `show_time`.
    pub date: Option<NaiveDate>,
    pub astronomy_show_id: Option<i64>,
}

impl SessionFilter {
    pub fn matches(&self, session: &ShowSession) -> bool {
        self.date
            .map_or(true, |date| session.show_time.date_naive() == date)
            && self
                .astronomy_show_id
                .map_or(true, |id| session.astronomy_show_id == id)
    }
}

/// List projection of a session with its derived seat counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ShowSessionSummary {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub astronomy_show_title: String,
    pub planetarium_dome_name: String,
    pub planetarium_dome_capacity: i64,
    pub tickets_available: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Seat {
    pub row: i32,
    pub seat: i32,
}

impl<'r> FromRow<'r, PgRow> for Seat {
    fn from_row(record: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            row: record.try_get("row")?,
            seat: record.try_get("seat")?,
        })
    }
}
