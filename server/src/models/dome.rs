use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::show::check_name;
use crate::utils::error::FieldErrors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlanetariumDome {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl PlanetariumDome {
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlanetariumDome {
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl NewPlanetariumDome {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "name", &self.name);
        if self.rows < 1 {
            errors.add("rows", "rows must be greater than 0");
        }
        if self.seats_in_row < 1 {
            errors.add("seats_in_row", "seats_in_row must be greater than 0");
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let dome = PlanetariumDome {
            id: 1,
            name: "Blue".to_string(),
            rows: 20,
            seats_in_row: 15,
        };
        assert_eq!(dome.capacity(), 300);
    }

    #[test]
    fn test_geometry_must_be_positive() {
        let dome = NewPlanetariumDome {
            name: "Blue".to_string(),
            rows: 0,
            seats_in_row: -3,
        };
        let errors = dome.validate();
        assert!(errors.get("rows").is_some());
        assert!(errors.get("seats_in_row").is_some());
        assert!(errors.get("name").is_none());
    }
}
