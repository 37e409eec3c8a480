use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    /// Weighting factor applied to every task's contribution score under
    /// this project. Typically in [0.1, 5.0].
    pub difficulty_multiplier: f64,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Write payload for creating or updating a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub title: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub difficulty_multiplier: Option<f64>,
}

impl ProjectInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::Error::validation("title", "must not be empty"));
        }
        if let Some(m) = self.difficulty_multiplier {
            if !(m.is_finite() && m > 0.0) {
                return Err(crate::Error::validation(
                    "difficultyMultiplier",
                    "must be a positive number",
                ));
            }
        }
        Ok(())
    }

    pub fn multiplier(&self) -> f64 {
        self.difficulty_multiplier.unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_defaults_to_one() {
        let input = ProjectInput {
            title: "Platform".into(),
            description: None,
            logo: None,
            difficulty_multiplier: None,
        };
        assert!(input.validate().is_ok());
        assert_eq!(input.multiplier(), 1.0);
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        for bad in [0.0, -1.5, f64::NAN] {
            let input = ProjectInput {
                title: "Platform".into(),
                description: None,
                logo: None,
                difficulty_multiplier: Some(bad),
            };
            assert!(input.validate().is_err());
        }
    }
}
