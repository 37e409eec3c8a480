use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role of a team member. Stored as text in the `users` table.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Developer,
    TeamLead,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Developer => "developer",
            UserRole::TeamLead => "team_lead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "manager" => Some(UserRole::Manager),
            "developer" => Some(UserRole::Developer),
            "team_lead" => Some(UserRole::TeamLead),
            _ => None,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub name: String,
    pub role: UserRole,
    /// Soft-delete marker. Inactive users are kept so historical task
    /// references stay resolvable.
    pub active: bool,
    pub created_at: Option<chrono::NaiveDateTime>,
    pub updated_at: Option<chrono::NaiveDateTime>,
}

/// Write payload for creating or updating a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub name: String,
    pub role: UserRole,
}

impl UserInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::validation("name", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            UserRole::Admin,
            UserRole::Manager,
            UserRole::Developer,
            UserRole::TeamLead,
        ] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("intern"), None);
    }

    #[test]
    fn empty_name_is_rejected() {
        let input = UserInput {
            name: "  ".into(),
            role: UserRole::Developer,
        };
        assert!(input.validate().is_err());
    }
}
