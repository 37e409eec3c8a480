use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lower bound for a task's raw contribution score.
pub const MIN_CONTRIBUTION_SCORE: f64 = -10.0;
/// Upper bound for a task's raw contribution score.
pub const MAX_CONTRIBUTION_SCORE: f64 = 10.0;

/// Lifecycle status of a task. Stored as text in the `tasks` table.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    Developing,
    Testing,
    Online,
    Suspended,
    Canceled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::NotStarted,
        TaskStatus::Developing,
        TaskStatus::Testing,
        TaskStatus::Online,
        TaskStatus::Suspended,
        TaskStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::Developing => "developing",
            TaskStatus::Testing => "testing",
            TaskStatus::Online => "online",
            TaskStatus::Suspended => "suspended",
            TaskStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Listing sort rank: active work first, dead work last.
    pub fn rank(&self) -> i32 {
        match self {
            TaskStatus::Developing => 1,
            TaskStatus::Testing => 2,
            TaskStatus::Online => 3,
            TaskStatus::Suspended => 4,
            TaskStatus::NotStarted => 5,
            TaskStatus::Canceled => 6,
        }
    }
}

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] =
        [TaskPriority::High, TaskPriority::Medium, TaskPriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    pub fn rank(&self) -> i32 {
        match self {
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

/// Work category. The canonical set is the 4-value superset used by the
/// latest filter and export paths.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Op,
    H5,
    Web,
    Architecture,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 4] = [
        TaskCategory::Op,
        TaskCategory::H5,
        TaskCategory::Web,
        TaskCategory::Architecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Op => "op",
            TaskCategory::H5 => "h5",
            TaskCategory::Web => "web",
            TaskCategory::Architecture => "architecture",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    pub fn rank(&self) -> i32 {
        match self {
            TaskCategory::H5 => 1,
            TaskCategory::Op => 2,
            TaskCategory::Web => 3,
            TaskCategory::Architecture => 4,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub issue_link: Option<String>,
    pub project_id: i32,
    pub assigned_to_id: Option<i32>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    /// Raw score in [-10, 10]. The effective contribution
    /// (score x project difficulty) is derived on read, never stored.
    pub contribution_score: f64,
    /// Soft-delete marker.
    pub active: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Write payload for creating or updating a task. Validated before any
/// store access; the store itself does not enforce the score bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,
    pub issue_link: Option<String>,
    pub project_id: i32,
    pub assigned_to_id: Option<i32>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub contribution_score: Option<f64>,
}

impl TaskInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::Error::validation("title", "must not be empty"));
        }
        if let Some(score) = self.contribution_score {
            if !score.is_finite() {
                return Err(crate::Error::validation(
                    "contributionScore",
                    "must be a number",
                ));
            }
            if score < MIN_CONTRIBUTION_SCORE {
                return Err(crate::Error::validation(
                    "contributionScore",
                    format!("must be at least {MIN_CONTRIBUTION_SCORE}"),
                ));
            }
            if score > MAX_CONTRIBUTION_SCORE {
                return Err(crate::Error::validation(
                    "contributionScore",
                    format!("must be at most {MAX_CONTRIBUTION_SCORE}"),
                ));
            }
        }
        Ok(())
    }

    pub fn score(&self) -> f64 {
        self.contribution_score.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(score: Option<f64>) -> TaskInput {
        TaskInput {
            title: "Ship checkout flow".into(),
            issue_link: None,
            project_id: 1,
            assigned_to_id: Some(2),
            status: TaskStatus::Developing,
            priority: TaskPriority::High,
            category: TaskCategory::Web,
            start_date: None,
            end_date: None,
            contribution_score: score,
        }
    }

    #[test]
    fn score_bounds_are_inclusive() {
        assert!(input(Some(-10.0)).validate().is_ok());
        assert!(input(Some(10.0)).validate().is_ok());
        assert!(input(Some(-10.01)).validate().is_err());
        assert!(input(Some(10.01)).validate().is_err());
        assert!(input(None).validate().is_ok());
        assert_eq!(input(None).score(), 0.0);
    }

    #[test]
    fn priority_ranks_high_before_low() {
        assert!(TaskPriority::High.rank() < TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() < TaskPriority::Low.rank());
    }

    #[test]
    fn status_ranks_active_work_first() {
        let ranked: Vec<_> = {
            let mut all = TaskStatus::ALL;
            all.sort_by_key(|s| s.rank());
            all.into_iter().map(|s| s.as_str()).collect()
        };
        assert_eq!(
            ranked,
            [
                "developing",
                "testing",
                "online",
                "suspended",
                "not_started",
                "canceled"
            ]
        );
    }

    #[test]
    fn enum_parse_rejects_unknown_values() {
        assert_eq!(TaskStatus::parse("archived"), None);
        assert_eq!(TaskCategory::parse("mobile"), None);
        assert_eq!(TaskPriority::parse("urgent"), None);
    }
}
