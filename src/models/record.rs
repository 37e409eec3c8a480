use chrono::NaiveDateTime;
use serde::Serialize;

use super::{TaskCategory, TaskPriority, TaskStatus, UserRole};

/// A task row enriched with project and assignee names via LEFT JOIN,
/// as fetched chunk-by-chunk for spreadsheet export. Join columns are
/// optional: a dangling reference still exports with placeholder names.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct ExportRecord {
    pub id: i32,
    pub title: String,
    pub issue_link: Option<String>,
    pub project_name: Option<String>,
    pub assigned_to_name: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub contribution_score: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
}

/// A task row enriched with the fields the contribution aggregator
/// needs: project difficulty and title, assignee identity.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRecord {
    pub id: i32,
    pub title: String,
    pub project_id: i32,
    pub project_title: Option<String>,
    pub project_difficulty: Option<f64>,
    pub assigned_to_id: Option<i32>,
    pub user_name: Option<String>,
    pub user_role: Option<UserRole>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub contribution_score: Option<f64>,
    pub category: TaskCategory,
}

impl ContributionRecord {
    /// Effective contribution: raw score weighted by project difficulty.
    /// Missing values default (score 0, difficulty 1) so partially-dirty
    /// data still renders rather than failing the whole report.
    pub fn effective_contribution(&self) -> f64 {
        self.contribution_score.unwrap_or(0.0) * self.project_difficulty.unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: Option<f64>, difficulty: Option<f64>) -> ContributionRecord {
        ContributionRecord {
            id: 1,
            title: "t".into(),
            project_id: 1,
            project_title: None,
            project_difficulty: difficulty,
            assigned_to_id: Some(1),
            user_name: None,
            user_role: None,
            start_date: None,
            end_date: None,
            contribution_score: score,
            category: TaskCategory::Op,
        }
    }

    #[test]
    fn effective_contribution_is_score_times_difficulty() {
        assert_eq!(record(Some(3.0), Some(2.5)).effective_contribution(), 7.5);
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        assert_eq!(record(None, Some(2.0)).effective_contribution(), 0.0);
        assert_eq!(record(Some(4.0), None).effective_contribution(), 4.0);
    }
}
