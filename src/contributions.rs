//! Contribution Aggregator: rolls a filtered, join-enriched task set up
//! into per-user totals, per-project breakdowns, and per-category
//! breakdowns. Pure and deterministic; map keys are ordered so the same
//! input always serializes to the same JSON.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{ContributionRecord, TaskCategory};

/// One task's weighted contribution inside a project rollup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContribution {
    pub id: i32,
    pub title: String,
    pub contribution: f64,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub category: TaskCategory,
}

/// Per-project rollup under one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRollup {
    pub id: i32,
    pub title: String,
    pub difficulty: f64,
    pub total_contribution: f64,
    pub tasks: Vec<TaskContribution>,
}

/// Fixed-key category totals: every known category appears, matched or
/// not, so chart rendering never has to handle missing keys.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryTotals {
    pub op: f64,
    pub h5: f64,
    pub web: f64,
    pub architecture: f64,
}

impl CategoryTotals {
    fn add(&mut self, category: TaskCategory, value: f64) {
        match category {
            TaskCategory::Op => self.op += value,
            TaskCategory::H5 => self.h5 += value,
            TaskCategory::Web => self.web += value,
            TaskCategory::Architecture => self.architecture += value,
        }
    }

    pub fn get(&self, category: TaskCategory) -> f64 {
        match category {
            TaskCategory::Op => self.op,
            TaskCategory::H5 => self.h5,
            TaskCategory::Web => self.web,
            TaskCategory::Architecture => self.architecture,
        }
    }
}

/// Name/value pair for chart rendering.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NameValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContribution {
    pub id: i32,
    pub name: String,
    pub role: String,
    pub total_contribution: f64,
    pub projects: BTreeMap<i32, ProjectRollup>,
    pub project_contributions: Vec<NameValue>,
    pub category_contributions: CategoryTotals,
    pub category_contributions_array: Vec<NameValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionReport {
    pub users: BTreeMap<i32, UserContribution>,
    pub total_contributions: f64,
}

/// Aggregate a flat record set into the nested contribution report.
///
/// Tasks without an assignee are skipped entirely: contribution cannot
/// be attributed to no one. Missing scores and difficulties default (0
/// and 1) rather than failing, so a partially-dirty data set still
/// produces a report.
pub fn aggregate(records: &[ContributionRecord]) -> ContributionReport {
    let mut users: BTreeMap<i32, UserContribution> = BTreeMap::new();

    for record in records {
        let Some(user_id) = record.assigned_to_id else {
            continue;
        };

        let user = users.entry(user_id).or_insert_with(|| UserContribution {
            id: user_id,
            name: record.user_name.clone().unwrap_or_else(|| "Unknown".into()),
            role: record
                .user_role
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "Unknown".into()),
            total_contribution: 0.0,
            projects: BTreeMap::new(),
            project_contributions: Vec::new(),
            category_contributions: CategoryTotals::default(),
            category_contributions_array: Vec::new(),
        });

        let contribution = record.effective_contribution();
        user.total_contribution += contribution;
        user.category_contributions.add(record.category, contribution);

        let project = user
            .projects
            .entry(record.project_id)
            .or_insert_with(|| ProjectRollup {
                id: record.project_id,
                title: record
                    .project_title
                    .clone()
                    .unwrap_or_else(|| "Unknown".into()),
                difficulty: record.project_difficulty.unwrap_or(1.0),
                total_contribution: 0.0,
                tasks: Vec::new(),
            });
        project.total_contribution += contribution;
        project.tasks.push(TaskContribution {
            id: record.id,
            title: record.title.clone(),
            contribution,
            start_date: record.start_date,
            end_date: record.end_date,
            category: record.category,
        });
    }

    // Post-pass: derive the chart arrays from the maps.
    for user in users.values_mut() {
        user.project_contributions = user
            .projects
            .values()
            .map(|p| NameValue {
                name: p.title.clone(),
                value: p.total_contribution,
            })
            .collect();
        user.category_contributions_array = TaskCategory::ALL
            .into_iter()
            .map(|c| NameValue {
                name: c.as_str().to_uppercase(),
                value: user.category_contributions.get(c),
            })
            .collect();
    }

    let total_contributions = users.values().map(|u| u.total_contribution).sum();

    ContributionReport {
        users,
        total_contributions,
    }
}
