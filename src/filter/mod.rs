//! Filter Builder: turns raw string query parameters into typed
//! predicate value-objects. Pure transformation; the store-specific SQL
//! translation lives in `db`, not here.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::models::{TaskCategory, TaskPriority, TaskStatus};

/// One independent membership test over the task store. A predicate set
/// is AND-ed together; an empty set matches everything (subject to the
/// default active-only filter applied by the query service).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    AssignedTo(Vec<i32>),
    Project(Vec<i32>),
    Status(Vec<TaskStatus>),
    Priority(Vec<TaskPriority>),
    Category(Vec<TaskCategory>),
    /// Inclusion-biased date window: a task matches if its start date
    /// _or_ its end date falls inside the (possibly half-open) range.
    DateRange {
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    },
}

/// Build the predicate set for a raw query-parameter map.
///
/// Multi-valued keys (`assignedToId`, `projectId`, `status`, `priority`,
/// `category`) are comma-split; an absent or empty key contributes no
/// predicate. `startDate`/`endDate` are ISO-8601 dates; the end bound is
/// widened to 23:59:59.999 so the whole final calendar day is included.
pub fn build_predicates(params: &HashMap<String, String>) -> Result<Vec<Predicate>> {
    let mut predicates = Vec::new();

    // The aggregation surface calls this key `userId`; same predicate.
    let (assigned_key, assigned_raw) = match params.get("assignedToId") {
        Some(raw) => ("assignedToId", Some(raw)),
        None => ("userId", params.get("userId")),
    };
    let assigned = parse_id_list(assigned_raw, assigned_key)?;
    if !assigned.is_empty() {
        predicates.push(Predicate::AssignedTo(assigned));
    }

    let projects = parse_id_list(params.get("projectId"), "projectId")?;
    if !projects.is_empty() {
        predicates.push(Predicate::Project(projects));
    }

    let start = params
        .get("startDate")
        .filter(|s| !s.is_empty())
        .map(|s| parse_date(s, "startDate"))
        .transpose()?
        .map(start_of_day);
    let end = params
        .get("endDate")
        .filter(|s| !s.is_empty())
        .map(|s| parse_date(s, "endDate"))
        .transpose()?
        .map(end_of_day);
    if start.is_some() || end.is_some() {
        predicates.push(Predicate::DateRange { start, end });
    }

    let statuses = parse_enum_list(params.get("status"), "status", TaskStatus::parse)?;
    if !statuses.is_empty() {
        predicates.push(Predicate::Status(statuses));
    }

    let priorities = parse_enum_list(params.get("priority"), "priority", TaskPriority::parse)?;
    if !priorities.is_empty() {
        predicates.push(Predicate::Priority(priorities));
    }

    let categories = parse_enum_list(params.get("category"), "category", TaskCategory::parse)?;
    if !categories.is_empty() {
        predicates.push(Predicate::Category(categories));
    }

    Ok(predicates)
}

fn split_values(raw: Option<&String>) -> impl Iterator<Item = &str> {
    raw.map(|s| s.as_str())
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_id_list(raw: Option<&String>, field: &'static str) -> Result<Vec<i32>> {
    split_values(raw)
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| Error::validation(field, format!("invalid id '{v}'")))
        })
        .collect()
}

fn parse_enum_list<T>(
    raw: Option<&String>,
    field: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Vec<T>> {
    split_values(raw)
        .map(|v| parse(v).ok_or_else(|| Error::validation(field, format!("unknown value '{v}'"))))
        .collect()
}

fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate> {
    // Accept a bare date or a full ISO-8601 timestamp; only the calendar
    // date matters for range bounds.
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| Error::validation(field, format!("invalid date '{raw}'")))
}

fn start_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_milli_opt(0, 0, 0, 0).unwrap_or(NaiveDateTime::MIN)
}

fn end_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or(NaiveDateTime::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_params_produce_no_predicates() {
        assert!(build_predicates(&params(&[])).unwrap().is_empty());
        // Present-but-empty keys are also "no filter".
        let preds = build_predicates(&params(&[("status", ""), ("projectId", "")])).unwrap();
        assert!(preds.is_empty());
    }

    #[test]
    fn multi_values_are_comma_split() {
        let preds = build_predicates(&params(&[
            ("assignedToId", "3,5"),
            ("status", "developing,testing"),
            ("priority", "high"),
            ("category", "op,h5,web"),
        ]))
        .unwrap();

        assert_eq!(preds.len(), 4);
        assert_eq!(preds[0], Predicate::AssignedTo(vec![3, 5]));
        assert_eq!(
            preds[1],
            Predicate::Status(vec![TaskStatus::Developing, TaskStatus::Testing])
        );
        assert_eq!(preds[2], Predicate::Priority(vec![TaskPriority::High]));
        assert_eq!(
            preds[3],
            Predicate::Category(vec![TaskCategory::Op, TaskCategory::H5, TaskCategory::Web])
        );
    }

    #[test]
    fn user_id_is_an_alias_for_assigned_to_id() {
        let preds = build_predicates(&params(&[("userId", "4")])).unwrap();
        assert_eq!(preds, vec![Predicate::AssignedTo(vec![4])]);
    }

    #[test]
    fn stray_commas_are_ignored() {
        let preds = build_predicates(&params(&[("projectId", "1,,2, ")])).unwrap();
        assert_eq!(preds, vec![Predicate::Project(vec![1, 2])]);
    }

    #[test]
    fn end_date_covers_the_whole_final_day() {
        let preds = build_predicates(&params(&[
            ("startDate", "2024-04-01"),
            ("endDate", "2024-04-30"),
        ]))
        .unwrap();

        let expected_start = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let expected_end = NaiveDate::from_ymd_opt(2024, 4, 30)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap();
        assert_eq!(
            preds,
            vec![Predicate::DateRange {
                start: Some(expected_start),
                end: Some(expected_end),
            }]
        );
    }

    #[test]
    fn task_ending_inside_the_window_matches_despite_an_earlier_start() {
        // April window; the task ran 2024-03-20 through 2024-04-05. Its
        // start is outside the window, its end inside, so the
        // either-field semantics must include it.
        let preds = build_predicates(&params(&[
            ("startDate", "2024-04-01"),
            ("endDate", "2024-04-30"),
        ]))
        .unwrap();
        let Predicate::DateRange {
            start: Some(lo),
            end: Some(hi),
        } = &preds[0]
        else {
            panic!("expected a bounded date range, got {:?}", preds[0]);
        };
        let (lo, hi) = (*lo, *hi);

        let task_start = NaiveDate::from_ymd_opt(2024, 3, 20)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let task_end = NaiveDate::from_ymd_opt(2024, 4, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let in_window = |d: NaiveDateTime| lo <= d && d <= hi;
        assert!(!in_window(task_start));
        assert!(in_window(task_end));
        assert!(in_window(task_start) || in_window(task_end));
    }

    #[test]
    fn half_open_ranges_are_allowed() {
        let preds = build_predicates(&params(&[("endDate", "2024-12-31")])).unwrap();
        assert!(matches!(
            preds[0],
            Predicate::DateRange {
                start: None,
                end: Some(_)
            }
        ));
    }

    #[test]
    fn timestamps_are_truncated_to_their_date() {
        let preds =
            build_predicates(&params(&[("startDate", "2024-04-01T15:30:00Z")])).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            preds,
            vec![Predicate::DateRange {
                start: Some(expected),
                end: None,
            }]
        );
    }

    #[test]
    fn malformed_values_are_validation_errors() {
        for (key, value) in [
            ("assignedToId", "abc"),
            ("projectId", "1,x"),
            ("status", "archived"),
            ("priority", "urgent"),
            ("category", "mobile"),
            ("startDate", "04/01/2024"),
            ("endDate", "not-a-date"),
        ] {
            let err = build_predicates(&params(&[(key, value)])).unwrap_err();
            match err {
                Error::Validation { field, .. } => assert_eq!(field, key),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }
}
