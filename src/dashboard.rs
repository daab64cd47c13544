//! Project dashboard figures, computed from already loaded rows.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::db::repos::{column::Column, issue::Issue};
use crate::domain::{parse_or, ColumnCategory, IssueType, Priority};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicProgress {
    pub epic_id: String,
    pub key: String,
    pub title: String,
    pub total: usize,
    pub done: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    pub total_issues: usize,
    pub backlog_issues: usize,
    pub todo_issues: usize,
    pub in_progress_issues: usize,
    pub done_issues: usize,
    pub unassigned_issues: usize,
    pub overdue_issues: usize,
    pub story_points_total: i64,
    pub story_points_done: i64,
    pub by_priority: Vec<(Priority, usize)>,
    pub by_type: Vec<(IssueType, usize)>,
    pub epics: Vec<EpicProgress>,
}

pub fn summarize(columns: &[Column], issues: &[Issue], now: NaiveDateTime) -> Summary {
    let categories: HashMap<&str, ColumnCategory> = columns
        .iter()
        .map(|column| (column.id.as_str(), parse_or(&column.category, ColumnCategory::Todo)))
        .collect();
    let category_of = |issue: &Issue| {
        issue
            .column_id
            .as_deref()
            .and_then(|column_id| categories.get(column_id).copied())
    };
    let is_done = |issue: &Issue| category_of(issue) == Some(ColumnCategory::Done);

    let mut summary = Summary {
        total_issues: issues.len(),
        by_priority: Priority::ALL.iter().map(|priority| (*priority, 0)).collect(),
        by_type: IssueType::ALL.iter().map(|issue_type| (*issue_type, 0)).collect(),
        ..Default::default()
    };

    for issue in issues {
        match category_of(issue) {
            None => summary.backlog_issues += 1,
            Some(ColumnCategory::Todo) => summary.todo_issues += 1,
            Some(ColumnCategory::InProgress) => summary.in_progress_issues += 1,
            Some(ColumnCategory::Done) => summary.done_issues += 1,
        }
        if issue.assignee_id.is_none() {
            summary.unassigned_issues += 1;
        }
        if issue.due_date.is_some_and(|due| due < now) && !is_done(issue) {
            summary.overdue_issues += 1;
        }

        let points = i64::from(issue.story_points.unwrap_or(0));
        summary.story_points_total += points;
        if is_done(issue) {
            summary.story_points_done += points;
        }

        let priority = parse_or(&issue.priority, Priority::Medium);
        if let Some(entry) = summary.by_priority.iter_mut().find(|(p, _)| *p == priority) {
            entry.1 += 1;
        }
        let issue_type = parse_or(&issue.issue_type, IssueType::Task);
        if let Some(entry) = summary.by_type.iter_mut().find(|(t, _)| *t == issue_type) {
            entry.1 += 1;
        }
    }

    summary.epics = issues
        .iter()
        .filter(|issue| parse_or(&issue.issue_type, IssueType::Task) == IssueType::Epic)
        .map(|epic| {
            let children: Vec<&Issue> = issues
                .iter()
                .filter(|issue| issue.parent_id.as_deref() == Some(epic.id.as_str()))
                .collect();
            let done = children.iter().filter(|child| is_done(**child)).count();
            let percent = if children.is_empty() {
                0
            } else {
                (done * 100 / children.len()) as u32
            };
            EpicProgress {
                epic_id: epic.id.clone(),
                key: epic.key.clone(),
                title: epic.title.clone(),
                total: children.len(),
                done,
                percent,
            }
        })
        .collect();

    summary
}
