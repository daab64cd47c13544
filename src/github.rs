//! Links GitHub branches, pull requests and commits to issues whose keys
//! appear in them.

use std::sync::OnceLock;

use chrono::Utc;
use diesel::SqliteConnection;
use regex::Regex;
use tracing::info;

use crate::db::{
    repos::{
        github_link::{GithubLink, NewGithubLink},
        issue::Issue,
    },
    transaction::atomically,
};
use crate::domain::LinkKind;
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct GithubEvent {
    pub kind: LinkKind,
    pub reference: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: String,
}

fn issue_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Z]+-\d+").expect("issue key pattern is valid"))
}

/// Issue keys mentioned in `texts`, first occurrence first, without repeats.
pub fn extract_issue_keys<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for text in texts {
        for found in issue_key_pattern().find_iter(text) {
            if !keys.iter().any(|key| key == found.as_str()) {
                keys.push(found.as_str().to_string());
            }
        }
    }
    keys
}

/// Issues of the organization carrying any of `keys`. Unknown keys are
/// skipped.
pub fn find_issues_by_keys(
    conn: &mut SqliteConnection,
    organization_id: &str,
    keys: &[String],
) -> Result<Vec<Issue>, ServiceError> {
    Issue::find_by_keys(conn, organization_id, keys)
}

/// Attaches the event to every issue it mentions and returns the keys that
/// resolved, in the order they were mentioned.
pub fn ingest(
    conn: &mut SqliteConnection,
    organization_id: &str,
    event: &GithubEvent,
) -> Result<Vec<String>, ServiceError> {
    let texts = [Some(event.reference.as_str()), event.title.as_deref(), event.body.as_deref()];
    let keys = extract_issue_keys(texts.into_iter().flatten());
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    atomically(conn, |conn| {
        let issues = find_issues_by_keys(conn, organization_id, &keys)?;
        let now = Utc::now().naive_utc();

        let mut linked = Vec::new();
        for key in &keys {
            let Some(issue) = issues.iter().find(|issue| &issue.key == key) else {
                continue;
            };
            let id = uuid::Uuid::new_v4().to_string();
            let created = GithubLink::attach(
                conn,
                NewGithubLink {
                    id: &id,
                    issue_id: &issue.id,
                    kind: event.kind.as_str(),
                    reference: &event.reference,
                    title: event.title.as_deref(),
                    url: &event.url,
                    created_at: now,
                },
            )?;
            if created {
                info!(issue_key = %key, kind = %event.kind, "linked github {}", event.reference);
            }
            linked.push(key.clone());
        }
        Ok(linked)
    })
}
