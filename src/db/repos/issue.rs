use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};
use diesel::{
    delete, insert_into, sqlite::Sqlite, AsChangeset, BoolExpressionMethods, ExpressionMethods, Insertable,
    OptionalExtension, QueryDsl, Queryable, RunQueryDsl, Selectable, SelectableHelper, SqliteConnection,
    TextExpressionMethods,
};
use ordering::{next_position, plan_move, plan_removal, Move, Positioned};
use tracing::{debug, info};

use crate::db::{
    repos::{column::Column, project::Project},
    schema::{board_columns, boards, issues, projects},
    transaction::{atomically, write_issue_positions},
};
use crate::domain::{ColumnCategory, IssueType, Priority};
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = issues)]
pub struct Issue {
    pub id: String,
    pub project_id: String,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub issue_type: String,
    pub priority: String,
    pub column_id: Option<String>,
    pub position: i32,
    pub assignee_id: Option<String>,
    pub reporter_id: String,
    pub story_points: Option<i32>,
    pub due_date: Option<NaiveDateTime>,
    pub parent_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = issues)]
pub struct NewIssue<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub key: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub issue_type: &'a str,
    pub priority: &'a str,
    pub column_id: Option<&'a str>,
    pub position: i32,
    pub assignee_id: Option<&'a str>,
    pub reporter_id: &'a str,
    pub story_points: Option<i32>,
    pub due_date: Option<NaiveDateTime>,
    pub parent_id: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Everything a caller decides about a new issue. Key and position are
/// assigned on insert.
#[derive(Debug, Clone)]
pub struct IssueDraft {
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub issue_type: IssueType,
    pub priority: Priority,
    pub column_id: Option<String>,
    pub assignee_id: Option<String>,
    pub reporter_id: String,
    pub story_points: Option<i32>,
    pub due_date: Option<NaiveDateTime>,
    pub parent_id: Option<String>,
}

/// `Some(None)` clears a nullable field.
#[derive(AsChangeset, Default, Debug)]
#[diesel(table_name = issues)]
pub struct IssueChangeSet {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<Option<String>>,
    pub story_points: Option<Option<i32>>,
    pub due_date: Option<Option<NaiveDateTime>>,
    pub parent_id: Option<Option<String>>,
}

#[derive(Debug, Default, Clone)]
pub struct IssueFilter {
    pub project_id: String,
    pub ids: Vec<String>,
    pub column_id: Option<String>,
    pub backlog_only: bool,
    pub assignee_id: Option<String>,
    pub issue_type: Option<IssueType>,
    pub priority: Option<Priority>,
    pub category: Option<ColumnCategory>,
    pub text: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Positioned for Issue {
    type Id = String;
    type Parent = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn parent(&self) -> Option<&String> {
        self.column_id.as_ref()
    }

    fn position(&self) -> i32 {
        self.position
    }
}

impl Issue {
    pub fn find(conn: &mut SqliteConnection, issue_id: &str) -> Result<Option<Issue>, ServiceError> {
        Ok(issues::table
            .find(issue_id)
            .select(Issue::as_select())
            .first(conn)
            .optional()?)
    }

    /// Project keys are unique per organization, so a key names at most one
    /// issue within it.
    pub fn find_by_key(
        conn: &mut SqliteConnection,
        organization_id: &str,
        key: &str,
    ) -> Result<Option<Issue>, ServiceError> {
        Ok(issues::table
            .inner_join(projects::table)
            .filter(projects::organization_id.eq(organization_id))
            .filter(issues::key.eq(key))
            .select(Issue::as_select())
            .first(conn)
            .optional()?)
    }

    pub fn find_by_keys(
        conn: &mut SqliteConnection,
        organization_id: &str,
        keys: &[String],
    ) -> Result<Vec<Issue>, ServiceError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        Ok(issues::table
            .inner_join(projects::table)
            .filter(projects::organization_id.eq(organization_id))
            .filter(issues::key.eq_any(keys))
            .select(Issue::as_select())
            .load(conn)?)
    }

    /// Issues of the given columns ordered by column, then position.
    pub fn in_columns(conn: &mut SqliteConnection, column_ids: &[String]) -> Result<Vec<Issue>, ServiceError> {
        Ok(issues::table
            .filter(issues::column_id.eq_any(column_ids))
            .order((issues::column_id.asc(), issues::position.asc(), issues::id.asc()))
            .select(Issue::as_select())
            .load(conn)?)
    }

    pub fn for_project(conn: &mut SqliteConnection, project_id: &str) -> Result<Vec<Issue>, ServiceError> {
        Ok(issues::table
            .filter(issues::project_id.eq(project_id))
            .order((issues::created_at.asc(), issues::id.asc()))
            .select(Issue::as_select())
            .load(conn)?)
    }

    pub fn search(conn: &mut SqliteConnection, filter: &IssueFilter) -> Result<Vec<Issue>, ServiceError> {
        let mut query = issues::table
            .select(Issue::as_select())
            .filter(issues::project_id.eq(filter.project_id.clone()))
            .into_boxed::<Sqlite>();

        if !filter.ids.is_empty() {
            query = query.filter(issues::id.eq_any(filter.ids.clone()));
        }
        if filter.backlog_only {
            query = query.filter(issues::column_id.is_null());
        } else if let Some(column_id) = &filter.column_id {
            query = query.filter(issues::column_id.eq(column_id.clone()));
        }
        if let Some(assignee_id) = &filter.assignee_id {
            query = query.filter(issues::assignee_id.eq(assignee_id.clone()));
        }
        if let Some(issue_type) = filter.issue_type {
            query = query.filter(issues::issue_type.eq(issue_type.as_str()));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(issues::priority.eq(priority.as_str()));
        }
        if let Some(category) = filter.category {
            let column_ids: Vec<String> = board_columns::table
                .inner_join(boards::table)
                .filter(boards::project_id.eq(&filter.project_id))
                .filter(board_columns::category.eq(category.as_str()))
                .select(board_columns::id)
                .load(conn)?;
            query = query.filter(issues::column_id.eq_any(column_ids));
        }
        if let Some(text) = filter.text.as_deref().filter(|text| !text.is_empty()) {
            let pattern = format!("%{text}%");
            query = query.filter(issues::title.like(pattern.clone()).or(issues::key.like(pattern)));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }

        Ok(query
            .order((issues::column_id.asc(), issues::position.asc(), issues::created_at.asc()))
            .load(conn)?)
    }
}

fn check_column(conn: &mut SqliteConnection, project_id: &str, column_id: &str) -> Result<(), ServiceError> {
    match Column::project_id(conn, column_id)? {
        None => Err(ServiceError::NotFound("Column")),
        Some(owner) if owner != project_id => {
            Err(ServiceError::bad_request("Column belongs to another project"))
        }
        Some(_) => Ok(()),
    }
}

fn check_parent(
    conn: &mut SqliteConnection,
    project_id: &str,
    issue_id: Option<&str>,
    parent_id: &str,
) -> Result<(), ServiceError> {
    if issue_id == Some(parent_id) {
        return Err(ServiceError::bad_request("An issue cannot be its own parent"));
    }
    let parent = Issue::find(conn, parent_id)?.ok_or(ServiceError::NotFound("Parent issue"))?;
    if parent.project_id != project_id {
        return Err(ServiceError::bad_request("Parent issue belongs to another project"));
    }
    let Some(issue_id) = issue_id else {
        return Ok(());
    };

    // Walk up from the new parent; reaching the issue itself would close a loop.
    let mut visited = HashSet::from([parent.id.clone()]);
    let mut ancestor = parent.parent_id;
    while let Some(ancestor_id) = ancestor {
        if ancestor_id == issue_id {
            return Err(ServiceError::bad_request("Parent issue is a descendant of this issue"));
        }
        if !visited.insert(ancestor_id.clone()) {
            break;
        }
        ancestor = Issue::find(conn, &ancestor_id)?.and_then(|issue| issue.parent_id);
    }
    Ok(())
}

#[tonic::async_trait]
pub trait CreateIssue {
    async fn create(draft: IssueDraft, db_connection: &mut SqliteConnection) -> Result<Issue, ServiceError>;
}

#[tonic::async_trait]
impl CreateIssue for Issue {
    /// Appends the issue to its column, or parks it in the backlog.
    async fn create(draft: IssueDraft, db_connection: &mut SqliteConnection) -> Result<Issue, ServiceError> {
        atomically(db_connection, |conn| {
            let position = match &draft.column_id {
                Some(column_id) => {
                    check_column(conn, &draft.project_id, column_id)?;
                    let siblings = Issue::in_columns(conn, std::slice::from_ref(column_id))?;
                    next_position(&siblings, column_id)
                }
                None => 0,
            };
            if let Some(parent_id) = &draft.parent_id {
                check_parent(conn, &draft.project_id, None, parent_id)?;
            }

            let id = uuid::Uuid::new_v4().to_string();
            let key = Project::next_issue_key(conn, &draft.project_id)?;
            let now = Utc::now().naive_utc();
            insert_into(issues::table)
                .values(NewIssue {
                    id: &id,
                    project_id: &draft.project_id,
                    key: &key,
                    title: &draft.title,
                    description: draft.description.as_deref(),
                    issue_type: draft.issue_type.as_str(),
                    priority: draft.priority.as_str(),
                    column_id: draft.column_id.as_deref(),
                    position,
                    assignee_id: draft.assignee_id.as_deref(),
                    reporter_id: &draft.reporter_id,
                    story_points: draft.story_points,
                    due_date: draft.due_date,
                    parent_id: draft.parent_id.as_deref(),
                    created_at: now,
                    updated_at: now,
                })
                .execute(conn)?;
            info!(issue_id = %id, key = %key, "created issue");

            Issue::find(conn, &id)?.ok_or(ServiceError::NotFound("Issue"))
        })
    }
}

#[tonic::async_trait]
pub trait UpdateIssue {
    async fn update<'a>(
        issue_id: &'a str,
        change_set: IssueChangeSet,
        db_connection: &mut SqliteConnection,
    ) -> Result<Issue, ServiceError>;
}

#[tonic::async_trait]
impl UpdateIssue for Issue {
    /// Edits fields only. Placement changes go through [`MoveIssue`].
    async fn update<'a>(
        issue_id: &'a str,
        change_set: IssueChangeSet,
        db_connection: &mut SqliteConnection,
    ) -> Result<Issue, ServiceError> {
        atomically(db_connection, |conn| {
            let issue = Issue::find(conn, issue_id)?.ok_or(ServiceError::NotFound("Issue"))?;
            if let Some(Some(parent_id)) = &change_set.parent_id {
                check_parent(conn, &issue.project_id, Some(&issue.id), parent_id)?;
            }

            diesel::update(issues::table.find(&issue.id))
                .set((&change_set, issues::updated_at.eq(Utc::now().naive_utc())))
                .execute(conn)?;

            Issue::find(conn, &issue.id)?.ok_or(ServiceError::NotFound("Issue"))
        })
    }
}

#[tonic::async_trait]
pub trait MoveIssue {
    async fn move_to<'a>(
        issue_id: &'a str,
        column_id: &'a str,
        position: i32,
        db_connection: &mut SqliteConnection,
    ) -> Result<Issue, ServiceError>;
}

#[tonic::async_trait]
impl MoveIssue for Issue {
    /// Places the issue at `position` within `column_id`. Positions past the
    /// end append; both the source and the target column stay dense.
    async fn move_to<'a>(
        issue_id: &'a str,
        column_id: &'a str,
        position: i32,
        db_connection: &mut SqliteConnection,
    ) -> Result<Issue, ServiceError> {
        atomically(db_connection, |conn| {
            let issue = Issue::find(conn, issue_id)?.ok_or(ServiceError::NotFound("Issue"))?;
            check_column(conn, &issue.project_id, column_id)?;

            let mut affected = vec![column_id.to_string()];
            affected.extend(issue.column_id.iter().filter(|source| *source != column_id).cloned());
            let mut siblings = Issue::in_columns(conn, &affected)?;
            if issue.column_id.is_none() {
                siblings.push(issue.clone());
            }

            let request = Move {
                id: issue.id.clone(),
                target_parent: column_id.to_string(),
                target_index: position,
            };
            let changes = plan_move(&siblings, &request)?;
            debug!(issue_id = %issue.id, column_id, position, changes = changes.len(), "planned move");
            write_issue_positions(conn, &changes, Utc::now().naive_utc())?;

            Issue::find(conn, &issue.id)?.ok_or(ServiceError::NotFound("Issue"))
        })
    }
}

#[tonic::async_trait]
pub trait DeleteIssue {
    async fn delete<'a>(issue_id: &'a str, db_connection: &mut SqliteConnection) -> Result<Issue, ServiceError>;
}

#[tonic::async_trait]
impl DeleteIssue for Issue {
    async fn delete<'a>(issue_id: &'a str, db_connection: &mut SqliteConnection) -> Result<Issue, ServiceError> {
        atomically(db_connection, |conn| {
            let issue = Issue::find(conn, issue_id)?.ok_or(ServiceError::NotFound("Issue"))?;

            let gap = match &issue.column_id {
                Some(column_id) => {
                    let siblings = Issue::in_columns(conn, std::slice::from_ref(column_id))?;
                    plan_removal(&siblings, &issue.id)?
                }
                None => Vec::new(),
            };
            delete(issues::table.find(&issue.id)).execute(conn)?;
            write_issue_positions(conn, &gap, Utc::now().naive_utc())?;

            Ok(issue)
        })
    }
}
