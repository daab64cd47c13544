use proto::kanban::{
    self, issues_service_server::IssuesService, CreateIssueRequest, IssueId, IssueKey, MoveIssueRequest,
    SearchIssuesParams, Success, UpdateIssueRequest,
};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::controllers::{connection, required, stream_items, ResponseStream, Tenant};
use crate::db::{
    connection::DbPool,
    repos::issue::{
        CreateIssue, DeleteIssue, Issue, IssueChangeSet, IssueDraft, IssueFilter, MoveIssue, UpdateIssue,
    },
};
use crate::domain::{from_timestamp, parse_or, to_timestamp, ColumnCategory, IssueType, Priority};
use crate::errors::ServiceError;

pub struct IssuesController {
    pub pool: DbPool,
}

impl From<&Issue> for kanban::Issue {
    fn from(issue: &Issue) -> Self {
        kanban::Issue {
            id: issue.id.clone(),
            project_id: issue.project_id.clone(),
            key: issue.key.clone(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            issue_type: parse_or(&issue.issue_type, IssueType::Task).to_wire(),
            priority: parse_or(&issue.priority, Priority::Medium).to_wire(),
            column_id: issue.column_id.clone(),
            position: issue.position,
            assignee_id: issue.assignee_id.clone(),
            reporter_id: issue.reporter_id.clone(),
            story_points: issue.story_points,
            due_date: issue.due_date.map(to_timestamp),
            parent_id: issue.parent_id.clone(),
            created_at: Some(to_timestamp(issue.created_at)),
            updated_at: Some(to_timestamp(issue.updated_at)),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

fn checked_points(points: Option<i32>) -> Result<Option<i32>, ServiceError> {
    match points {
        Some(points) if points < 0 => Err(ServiceError::bad_request("story points must not be negative")),
        points => Ok(points),
    }
}

/// `Some(None)` when the request asks to clear a field, otherwise the edit.
fn edit_or_clear<T>(clear: bool, edit: Option<T>, field: &str) -> Result<Option<Option<T>>, ServiceError> {
    match (clear, edit) {
        (true, Some(_)) => Err(ServiceError::bad_request(format!("{field} cannot be set and cleared at once"))),
        (true, None) => Ok(Some(None)),
        (false, edit) => Ok(edit.map(Some)),
    }
}

fn checked_window(value: Option<i64>, field: &str) -> Result<Option<i64>, ServiceError> {
    match value {
        Some(value) if value < 0 => Err(ServiceError::bad_request(format!("{field} must not be negative"))),
        value => Ok(value),
    }
}

#[tonic::async_trait]
impl IssuesService for IssuesController {
    async fn get_issue_by_id(&self, request: Request<IssueId>) -> Result<Response<kanban::Issue>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let issue = tenant.issue(&mut db_connection, &request.get_ref().issue_id)?;

        Ok(Response::new(kanban::Issue::from(&issue)))
    }

    async fn get_issue_by_key(&self, request: Request<IssueKey>) -> Result<Response<kanban::Issue>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let issue = Issue::find_by_key(&mut db_connection, &tenant.organization_id, &request.get_ref().key)?
            .ok_or(ServiceError::NotFound("Issue"))?;

        Ok(Response::new(kanban::Issue::from(&issue)))
    }

    type SearchIssuesStream = ResponseStream<kanban::Issue>;

    async fn search_issues(
        &self,
        request: Request<SearchIssuesParams>,
    ) -> Result<Response<Self::SearchIssuesStream>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let filter = IssueFilter {
            project_id: data.project_id.clone(),
            ids: data.issues_ids.clone(),
            column_id: non_empty(&data.column_id),
            backlog_only: data.backlog_only,
            assignee_id: non_empty(&data.assignee_id),
            issue_type: data.issue_type.map(IssueType::from_wire).transpose()?,
            priority: data.priority.map(Priority::from_wire).transpose()?,
            category: data.category.map(ColumnCategory::from_wire).transpose()?,
            text: non_empty(&data.text),
            limit: checked_window(data.limit, "limit")?,
            offset: checked_window(data.offset, "offset")?,
        };

        let mut db_connection = connection(&self.pool)?;
        tenant.project(&mut db_connection, &filter.project_id)?;
        let issues: Vec<kanban::Issue> = Issue::search(&mut db_connection, &filter)?
            .iter()
            .map(kanban::Issue::from)
            .collect();

        Ok(Response::new(stream_items(issues)))
    }

    async fn create_issue(&self, request: Request<CreateIssueRequest>) -> Result<Response<kanban::Issue>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let draft = IssueDraft {
            project_id: data.project_id.clone(),
            title: required(&data.title, "title")?.to_string(),
            description: data.description.clone().filter(|text| !text.is_empty()),
            issue_type: IssueType::from_wire(data.issue_type)?,
            priority: Priority::from_wire(data.priority)?,
            column_id: non_empty(&data.column_id),
            assignee_id: non_empty(&data.assignee_id),
            reporter_id: tenant.user()?.to_string(),
            story_points: checked_points(data.story_points)?,
            due_date: data.due_date.as_ref().map(from_timestamp).transpose()?,
            parent_id: non_empty(&data.parent_id),
        };

        let mut db_connection = connection(&self.pool)?;
        tenant.project(&mut db_connection, &draft.project_id)?;
        let issue = Issue::create(draft, &mut db_connection).await?;

        Ok(Response::new(kanban::Issue::from(&issue)))
    }

    async fn update_issue(&self, request: Request<UpdateIssueRequest>) -> Result<Response<kanban::Issue>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let change_set = IssueChangeSet {
            title: data
                .title
                .as_deref()
                .map(|title| required(title, "title").map(str::to_string))
                .transpose()?,
            description: data.description.as_ref().map(|_| non_empty(&data.description)),
            issue_type: data
                .issue_type
                .map(|value| IssueType::from_wire(value).map(|value| value.as_str().to_string()))
                .transpose()?,
            priority: data
                .priority
                .map(|value| Priority::from_wire(value).map(|value| value.as_str().to_string()))
                .transpose()?,
            assignee_id: data.assignee_id.as_ref().map(|_| non_empty(&data.assignee_id)),
            story_points: edit_or_clear(data.clear_story_points, checked_points(data.story_points)?, "story_points")?,
            due_date: edit_or_clear(
                data.clear_due_date,
                data.due_date.as_ref().map(from_timestamp).transpose()?,
                "due_date",
            )?,
            parent_id: data.parent_id.as_ref().map(|_| non_empty(&data.parent_id)),
        };

        let mut db_connection = connection(&self.pool)?;
        let issue = tenant.issue(&mut db_connection, &data.issue_id)?;
        let issue = Issue::update(&issue.id, change_set, &mut db_connection).await?;
        info!(issue_id = %issue.id, "updated issue");

        Ok(Response::new(kanban::Issue::from(&issue)))
    }

    async fn move_issue(&self, request: Request<MoveIssueRequest>) -> Result<Response<Success>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        if data.position < 0 {
            return Err(ServiceError::bad_request("position must not be negative").into());
        }

        let mut db_connection = connection(&self.pool)?;
        let issue = tenant.issue(&mut db_connection, &data.issue_id)?;
        let moved = Issue::move_to(&issue.id, &data.column_id, data.position, &mut db_connection).await?;
        info!(
            issue_id = %moved.id,
            from = ?issue.column_id,
            to = %data.column_id,
            position = moved.position,
            "moved issue"
        );

        Ok(Response::new(Success { success: true }))
    }

    async fn delete_issue(&self, request: Request<IssueId>) -> Result<Response<kanban::Issue>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let issue = tenant.issue(&mut db_connection, &request.get_ref().issue_id)?;

        let issue = Issue::delete(&issue.id, &mut db_connection).await?;
        info!(issue_id = %issue.id, key = %issue.key, "deleted issue");

        Ok(Response::new(kanban::Issue::from(&issue)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::request;
    use crate::db::connection::test_pool;
    use crate::db::repos::fixtures::{issue_order, seed_board, seed_issue, seed_project};
    use tokio_stream::StreamExt;
    use tonic::Code;

    fn create_request(project_id: &str, column_id: Option<&String>) -> CreateIssueRequest {
        CreateIssueRequest {
            project_id: project_id.to_string(),
            title: "Ship it".to_string(),
            description: None,
            issue_type: kanban::IssueType::Story as i32,
            priority: kanban::Priority::High as i32,
            column_id: column_id.cloned(),
            assignee_id: None,
            story_points: Some(5),
            due_date: None,
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn created_issues_append_and_move() {
        let pool = test_pool();
        let seeded = seed_board(&mut pool.get().unwrap());
        let existing = seed_issue(&mut pool.get().unwrap(), &seeded, Some(&seeded.columns[0]), 0);
        let controller = IssuesController { pool: pool.clone() };

        let created = controller
            .create_issue(request("org-1", create_request(&seeded.project_id, Some(&seeded.columns[0]))))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(created.position, 1);
        assert_eq!(created.reporter_id, "user-1");
        assert_eq!(created.issue_type, kanban::IssueType::Story as i32);

        controller
            .move_issue(request(
                "org-1",
                MoveIssueRequest {
                    issue_id: created.id.clone(),
                    column_id: seeded.columns[0].clone(),
                    position: 0,
                },
            ))
            .await
            .unwrap();

        assert_eq!(
            issue_order(&mut pool.get().unwrap(), &seeded.columns[0]),
            vec![created.id, existing.id]
        );
    }

    #[tokio::test]
    async fn moves_are_validated() {
        let pool = test_pool();
        let seeded = seed_board(&mut pool.get().unwrap());
        let foreign = seed_project(&mut pool.get().unwrap(), "org-2", "OTH");
        let issue = seed_issue(&mut pool.get().unwrap(), &seeded, Some(&seeded.columns[0]), 0);
        let controller = IssuesController { pool };

        let negative = controller
            .move_issue(request(
                "org-1",
                MoveIssueRequest {
                    issue_id: issue.id.clone(),
                    column_id: seeded.columns[1].clone(),
                    position: -1,
                },
            ))
            .await
            .unwrap_err();
        assert_eq!(negative.code(), Code::InvalidArgument);

        let other_tenant = controller
            .move_issue(request(
                "org-2",
                MoveIssueRequest {
                    issue_id: issue.id.clone(),
                    column_id: foreign.columns[0].clone(),
                    position: 0,
                },
            ))
            .await
            .unwrap_err();
        assert_eq!(other_tenant.code(), Code::PermissionDenied);

        let missing = controller
            .move_issue(request(
                "org-1",
                MoveIssueRequest {
                    issue_id: "nope".to_string(),
                    column_id: seeded.columns[1].clone(),
                    position: 0,
                },
            ))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn search_streams_the_backlog() {
        let pool = test_pool();
        let seeded = seed_board(&mut pool.get().unwrap());
        let parked = seed_issue(&mut pool.get().unwrap(), &seeded, None, 0);
        seed_issue(&mut pool.get().unwrap(), &seeded, Some(&seeded.columns[0]), 0);
        let controller = IssuesController { pool };

        let found: Vec<String> = controller
            .search_issues(request(
                "org-1",
                SearchIssuesParams {
                    project_id: seeded.project_id.clone(),
                    backlog_only: true,
                    ..Default::default()
                },
            ))
            .await
            .unwrap()
            .into_inner()
            .map(|issue| issue.unwrap().id)
            .collect()
            .await;
        assert_eq!(found, vec![parked.id.clone()]);

        let by_key = controller
            .get_issue_by_key(request("org-1", IssueKey { key: parked.key.clone() }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(by_key.id, parked.id);
    }

    #[tokio::test]
    async fn update_clears_the_assignee_and_delete_closes_the_gap() {
        let pool = test_pool();
        let seeded = seed_board(&mut pool.get().unwrap());
        let first = seed_issue(&mut pool.get().unwrap(), &seeded, Some(&seeded.columns[0]), 0);
        let second = seed_issue(&mut pool.get().unwrap(), &seeded, Some(&seeded.columns[0]), 1);
        let controller = IssuesController { pool };

        let assigned = controller
            .update_issue(request(
                "org-1",
                UpdateIssueRequest {
                    issue_id: second.id.clone(),
                    assignee_id: Some("user-2".to_string()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(assigned.assignee_id.as_deref(), Some("user-2"));

        let cleared = controller
            .update_issue(request(
                "org-1",
                UpdateIssueRequest {
                    issue_id: second.id.clone(),
                    assignee_id: Some(String::new()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(cleared.assignee_id, None);

        controller
            .delete_issue(request("org-1", IssueId { issue_id: first.id }))
            .await
            .unwrap();
        let remaining = controller
            .get_issue_by_id(request("org-1", IssueId { issue_id: second.id }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(remaining.position, 0);
    }

    #[tokio::test]
    async fn update_sets_and_clears_points_and_due_date() {
        let pool = test_pool();
        let seeded = seed_board(&mut pool.get().unwrap());
        let issue = seed_issue(&mut pool.get().unwrap(), &seeded, Some(&seeded.columns[0]), 0);
        let controller = IssuesController { pool };
        let due = prost_types::Timestamp {
            seconds: 1_767_225_600,
            nanos: 0,
        };

        let scheduled = controller
            .update_issue(request(
                "org-1",
                UpdateIssueRequest {
                    issue_id: issue.id.clone(),
                    story_points: Some(8),
                    due_date: Some(due.clone()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(scheduled.story_points, Some(8));
        assert_eq!(scheduled.due_date, Some(due.clone()));

        let untouched = controller
            .update_issue(request(
                "org-1",
                UpdateIssueRequest {
                    issue_id: issue.id.clone(),
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(untouched.story_points, Some(8));
        assert_eq!(untouched.due_date, Some(due.clone()));

        let conflicting = controller
            .update_issue(request(
                "org-1",
                UpdateIssueRequest {
                    issue_id: issue.id.clone(),
                    story_points: Some(3),
                    clear_story_points: true,
                    ..Default::default()
                },
            ))
            .await
            .unwrap_err();
        assert_eq!(conflicting.code(), Code::InvalidArgument);

        let cleared = controller
            .update_issue(request(
                "org-1",
                UpdateIssueRequest {
                    issue_id: issue.id.clone(),
                    clear_story_points: true,
                    clear_due_date: true,
                    ..Default::default()
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(cleared.story_points, None);
        assert_eq!(cleared.due_date, None);
        assert_eq!(cleared.title, "Renamed");
    }
}
