use chrono::Utc;
use proto::kanban::{
    self, projects_service_server::ProjectsService, CountEntry, CreateProjectRequest, DashboardSummary, ProjectId,
};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::controllers::{connection, required, Tenant};
use crate::dashboard::{summarize, Summary};
use crate::db::{
    connection::DbPool,
    repos::{
        column::Column,
        issue::Issue,
        project::{CreateProject, NewProject, Project},
    },
};
use crate::domain::{is_project_key, to_timestamp};
use crate::errors::ServiceError;

pub struct ProjectsController {
    pub pool: DbPool,
}

impl From<&Project> for kanban::Project {
    fn from(project: &Project) -> Self {
        kanban::Project {
            id: project.id.clone(),
            organization_id: project.organization_id.clone(),
            name: project.name.clone(),
            key: project.key.clone(),
            description: project.description.clone(),
            created_at: Some(to_timestamp(project.created_at)),
        }
    }
}

fn dashboard_summary(project_id: &str, summary: Summary) -> DashboardSummary {
    let count = |value: usize| value as i64;
    DashboardSummary {
        project_id: project_id.to_string(),
        total_issues: count(summary.total_issues),
        backlog_issues: count(summary.backlog_issues),
        todo_issues: count(summary.todo_issues),
        in_progress_issues: count(summary.in_progress_issues),
        done_issues: count(summary.done_issues),
        unassigned_issues: count(summary.unassigned_issues),
        overdue_issues: count(summary.overdue_issues),
        story_points_total: summary.story_points_total,
        story_points_done: summary.story_points_done,
        by_priority: summary
            .by_priority
            .iter()
            .map(|(priority, total)| CountEntry {
                label: priority.to_string(),
                count: count(*total),
            })
            .collect(),
        by_type: summary
            .by_type
            .iter()
            .map(|(issue_type, total)| CountEntry {
                label: issue_type.to_string(),
                count: count(*total),
            })
            .collect(),
        epics: summary
            .epics
            .into_iter()
            .map(|epic| kanban::EpicProgress {
                epic_id: epic.epic_id,
                key: epic.key,
                title: epic.title,
                total: count(epic.total),
                done: count(epic.done),
                percent: epic.percent,
            })
            .collect(),
    }
}

#[tonic::async_trait]
impl ProjectsService for ProjectsController {
    async fn create_project(
        &self,
        request: Request<CreateProjectRequest>,
    ) -> Result<Response<kanban::Project>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let name = required(&data.name, "name")?;
        if !is_project_key(&data.key) {
            return Err(ServiceError::bad_request("key must be 2 to 10 uppercase letters").into());
        }

        let mut db_connection = connection(&self.pool)?;
        let now = Utc::now().naive_utc();
        let new_project = NewProject {
            id: &uuid::Uuid::new_v4().to_string(),
            organization_id: &tenant.organization_id,
            name,
            key: &data.key,
            description: data.description.as_deref().filter(|text| !text.is_empty()),
            issue_counter: 0,
            created_at: now,
            updated_at: now,
        };
        let project = Project::create(new_project, &mut db_connection).await?;
        info!(project_id = %project.id, key = %project.key, "created project");

        Ok(Response::new(kanban::Project::from(&project)))
    }

    async fn get_project(&self, request: Request<ProjectId>) -> Result<Response<kanban::Project>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let project = tenant.project(&mut db_connection, &request.get_ref().project_id)?;

        Ok(Response::new(kanban::Project::from(&project)))
    }

    async fn get_dashboard(&self, request: Request<ProjectId>) -> Result<Response<DashboardSummary>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let project = tenant.project(&mut db_connection, &request.get_ref().project_id)?;

        let columns = Column::for_project(&mut db_connection, &project.id)?;
        let issues = Issue::for_project(&mut db_connection, &project.id)?;
        let summary = summarize(&columns, &issues, Utc::now().naive_utc());

        Ok(Response::new(dashboard_summary(&project.id, summary)))
    }
}
