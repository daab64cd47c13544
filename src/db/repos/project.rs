use chrono::{NaiveDateTime, Utc};
use diesel::{
    insert_into, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable, RunQueryDsl, Selectable,
    SelectableHelper, SqliteConnection,
};

use crate::db::{
    repos::{board::NewBoard, column::NewColumn},
    schema::{board_columns, boards, projects},
    transaction::atomically,
};
use crate::domain::ColumnCategory;
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = projects)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub issue_counter: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject<'a> {
    pub id: &'a str,
    pub organization_id: &'a str,
    pub name: &'a str,
    pub key: &'a str,
    pub description: Option<&'a str>,
    pub issue_counter: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Columns every new project starts with.
const DEFAULT_COLUMNS: [(&str, &str, ColumnCategory); 3] = [
    ("To Do", "#6b7280", ColumnCategory::Todo),
    ("In Progress", "#3b82f6", ColumnCategory::InProgress),
    ("Done", "#22c55e", ColumnCategory::Done),
];

impl Project {
    pub fn find(conn: &mut SqliteConnection, project_id: &str) -> Result<Option<Project>, ServiceError> {
        Ok(projects::table
            .find(project_id)
            .select(Project::as_select())
            .first(conn)
            .optional()?)
    }

    /// Loads a project on behalf of an organization.
    pub fn authorize(
        conn: &mut SqliteConnection,
        organization_id: &str,
        project_id: &str,
    ) -> Result<Project, ServiceError> {
        let project = Project::find(conn, project_id)?.ok_or(ServiceError::NotFound("Project"))?;
        if project.organization_id != organization_id {
            return Err(ServiceError::Forbidden(
                "Project belongs to another organization".to_string(),
            ));
        }
        Ok(project)
    }

    /// Bumps the issue counter and returns the next issue key.
    pub fn next_issue_key(conn: &mut SqliteConnection, project_id: &str) -> Result<String, ServiceError> {
        diesel::update(projects::table.find(project_id))
            .set(projects::issue_counter.eq(projects::issue_counter + 1))
            .execute(conn)?;
        let (key, counter) = projects::table
            .find(project_id)
            .select((projects::key, projects::issue_counter))
            .first::<(String, i32)>(conn)
            .optional()?
            .ok_or(ServiceError::NotFound("Project"))?;
        Ok(format!("{key}-{counter}"))
    }
}

#[tonic::async_trait]
pub trait CreateProject {
    async fn create<'a>(new_project: NewProject<'a>, db_connection: &mut SqliteConnection) -> Result<Project, ServiceError>;
}

#[tonic::async_trait]
impl CreateProject for Project {
    async fn create<'a>(new_project: NewProject<'a>, db_connection: &mut SqliteConnection) -> Result<Project, ServiceError> {
        atomically(db_connection, |conn| {
            let taken: i64 = projects::table
                .filter(projects::organization_id.eq(new_project.organization_id))
                .filter(projects::key.eq(new_project.key))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(ServiceError::bad_request(format!(
                    "project key {} is already in use",
                    new_project.key
                )));
            }

            insert_into(projects::table).values(&new_project).execute(conn)?;

            let now = Utc::now().naive_utc();
            let board_id = uuid::Uuid::new_v4().to_string();
            insert_into(boards::table)
                .values(NewBoard {
                    id: &board_id,
                    project_id: new_project.id,
                    name: "Board",
                    is_default: true,
                    created_at: now,
                    updated_at: now,
                })
                .execute(conn)?;

            for (position, &(name, color, category)) in DEFAULT_COLUMNS.iter().enumerate() {
                insert_into(board_columns::table)
                    .values(NewColumn {
                        id: &uuid::Uuid::new_v4().to_string(),
                        board_id: &board_id,
                        name,
                        description: None,
                        color,
                        category: category.as_str(),
                        position: position as i32,
                        created_at: now,
                        updated_at: now,
                    })
                    .execute(conn)?;
            }

            Project::find(conn, new_project.id)?.ok_or(ServiceError::NotFound("Project"))
        })
    }
}
