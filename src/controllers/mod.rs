pub mod boards;
pub mod columns;
pub mod github;
pub mod issues;
pub mod projects;

use std::pin::Pin;

use diesel::SqliteConnection;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tonic::{Request, Status};

use crate::db::{
    connection::{DbConnection, DbPool},
    repos::{board::Board, column::Column, issue::Issue, project::Project},
};
use crate::errors::ServiceError;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_HEADER: &str = "x-user-id";

pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Caller identity carried in request metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub organization_id: String,
    pub user_id: Option<String>,
}

impl Tenant {
    pub fn from_request<T>(request: &Request<T>) -> Result<Tenant, ServiceError> {
        let header = |name: &str| {
            request
                .metadata()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let organization_id =
            header(ORGANIZATION_HEADER).ok_or_else(|| ServiceError::precondition_failed("No active organization"))?;
        Ok(Tenant {
            organization_id,
            user_id: header(USER_HEADER),
        })
    }

    pub fn user(&self) -> Result<&str, ServiceError> {
        self.user_id
            .as_deref()
            .ok_or_else(|| ServiceError::precondition_failed("No active user"))
    }

    pub fn project(&self, conn: &mut SqliteConnection, project_id: &str) -> Result<Project, ServiceError> {
        Project::authorize(conn, &self.organization_id, project_id)
    }

    pub fn board(&self, conn: &mut SqliteConnection, board_id: &str) -> Result<Board, ServiceError> {
        let board = Board::find(conn, board_id)?.ok_or(ServiceError::NotFound("Board"))?;
        self.project(conn, &board.project_id)?;
        Ok(board)
    }

    pub fn column(&self, conn: &mut SqliteConnection, column_id: &str) -> Result<Column, ServiceError> {
        let column = Column::find(conn, column_id)?.ok_or(ServiceError::NotFound("Column"))?;
        self.board(conn, &column.board_id)?;
        Ok(column)
    }

    pub fn issue(&self, conn: &mut SqliteConnection, issue_id: &str) -> Result<Issue, ServiceError> {
        let issue = Issue::find(conn, issue_id)?.ok_or(ServiceError::NotFound("Issue"))?;
        self.project(conn, &issue.project_id)?;
        Ok(issue)
    }
}

pub fn connection(pool: &DbPool) -> Result<DbConnection, ServiceError> {
    Ok(pool.get()?)
}

pub fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::bad_request(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Streams already loaded rows to the client one by one.
pub fn stream_items<T: Send + 'static>(items: Vec<T>) -> ResponseStream<T> {
    let mut stream = tokio_stream::iter(items);
    let (sender, receiver) = mpsc::channel(1);

    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            if sender.send(Result::<T, Status>::Ok(item)).await.is_err() {
                break;
            }
        }
    });

    Box::pin(ReceiverStream::new(receiver))
}
