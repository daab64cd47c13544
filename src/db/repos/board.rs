use chrono::{NaiveDateTime, Utc};
use diesel::{
    delete, insert_into, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable, RunQueryDsl,
    Selectable, SelectableHelper, SqliteConnection,
};
use tracing::info;

use crate::db::{
    schema::{board_columns, boards, issues},
    transaction::atomically,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = boards)]
pub struct Board {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub is_default: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = boards)]
pub struct NewBoard<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub name: &'a str,
    pub is_default: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Board {
    pub fn find(conn: &mut SqliteConnection, board_id: &str) -> Result<Option<Board>, ServiceError> {
        Ok(boards::table
            .find(board_id)
            .select(Board::as_select())
            .first(conn)
            .optional()?)
    }

    /// Boards of a project, oldest first.
    pub fn for_project(conn: &mut SqliteConnection, project_id: &str) -> Result<Vec<Board>, ServiceError> {
        Ok(boards::table
            .filter(boards::project_id.eq(project_id))
            .order((boards::created_at.asc(), boards::id.asc()))
            .select(Board::as_select())
            .load(conn)?)
    }
}

#[tonic::async_trait]
pub trait CreateBoard {
    async fn create<'a>(
        project_id: &'a str,
        name: &'a str,
        db_connection: &mut SqliteConnection,
    ) -> Result<Board, ServiceError>;
}

#[tonic::async_trait]
impl CreateBoard for Board {
    async fn create<'a>(
        project_id: &'a str,
        name: &'a str,
        db_connection: &mut SqliteConnection,
    ) -> Result<Board, ServiceError> {
        atomically(db_connection, |conn| {
            let existing: i64 = boards::table
                .filter(boards::project_id.eq(project_id))
                .count()
                .get_result(conn)?;

            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now().naive_utc();
            insert_into(boards::table)
                .values(NewBoard {
                    id: &id,
                    project_id,
                    name,
                    is_default: existing == 0,
                    created_at: now,
                    updated_at: now,
                })
                .execute(conn)?;

            Board::find(conn, &id)?.ok_or(ServiceError::NotFound("Board"))
        })
    }
}

#[tonic::async_trait]
pub trait SetDefaultBoard {
    async fn set_default<'a>(board_id: &'a str, db_connection: &mut SqliteConnection) -> Result<Board, ServiceError>;
}

#[tonic::async_trait]
impl SetDefaultBoard for Board {
    async fn set_default<'a>(board_id: &'a str, db_connection: &mut SqliteConnection) -> Result<Board, ServiceError> {
        atomically(db_connection, |conn| {
            let board = Board::find(conn, board_id)?.ok_or(ServiceError::NotFound("Board"))?;
            let now = Utc::now().naive_utc();

            diesel::update(boards::table.filter(boards::project_id.eq(&board.project_id)))
                .set((boards::is_default.eq(false), boards::updated_at.eq(now)))
                .execute(conn)?;
            diesel::update(boards::table.find(&board.id))
                .set((boards::is_default.eq(true), boards::updated_at.eq(now)))
                .execute(conn)?;

            Board::find(conn, &board.id)?.ok_or(ServiceError::NotFound("Board"))
        })
    }
}

#[tonic::async_trait]
pub trait DeleteBoard {
    async fn delete<'a>(board_id: &'a str, db_connection: &mut SqliteConnection) -> Result<Board, ServiceError>;
}

#[tonic::async_trait]
impl DeleteBoard for Board {
    /// Issues on the deleted board fall back to the backlog. Deleting the
    /// default board promotes the oldest remaining one.
    async fn delete<'a>(board_id: &'a str, db_connection: &mut SqliteConnection) -> Result<Board, ServiceError> {
        atomically(db_connection, |conn| {
            let board = Board::find(conn, board_id)?.ok_or(ServiceError::NotFound("Board"))?;
            let siblings = Board::for_project(conn, &board.project_id)?;
            if siblings.len() <= 1 {
                return Err(ServiceError::precondition_failed(
                    "Cannot delete the last board of a project",
                ));
            }

            let now = Utc::now().naive_utc();
            let column_ids: Vec<String> = board_columns::table
                .filter(board_columns::board_id.eq(&board.id))
                .select(board_columns::id)
                .load(conn)?;
            diesel::update(issues::table.filter(issues::column_id.eq_any(&column_ids)))
                .set((
                    issues::column_id.eq(None::<String>),
                    issues::position.eq(0),
                    issues::updated_at.eq(now),
                ))
                .execute(conn)?;

            delete(boards::table.find(&board.id)).execute(conn)?;

            if board.is_default {
                if let Some(heir) = siblings.iter().find(|sibling| sibling.id != board.id) {
                    diesel::update(boards::table.find(&heir.id))
                        .set((boards::is_default.eq(true), boards::updated_at.eq(now)))
                        .execute(conn)?;
                    info!(board_id = %heir.id, "promoted default board");
                }
            }

            Ok(board)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::test_connection;
    use crate::db::repos::fixtures::{seed_board, seed_issue};
    use crate::db::repos::issue::Issue;

    #[tokio::test]
    async fn first_board_of_a_project_is_default() {
        let mut conn = test_connection();
        let seeded = seed_board(&mut conn);

        let second = Board::create(&seeded.project_id, "Sprint", &mut conn).await.unwrap();
        assert!(!second.is_default);

        let promoted = Board::set_default(&second.id, &mut conn).await.unwrap();
        assert!(promoted.is_default);
        let boards = Board::for_project(&mut conn, &seeded.project_id).unwrap();
        assert_eq!(boards.iter().filter(|board| board.is_default).count(), 1);
    }

    #[tokio::test]
    async fn last_board_cannot_be_deleted() {
        let mut conn = test_connection();
        let seeded = seed_board(&mut conn);

        let result = Board::delete(&seeded.board_id, &mut conn).await;
        assert!(matches!(result, Err(ServiceError::PreconditionFailed(_))));
        assert!(Board::find(&mut conn, &seeded.board_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_the_default_promotes_another_and_backlogs_issues() {
        let mut conn = test_connection();
        let seeded = seed_board(&mut conn);
        let issue = seed_issue(&mut conn, &seeded, Some(&seeded.columns[1]), 0);
        let other = Board::create(&seeded.project_id, "Sprint", &mut conn).await.unwrap();

        Board::delete(&seeded.board_id, &mut conn).await.unwrap();

        let remaining = Board::for_project(&mut conn, &seeded.project_id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, other.id);
        assert!(remaining[0].is_default);

        let issue = Issue::find(&mut conn, &issue.id).unwrap().unwrap();
        assert_eq!(issue.column_id, None);
        assert_eq!(issue.position, 0);
    }
}
