use chrono::{NaiveDateTime, Utc};
use diesel::{
    delete, insert_into, AsChangeset, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable,
    RunQueryDsl, Selectable, SelectableHelper, SqliteConnection,
};
use ordering::{next_position, plan_migration, plan_removal, plan_sequence, Positioned};
use tracing::info;

use crate::db::{
    repos::{board::Board, issue::Issue},
    schema::{board_columns, boards},
    transaction::{atomically, write_column_positions, write_issue_positions},
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = board_columns)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub category: String,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = board_columns)]
pub struct NewColumn<'a> {
    pub id: &'a str,
    pub board_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub color: &'a str,
    pub category: &'a str,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = board_columns)]
pub struct ColumnChangeSet {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub category: Option<String>,
}

impl Positioned for Column {
    type Id = String;
    type Parent = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn parent(&self) -> Option<&String> {
        Some(&self.board_id)
    }

    fn position(&self) -> i32 {
        self.position
    }
}

impl Column {
    pub fn find(conn: &mut SqliteConnection, column_id: &str) -> Result<Option<Column>, ServiceError> {
        Ok(board_columns::table
            .find(column_id)
            .select(Column::as_select())
            .first(conn)
            .optional()?)
    }

    /// Columns of a board in position order.
    pub fn for_board(conn: &mut SqliteConnection, board_id: &str) -> Result<Vec<Column>, ServiceError> {
        Ok(board_columns::table
            .filter(board_columns::board_id.eq(board_id))
            .order((board_columns::position.asc(), board_columns::id.asc()))
            .select(Column::as_select())
            .load(conn)?)
    }

    /// Columns of every board of a project.
    pub fn for_project(conn: &mut SqliteConnection, project_id: &str) -> Result<Vec<Column>, ServiceError> {
        Ok(board_columns::table
            .inner_join(boards::table)
            .filter(boards::project_id.eq(project_id))
            .order((board_columns::board_id.asc(), board_columns::position.asc()))
            .select(Column::as_select())
            .load(conn)?)
    }

    pub fn project_id(conn: &mut SqliteConnection, column_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(board_columns::table
            .inner_join(boards::table)
            .filter(board_columns::id.eq(column_id))
            .select(boards::project_id)
            .first(conn)
            .optional()?)
    }
}

#[tonic::async_trait]
pub trait CreateColumn {
    async fn create<'a>(new_column: NewColumn<'a>, db_connection: &mut SqliteConnection) -> Result<Column, ServiceError>;
}

#[tonic::async_trait]
impl CreateColumn for Column {
    /// Appends the column to its board; the given position is ignored.
    async fn create<'a>(new_column: NewColumn<'a>, db_connection: &mut SqliteConnection) -> Result<Column, ServiceError> {
        atomically(db_connection, |conn| {
            let siblings = Column::for_board(conn, new_column.board_id)?;
            let position = next_position(&siblings, &new_column.board_id.to_string());

            insert_into(board_columns::table)
                .values(NewColumn { position, ..new_column })
                .execute(conn)?;

            Column::find(conn, new_column.id)?.ok_or(ServiceError::NotFound("Column"))
        })
    }
}

#[tonic::async_trait]
pub trait UpdateColumn {
    async fn update<'a>(
        column_id: &'a str,
        change_set: ColumnChangeSet,
        db_connection: &mut SqliteConnection,
    ) -> Result<Column, ServiceError>;
}

#[tonic::async_trait]
impl UpdateColumn for Column {
    async fn update<'a>(
        column_id: &'a str,
        change_set: ColumnChangeSet,
        db_connection: &mut SqliteConnection,
    ) -> Result<Column, ServiceError> {
        atomically(db_connection, |conn| {
            let updated = diesel::update(board_columns::table.find(column_id))
                .set((&change_set, board_columns::updated_at.eq(Utc::now().naive_utc())))
                .execute(conn)?;
            if updated == 0 {
                return Err(ServiceError::NotFound("Column"));
            }

            Column::find(conn, column_id)?.ok_or(ServiceError::NotFound("Column"))
        })
    }
}

#[tonic::async_trait]
pub trait ReorderColumns {
    async fn reorder<'a>(
        board_id: &'a str,
        column_ids: &'a [String],
        db_connection: &mut SqliteConnection,
    ) -> Result<(), ServiceError>;
}

#[tonic::async_trait]
impl ReorderColumns for Column {
    async fn reorder<'a>(
        board_id: &'a str,
        column_ids: &'a [String],
        db_connection: &mut SqliteConnection,
    ) -> Result<(), ServiceError> {
        atomically(db_connection, |conn| {
            Board::find(conn, board_id)?.ok_or(ServiceError::NotFound("Board"))?;
            let siblings = Column::for_board(conn, board_id)?;

            let changes = plan_sequence(&siblings, &board_id.to_string(), column_ids)?;
            write_column_positions(conn, &changes, Utc::now().naive_utc())
        })
    }
}

#[tonic::async_trait]
pub trait DeleteColumn {
    async fn delete<'a>(
        column_id: &'a str,
        move_tasks_to: Option<&'a str>,
        db_connection: &mut SqliteConnection,
    ) -> Result<Column, ServiceError>;
}

#[tonic::async_trait]
impl DeleteColumn for Column {
    /// Removes a column, first appending its issues to `move_tasks_to` when
    /// given, then closes the gap among the remaining columns.
    async fn delete<'a>(
        column_id: &'a str,
        move_tasks_to: Option<&'a str>,
        db_connection: &mut SqliteConnection,
    ) -> Result<Column, ServiceError> {
        atomically(db_connection, |conn| {
            let column = Column::find(conn, column_id)?.ok_or(ServiceError::NotFound("Column"))?;
            let siblings = Column::for_board(conn, &column.board_id)?;
            let tasks = Issue::in_columns(conn, &[column.id.clone()])?;
            let now = Utc::now().naive_utc();

            match move_tasks_to {
                Some(target_id) => {
                    if target_id == column.id {
                        return Err(ServiceError::bad_request(
                            "Cannot move tasks into the column being deleted",
                        ));
                    }
                    let target = Column::find(conn, target_id)?.ok_or(ServiceError::NotFound("Target column"))?;
                    if target.board_id != column.board_id {
                        return Err(ServiceError::bad_request("Target column belongs to another board"));
                    }

                    let mut affected = tasks;
                    affected.extend(Issue::in_columns(conn, &[target.id.clone()])?);
                    let changes = plan_migration(&affected, &column.id, &target.id);
                    write_issue_positions(conn, &changes, now)?;
                    info!(column_id = %column.id, target_id = %target.id, moved = changes.len(), "migrated issues");
                }
                None if !tasks.is_empty() => {
                    if siblings.len() == 1 {
                        return Err(ServiceError::precondition_failed(
                            "The only column of the board still has tasks",
                        ));
                    }
                    return Err(ServiceError::bad_request(
                        "Column has tasks; a target column is required",
                    ));
                }
                None => {}
            }

            let gap = plan_removal(&siblings, &column.id)?;
            delete(board_columns::table.find(&column.id)).execute(conn)?;
            write_column_positions(conn, &gap, now)?;

            Ok(column)
        })
    }
}
