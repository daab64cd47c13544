use chrono::Utc;
use proto::kanban::{
    self, columns_service_server::ColumnsService, ColumnId, CreateColumnRequest, DeleteColumnRequest,
    ReorderColumnsRequest, SearchColumnsParams, Success, UpdateColumnRequest,
};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::controllers::{connection, required, stream_items, ResponseStream, Tenant};
use crate::db::{
    connection::DbPool,
    repos::column::{Column, ColumnChangeSet, CreateColumn, DeleteColumn, NewColumn, ReorderColumns, UpdateColumn},
};
use crate::domain::{is_hex_color, parse_or, ColumnCategory};
use crate::errors::ServiceError;

const DEFAULT_COLOR: &str = "#6b7280";

pub struct ColumnsController {
    pub pool: DbPool,
}

impl From<&Column> for kanban::Column {
    fn from(column: &Column) -> Self {
        kanban::Column {
            id: column.id.clone(),
            board_id: column.board_id.clone(),
            name: column.name.clone(),
            description: column.description.clone(),
            color: column.color.clone(),
            category: parse_or(&column.category, ColumnCategory::Todo).to_wire(),
            position: column.position,
        }
    }
}

fn checked_color(color: &str) -> Result<&str, ServiceError> {
    if !is_hex_color(color) {
        return Err(ServiceError::bad_request(format!("{color} is not a #rrggbb color")));
    }
    Ok(color)
}

#[tonic::async_trait]
impl ColumnsService for ColumnsController {
    async fn get_column_by_id(&self, request: Request<ColumnId>) -> Result<Response<kanban::Column>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let column = tenant.column(&mut db_connection, &request.get_ref().column_id)?;

        Ok(Response::new(kanban::Column::from(&column)))
    }

    type SearchColumnsStream = ResponseStream<kanban::Column>;

    async fn search_columns(
        &self,
        request: Request<SearchColumnsParams>,
    ) -> Result<Response<Self::SearchColumnsStream>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let mut db_connection = connection(&self.pool)?;
        let board = tenant.board(&mut db_connection, &data.board_id)?;

        let columns: Vec<kanban::Column> = Column::for_board(&mut db_connection, &board.id)?
            .iter()
            .filter(|column| data.columns_ids.is_empty() || data.columns_ids.contains(&column.id))
            .map(kanban::Column::from)
            .collect();

        Ok(Response::new(stream_items(columns)))
    }

    async fn create_column(&self, request: Request<CreateColumnRequest>) -> Result<Response<kanban::Column>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let name = required(&data.name, "name")?;
        let color = checked_color(data.color.as_deref().unwrap_or(DEFAULT_COLOR))?;
        let category = ColumnCategory::from_wire(data.category)?;

        let mut db_connection = connection(&self.pool)?;
        let board = tenant.board(&mut db_connection, &data.board_id)?;
        let now = Utc::now().naive_utc();
        let new_column = NewColumn {
            id: &uuid::Uuid::new_v4().to_string(),
            board_id: &board.id,
            name,
            description: data.description.as_deref().filter(|text| !text.is_empty()),
            color,
            category: category.as_str(),
            position: 0,
            created_at: now,
            updated_at: now,
        };
        let column = Column::create(new_column, &mut db_connection).await?;
        info!(column_id = %column.id, board_id = %board.id, position = column.position, "created column");

        Ok(Response::new(kanban::Column::from(&column)))
    }

    async fn update_column(&self, request: Request<UpdateColumnRequest>) -> Result<Response<kanban::Column>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let change_set = ColumnChangeSet {
            name: data
                .name
                .as_deref()
                .map(|name| required(name, "name").map(str::to_string))
                .transpose()?,
            description: data
                .description
                .as_ref()
                .map(|text| Some(text.clone()).filter(|text| !text.is_empty())),
            color: data
                .color
                .as_deref()
                .map(|color| checked_color(color).map(str::to_string))
                .transpose()?,
            category: data
                .category
                .map(|category| ColumnCategory::from_wire(category).map(|category| category.as_str().to_string()))
                .transpose()?,
        };

        let mut db_connection = connection(&self.pool)?;
        let column = tenant.column(&mut db_connection, &data.column_id)?;
        let column = Column::update(&column.id, change_set, &mut db_connection).await?;
        info!(column_id = %column.id, "updated column");

        Ok(Response::new(kanban::Column::from(&column)))
    }

    async fn reorder_columns(&self, request: Request<ReorderColumnsRequest>) -> Result<Response<Success>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let mut db_connection = connection(&self.pool)?;
        let board = tenant.board(&mut db_connection, &data.board_id)?;

        Column::reorder(&board.id, &data.column_ids, &mut db_connection).await?;
        info!(board_id = %board.id, columns = data.column_ids.len(), "reordered columns");

        Ok(Response::new(Success { success: true }))
    }

    async fn delete_column(&self, request: Request<DeleteColumnRequest>) -> Result<Response<Success>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let mut db_connection = connection(&self.pool)?;
        let column = tenant.column(&mut db_connection, &data.column_id)?;
        let target = data.move_tasks_to_column_id.as_deref().filter(|id| !id.is_empty());

        Column::delete(&column.id, target, &mut db_connection).await?;
        info!(column_id = %column.id, target = ?target, "deleted column");

        Ok(Response::new(Success { success: true }))
    }
}
