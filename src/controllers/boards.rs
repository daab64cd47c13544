use proto::kanban::{self, boards_service_server::BoardsService, BoardId, CreateBoardRequest, ProjectId};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::controllers::{connection, required, stream_items, ResponseStream, Tenant};
use crate::db::{
    connection::DbPool,
    repos::board::{Board, CreateBoard, DeleteBoard, SetDefaultBoard},
};

pub struct BoardsController {
    pub pool: DbPool,
}

impl From<&Board> for kanban::Board {
    fn from(board: &Board) -> Self {
        kanban::Board {
            id: board.id.clone(),
            project_id: board.project_id.clone(),
            name: board.name.clone(),
            is_default: board.is_default,
        }
    }
}

#[tonic::async_trait]
impl BoardsService for BoardsController {
    async fn get_board_by_id(&self, request: Request<BoardId>) -> Result<Response<kanban::Board>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let board = tenant.board(&mut db_connection, &request.get_ref().board_id)?;

        Ok(Response::new(kanban::Board::from(&board)))
    }

    type GetBoardsByProjectIdStream = ResponseStream<kanban::Board>;

    async fn get_boards_by_project_id(
        &self,
        request: Request<ProjectId>,
    ) -> Result<Response<Self::GetBoardsByProjectIdStream>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let project = tenant.project(&mut db_connection, &request.get_ref().project_id)?;

        let boards = Board::for_project(&mut db_connection, &project.id)?;
        let boards: Vec<kanban::Board> = boards.iter().map(kanban::Board::from).collect();

        Ok(Response::new(stream_items(boards)))
    }

    async fn create_board(&self, request: Request<CreateBoardRequest>) -> Result<Response<kanban::Board>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let data = request.get_ref();
        let name = required(&data.name, "name")?;

        let mut db_connection = connection(&self.pool)?;
        let project = tenant.project(&mut db_connection, &data.project_id)?;
        let board = Board::create(&project.id, name, &mut db_connection).await?;
        info!(board_id = %board.id, project_id = %project.id, "created board");

        Ok(Response::new(kanban::Board::from(&board)))
    }

    async fn set_default_board(&self, request: Request<BoardId>) -> Result<Response<kanban::Board>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let board = tenant.board(&mut db_connection, &request.get_ref().board_id)?;

        let board = Board::set_default(&board.id, &mut db_connection).await?;
        info!(board_id = %board.id, "set default board");

        Ok(Response::new(kanban::Board::from(&board)))
    }

    async fn delete_board(&self, request: Request<BoardId>) -> Result<Response<kanban::Board>, Status> {
        let tenant = Tenant::from_request(&request)?;
        let mut db_connection = connection(&self.pool)?;
        let board = tenant.board(&mut db_connection, &request.get_ref().board_id)?;

        let board = Board::delete(&board.id, &mut db_connection).await?;
        info!(board_id = %board.id, "deleted board");

        Ok(Response::new(kanban::Board::from(&board)))
    }
}
