mod config;
mod controllers;
mod dashboard;
mod db;
mod domain;
mod errors;
mod github;

use controllers::{
    boards::BoardsController, columns::ColumnsController, github::GithubController, issues::IssuesController,
    projects::ProjectsController,
};
use proto::kanban::{
    boards_service_server::BoardsServiceServer, columns_service_server::ColumnsServiceServer,
    github_service_server::GithubServiceServer, issues_service_server::IssuesServiceServer,
    projects_service_server::ProjectsServiceServer,
};
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::connection::establish_connection;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::from_env()?;

    let pool = establish_connection(&config.database)?;

    let projects_service_server = ProjectsServiceServer::new(ProjectsController { pool: pool.clone() });
    let boards_service_server = BoardsServiceServer::new(BoardsController { pool: pool.clone() });
    let columns_service_server = ColumnsServiceServer::new(ColumnsController { pool: pool.clone() });
    let issues_service_server = IssuesServiceServer::new(IssuesController { pool: pool.clone() });
    let github_service_server = GithubServiceServer::new(GithubController { pool });

    info!(address = %config.app_url, "kanban service listening");
    Server::builder()
        .add_service(projects_service_server)
        .add_service(boards_service_server)
        .add_service(columns_service_server)
        .add_service(issues_service_server)
        .add_service(github_service_server)
        .serve(config.app_url)
        .await?;

    Ok(())
}
