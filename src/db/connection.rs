use diesel::{
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection},
    SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use r2d2::{Pool, PooledConnection};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
    #[error("failed to run migrations: {0}")]
    Migrations(String),
}

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL;",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

fn init_pool(config: &DatabaseConfig) -> Result<DbPool, r2d2::Error> {
    let manager = ConnectionManager::<SqliteConnection>::new(&config.url);
    Pool::builder()
        .max_size(config.pool_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: config.busy_timeout,
        }))
        .build(manager)
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), SetupError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| SetupError::Migrations(err.to_string()))?;
    if !applied.is_empty() {
        info!(count = applied.len(), "applied pending migrations");
    }
    Ok(())
}

pub fn establish_connection(config: &DatabaseConfig) -> Result<DbPool, SetupError> {
    let pool = init_pool(config)?;
    run_migrations(&mut *pool.get()?)?;
    Ok(pool)
}

/// Single-connection pool over a private in-memory database.
#[cfg(test)]
pub fn test_pool() -> DbPool {
    establish_connection(&DatabaseConfig {
        url: ":memory:".to_string(),
        pool_size: 1,
        busy_timeout: Duration::from_millis(1_000),
    })
    .expect("in-memory database")
}

#[cfg(test)]
pub fn test_connection() -> SqliteConnection {
    use diesel::Connection;

    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory database");
    conn.batch_execute("PRAGMA foreign_keys = ON;")
        .expect("enable foreign keys");
    run_migrations(&mut conn).expect("migrations");
    conn
}
