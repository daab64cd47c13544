pub mod connection;
pub mod repos;
pub mod schema;
pub mod transaction;
