//! Database schema and initialization

pub mod init;
pub mod migrations;

pub use init::init_database;
