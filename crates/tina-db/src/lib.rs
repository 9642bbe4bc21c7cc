mod config;
mod error;
mod models;
pub mod query;
mod repository;
mod schema;
mod value;

pub use config::DbConfig;
pub use error::{DbError, Result};
pub use models::*;
pub use repository::TinaDb;
pub use value::{DbValue, Record, Table};

pub use sqlx::SqliteConnection;
