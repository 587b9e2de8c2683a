// Storage: LanceDB for chunk vectors, SQLite for feedback records

pub mod lancedb;
pub mod sqlite;

pub use sqlite::*;
