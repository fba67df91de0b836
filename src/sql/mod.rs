//! SQL surface: connection facade, schema registry, and connection URL
//! parsing.

pub mod engine;
pub mod schema;
pub mod url;

pub use engine::{Connection, QueryResult};
pub use schema::{get_table_info, ColumnInfo, TableInfo, TABLES};
pub use url::{ConnectOptions, URL_SCHEME};
