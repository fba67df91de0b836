//! # gitsql
//!
//! Query Git repository history using SQL.
//!
//! gitsql exposes a repository's commits, refs, trees, and per-line blame
//! as relational tables. SQLite executes the queries; the tables are
//! virtual, backed by lazy scans over the Git object store, so nothing is
//! copied up front and equality filters on commit ids, ref names, and
//! paths are pushed down into the scan.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gitsql::{Connection, Result};
//!
//! fn main() -> Result<()> {
//!     let conn = Connection::open("gitsql:///path/to/repo?ref=main")?;
//!     let result = conn.query(
//!         "SELECT author_name, COUNT(*) AS n FROM commits GROUP BY author_name",
//!     )?;
//!     println!("{} authors", result.row_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Available Tables
//!
//! - `commits` - commits reachable from the selected refs
//! - `commit_parents` - one row per (commit, parent) pair
//! - `refs` - branches, tags, and other refs
//! - `files` - files reachable from a commit's tree
//! - `blame` - per-line attribution for a file at a commit
//!
//! See [`TABLES`] for column details. The interface is strictly
//! read-only; write statements are rejected.

pub mod cli;
pub mod error;
pub mod git;
pub mod sql;
pub mod vtab;

pub use error::{Error, Result};
pub use git::GitRepo;
pub use sql::{ConnectOptions, Connection, QueryResult, TableInfo, TABLES};
