//! Connection facade: opens a repository, registers the virtual tables on
//! an in-memory SQLite database, and executes read-only queries.

use std::sync::Arc;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection as SqliteConnection;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::git::{GitRepo, ReaderStatsSnapshot};
use crate::sql::url::ConnectOptions;
use crate::vtab::{self, VtabContext};

/// Statement verbs allowed through to SQLite. Everything else is DML or
/// DDL and is rejected before it reaches the engine.
const READ_VERBS: &[&str] = &["SELECT", "WITH", "VALUES", "EXPLAIN"];

/// A read-only SQL connection over one Git repository.
///
/// # Example
///
/// ```no_run
/// use gitsql::Connection;
///
/// let conn = Connection::open("gitsql:///path/to/repo?ref=main")?;
/// let result = conn.query("SELECT short_id, summary FROM commits LIMIT 5")?;
/// println!("{} commits", result.row_count());
/// # Ok::<(), gitsql::Error>(())
/// ```
pub struct Connection {
    db: SqliteConnection,
    ctx: Arc<VtabContext>,
    options: ConnectOptions,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a connection from a `gitsql://` URL.
    ///
    /// # Errors
    ///
    /// `Error::UrlFormat` for a malformed URL, `Error::RepositoryNotFound`
    /// when the path is not a Git repository. A bad `ref` parameter is
    /// only detected at first use.
    pub fn open(url: &str) -> Result<Self> {
        Self::open_with(ConnectOptions::parse(url)?)
    }

    /// Opens a connection from parsed options.
    pub fn open_with(options: ConnectOptions) -> Result<Self> {
        let repo = Arc::new(GitRepo::open(&options.path)?);
        let db = SqliteConnection::open_in_memory()?;
        let ctx = Arc::new(VtabContext::new(repo, &options));
        vtab::register_all(&db, &ctx)?;
        register_functions(&db)?;
        debug!(path = %options.path.display(), "connection open");
        Ok(Self { db, ctx, options })
    }

    /// Executes a read-only SQL statement.
    ///
    /// The full SQLite dialect is available: joins, CTEs, aggregates,
    /// window functions. Write statements are rejected with
    /// `Error::UnsupportedOperation` before execution.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        ensure_read_only(sql)?;
        // The connection ref is re-resolved on every query so repository
        // updates stay visible and a bad ref surfaces as RefNotFound.
        if let Some(name) = &self.options.reference {
            self.ctx.repo.resolve_ref(name)?;
        }

        let mut stmt = self.db.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let column_count = columns.len();

        let mut rows = stmt.query([])?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get_ref(i).map(value_to_json))
                .collect::<rusqlite::Result<Vec<Value>>>()?;
            data.push(values);
        }

        Ok(QueryResult {
            columns,
            rows: data,
        })
    }

    /// The repository this connection reads from.
    pub fn repo(&self) -> &GitRepo {
        &self.ctx.repo
    }

    /// Object-store read counters, for instrumentation.
    pub fn reader_stats(&self) -> ReaderStatsSnapshot {
        self.ctx.repo.stats()
    }
}

fn register_functions(db: &SqliteConnection) -> Result<()> {
    db.create_scalar_function(
        "commit_date",
        1,
        FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let seconds: i64 = ctx.get(0)?;
            Ok(chrono::DateTime::from_timestamp(seconds, 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_default())
        },
    )?;
    Ok(())
}

/// Rejects anything but read statements, before SQLite sees them.
fn ensure_read_only(sql: &str) -> Result<()> {
    let normalized = normalize_sql(sql);
    let re = Regex::new(r"^([A-Z]+)").unwrap();
    let verb = re
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "empty".to_string());
    if !READ_VERBS.contains(&verb.as_str()) {
        return Err(Error::UnsupportedOperation(verb));
    }
    // SQLite allows a WITH prefix on write statements too.
    if verb == "WITH" {
        for (marker, write_verb) in [
            ("INSERT INTO ", "INSERT"),
            ("REPLACE INTO ", "REPLACE"),
            ("DELETE FROM ", "DELETE"),
            ("UPDATE ", "UPDATE"),
        ] {
            if normalized.contains(marker) {
                return Err(Error::UnsupportedOperation(write_verb.to_string()));
            }
        }
    }
    Ok(())
}

/// Uppercases and collapses whitespace, dropping leading line comments.
fn normalize_sql(sql: &str) -> String {
    sql.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// The result of a query: column names plus rows as JSON values.
#[derive(Debug)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_array(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (i, column) in self.columns.iter().enumerate() {
                    object.insert(
                        column.clone(),
                        row.get(i).cloned().unwrap_or(Value::Null),
                    );
                }
                Value::Object(object)
            })
            .collect()
    }
}
