//! Static registry of the virtual tables exposed over a repository.
//!
//! The registry is pure data: each descriptor carries the column shape the
//! corresponding module declares to SQLite and the equality pushdowns it
//! claims. Hidden columns are SQLite table-valued-function parameters:
//! they accept constraints (`WHERE at_ref = 'main'` or `commits('main')`)
//! but never appear in `SELECT *` output.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct ColumnInfo {
    pub name: &'static str,
    /// Declared SQLite type: `TEXT` or `INTEGER`.
    pub sql_type: &'static str,
    pub hidden: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TableInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: &'static [ColumnInfo],
    /// Columns whose equality constraints the module consumes itself.
    pub pushdown: &'static [&'static str],
}

impl TableInfo {
    /// The `CREATE TABLE` declaration handed to SQLite when the module
    /// connects.
    pub fn declaration(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.hidden {
                    format!("{} {} HIDDEN", c.name, c.sql_type)
                } else {
                    format!("{} {}", c.name, c.sql_type)
                }
            })
            .collect();
        format!("CREATE TABLE x({})", columns.join(", "))
    }
}

const fn col(name: &'static str, sql_type: &'static str, description: &'static str) -> ColumnInfo {
    ColumnInfo {
        name,
        sql_type,
        hidden: false,
        description,
    }
}

const fn hidden(name: &'static str, description: &'static str) -> ColumnInfo {
    ColumnInfo {
        name,
        sql_type: "TEXT",
        hidden: true,
        description,
    }
}

pub static COMMITS_COLUMNS: &[ColumnInfo] = &[
    col("id", "TEXT", "Full commit hash"),
    col("short_id", "TEXT", "Abbreviated commit hash"),
    col("author_name", "TEXT", "Author name (NULL when missing)"),
    col("author_email", "TEXT", "Author email (NULL when missing)"),
    col("authored_at", "INTEGER", "Author timestamp, epoch seconds"),
    col("committer_name", "TEXT", "Committer name (NULL when missing)"),
    col("committer_email", "TEXT", "Committer email (NULL when missing)"),
    col("committed_at", "INTEGER", "Committer timestamp, epoch seconds"),
    col("summary", "TEXT", "First line of the message"),
    col("message", "TEXT", "Full commit message"),
    col("tree_id", "TEXT", "Root tree hash"),
    col("parent_count", "INTEGER", "Number of parents"),
    hidden("at_ref", "Ref or revspec the walk starts from"),
];

pub static COMMIT_PARENTS_COLUMNS: &[ColumnInfo] = &[
    col("commit_id", "TEXT", "Child commit hash"),
    col("parent_id", "TEXT", "Parent commit hash"),
    col("parent_index", "INTEGER", "Position in the declared parent list"),
];

pub static REFS_COLUMNS: &[ColumnInfo] = &[
    col("name", "TEXT", "Full ref name, e.g. refs/heads/main"),
    col("short_name", "TEXT", "Shorthand, e.g. main"),
    col(
        "target_commit_id",
        "TEXT",
        "Peeled commit hash (NULL when the ref is not a commit)",
    ),
    col("kind", "TEXT", "branch, remote, tag, note, or other"),
];

pub static FILES_COLUMNS: &[ColumnInfo] = &[
    col("commit_id", "TEXT", "Commit whose tree contains the file"),
    col("path", "TEXT", "Full path from the repository root"),
    col("mode", "TEXT", "Git filemode, octal (e.g. 100644)"),
    col("blob_id", "TEXT", "Blob hash (submodule commit hash for gitlinks)"),
    col("size", "INTEGER", "Blob size in bytes (NULL for gitlinks)"),
];

pub static BLAME_COLUMNS: &[ColumnInfo] = &[
    col("path", "TEXT", "File path being blamed"),
    col("commit_id", "TEXT", "Commit that introduced the line"),
    col("line_no", "INTEGER", "1-based line number"),
    col("line_content", "TEXT", "Line content at the target commit"),
    hidden("at_commit", "Commit or revspec to blame at (default: connection ref, else HEAD)"),
];

pub static TABLES: &[TableInfo] = &[
    TableInfo {
        name: "commits",
        description: "Commits reachable from the selected refs",
        columns: COMMITS_COLUMNS,
        pushdown: &["id", "at_ref"],
    },
    TableInfo {
        name: "commit_parents",
        description: "One row per (commit, parent) pair, order preserved",
        columns: COMMIT_PARENTS_COLUMNS,
        pushdown: &["commit_id"],
    },
    TableInfo {
        name: "refs",
        description: "Branches, tags, and other refs",
        columns: REFS_COLUMNS,
        pushdown: &["name"],
    },
    TableInfo {
        name: "files",
        description: "Files reachable from a commit's tree",
        columns: FILES_COLUMNS,
        pushdown: &["commit_id"],
    },
    TableInfo {
        name: "blame",
        description: "Per-line attribution for a file at a commit",
        columns: BLAME_COLUMNS,
        pushdown: &["path", "at_commit"],
    },
];

pub fn get_table_info(name: &str) -> Option<&'static TableInfo> {
    TABLES.iter().find(|t| t.name == name)
}

/// Like [`get_table_info`] but surfaces `Error::TableNotFound`.
pub fn require_table_info(name: &str) -> Result<&'static TableInfo> {
    get_table_info(name).ok_or_else(|| Error::TableNotFound(name.to_string()))
}
