//! Error types for gitsql.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Ref not found: {0}")]
    RefNotFound(String),

    #[error("Corrupt object {id}: {source}")]
    CorruptObject {
        id: String,
        #[source]
        source: git2::Error,
    },

    #[error("Unsupported operation: {0} statements are not allowed on a Git connection")]
    UnsupportedOperation(String),

    #[error("Invalid connection URL: {0}")]
    UrlFormat(String),

    #[error("Unknown table: {0}")]
    TableNotFound(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Converts into the error shape rusqlite expects from virtual table
    /// callbacks, preserving the message.
    pub(crate) fn into_module_error(self) -> rusqlite::Error {
        match self {
            Error::Sql(e) => e,
            other => rusqlite::Error::ModuleError(other.to_string()),
        }
    }
}
