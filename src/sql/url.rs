//! Connection string parsing.
//!
//! Grammar: `gitsql://<path>[?ref=<name>][&depth=<n>]`. The path points at
//! a repository working directory or `.git` directory; `ref` selects the
//! default ancestry start for unqualified scans; `depth` bounds the walk's
//! generation distance from its starting tips.

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const URL_SCHEME: &str = "gitsql://";

/// Parsed connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub path: PathBuf,
    /// Default ref for unqualified scans; validated at first query.
    pub reference: Option<String>,
    /// Generation bound for ancestry walks; unbounded when absent.
    pub depth: Option<u32>,
}

impl ConnectOptions {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            reference: None,
            depth: None,
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Parses a `gitsql://` connection URL.
    pub fn parse(url: &str) -> Result<Self> {
        let Some(rest) = url.strip_prefix(URL_SCHEME) else {
            return Err(Error::UrlFormat(format!(
                "expected '{URL_SCHEME}<path>[?ref=<name>][&depth=<n>]', got '{url}'"
            )));
        };

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path.is_empty() {
            return Err(Error::UrlFormat("missing repository path".to_string()));
        }

        let mut options = Self::new(path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let Some((key, value)) = pair.split_once('=') else {
                    return Err(Error::UrlFormat(format!(
                        "malformed query parameter '{pair}'"
                    )));
                };
                match key {
                    "ref" => options.reference = Some(value.to_string()),
                    "depth" => {
                        let depth: u32 = value.parse().map_err(|_| {
                            Error::UrlFormat(format!("depth must be a positive integer, got '{value}'"))
                        })?;
                        if depth == 0 {
                            return Err(Error::UrlFormat(
                                "depth must be a positive integer".to_string(),
                            ));
                        }
                        options.depth = Some(depth);
                    }
                    other => {
                        return Err(Error::UrlFormat(format!("unknown parameter '{other}'")));
                    }
                }
            }
        }
        Ok(options)
    }
}
