//! Virtual table modules bridging SQLite scans onto the Git object layer.
//!
//! One eponymous-only module per table in [`crate::sql::schema::TABLES`].
//! Modules are registered per connection with that connection's repository
//! context as the module aux, so several repositories can be open in one
//! process without interference. `best_index` claims equality constraints
//! on key columns (commit id, ref name, path); everything else is left to
//! SQLite's own post-filtering.

use std::sync::Arc;

use git2::Oid;
use rusqlite::vtab::eponymous_only_module;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};
use crate::git::GitRepo;
use crate::sql::url::ConnectOptions;

mod blame;
mod commit_parents;
mod commits;
mod files;
mod refs;

/// Per-connection context shared by every table module.
pub struct VtabContext {
    pub repo: Arc<GitRepo>,
    /// Default ref for unqualified scans, from the connection URL.
    pub reference: Option<String>,
    /// Generation bound for ancestry walks.
    pub depth: Option<u32>,
}

impl VtabContext {
    pub fn new(repo: Arc<GitRepo>, options: &ConnectOptions) -> Self {
        Self {
            repo,
            reference: options.reference.clone(),
            depth: options.depth,
        }
    }

    /// Starting tips for an unqualified ancestry walk: the connection ref
    /// when configured, otherwise every ref plus HEAD. Resolved fresh on
    /// every scan so ref updates between queries are visible.
    pub fn default_tips(&self) -> Result<Vec<Oid>> {
        match &self.reference {
            Some(name) => Ok(vec![self.repo.resolve_ref(name)?]),
            None => self.repo.tip_ids(),
        }
    }

    /// The commit an unqualified `blame` targets: the connection ref when
    /// configured, otherwise HEAD. `None` on an unborn repository.
    pub fn default_blame_target(&self) -> Result<Option<Oid>> {
        match &self.reference {
            Some(name) => Ok(Some(self.repo.resolve_ref(name)?)),
            None => self.repo.head_id(),
        }
    }
}

/// Registers every table module on a connection.
pub fn register_all(conn: &Connection, ctx: &Arc<VtabContext>) -> Result<()> {
    conn.create_module(
        "commits",
        eponymous_only_module::<commits::CommitsTab>(),
        Some(ctx.clone()),
    )?;
    conn.create_module(
        "commit_parents",
        eponymous_only_module::<commit_parents::CommitParentsTab>(),
        Some(ctx.clone()),
    )?;
    conn.create_module(
        "refs",
        eponymous_only_module::<refs::RefsTab>(),
        Some(ctx.clone()),
    )?;
    conn.create_module(
        "files",
        eponymous_only_module::<files::FilesTab>(),
        Some(ctx.clone()),
    )?;
    conn.create_module(
        "blame",
        eponymous_only_module::<blame::BlameTab>(),
        Some(ctx.clone()),
    )?;
    debug!("registered virtual table modules");
    Ok(())
}

/// Maps a crate error into the shape rusqlite expects from module
/// callbacks.
pub(crate) fn vtab_err(e: Error) -> rusqlite::Error {
    e.into_module_error()
}

/// Where a commit-driven scan draws its rows from.
///
/// An unknown pushed ref or unparsable pushed commit id produces `Empty` -
/// the scan yields no rows rather than failing. Only the connection's own
/// configured ref escalates to an error.
pub(crate) enum CommitSource {
    Empty,
    Single(Option<Arc<crate::git::CommitInfo>>),
    Walk(crate::git::AncestryWalk),
}

impl CommitSource {
    /// Single-commit source from a pushed `id`/`commit_id` equality.
    pub(crate) fn for_id(ctx: &VtabContext, text: &str) -> rusqlite::Result<Self> {
        let Ok(oid) = Oid::from_str(text) else {
            return Ok(CommitSource::Empty);
        };
        match ctx.repo.try_commit_info(oid).map_err(vtab_err)? {
            Some(info) => Ok(CommitSource::Single(Some(info))),
            None => Ok(CommitSource::Empty),
        }
    }

    /// Ancestry walk from a pushed ref or revspec.
    pub(crate) fn for_ref(ctx: &VtabContext, name: &str) -> rusqlite::Result<Self> {
        match ctx.repo.resolve_ref(name) {
            Ok(tip) => {
                let walk = crate::git::AncestryWalk::new(ctx.repo.clone(), &[tip], ctx.depth)
                    .map_err(vtab_err)?;
                Ok(CommitSource::Walk(walk))
            }
            Err(Error::RefNotFound(_)) => Ok(CommitSource::Empty),
            Err(e) => Err(vtab_err(e)),
        }
    }

    /// Ancestry walk from the connection's default tips.
    pub(crate) fn unqualified(ctx: &VtabContext) -> rusqlite::Result<Self> {
        let tips = ctx.default_tips().map_err(vtab_err)?;
        let walk =
            crate::git::AncestryWalk::new(ctx.repo.clone(), &tips, ctx.depth).map_err(vtab_err)?;
        Ok(CommitSource::Walk(walk))
    }

    pub(crate) fn next_info(
        &mut self,
    ) -> rusqlite::Result<Option<Arc<crate::git::CommitInfo>>> {
        match self {
            CommitSource::Empty => Ok(None),
            CommitSource::Single(slot) => Ok(slot.take()),
            CommitSource::Walk(walk) => walk.next().transpose().map_err(vtab_err),
        }
    }
}

/// The aux handed to `connect`, or a module error when absent.
pub(crate) fn require_aux(aux: Option<&Arc<VtabContext>>) -> rusqlite::Result<Arc<VtabContext>> {
    aux.cloned()
        .ok_or_else(|| rusqlite::Error::ModuleError("missing repository context".to_string()))
}
