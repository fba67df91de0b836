//! The `blame` virtual table.
//!
//! With a pushed `path` equality the cursor blames that single file at the
//! target commit; without one it blames every file reachable from the
//! target commit's tree, one file at a time. The target commit comes from
//! the hidden `at_commit` parameter, falling back to the connection's ref
//! and then HEAD.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::sync::Arc;

use git2::Oid;
use rusqlite::ffi;
use rusqlite::types::Null;
use rusqlite::vtab::{
    Context, IndexConstraintOp, IndexInfo, VTab, VTabConnection, VTabCursor, Values,
};
use tracing::debug;

use crate::error::Error;
use crate::git::{blame_file, BlameLine, EntryKind, TreeFiles};
use crate::sql::schema::require_table_info;

use super::{require_aux, vtab_err, VtabContext};

const COL_PATH: usize = 0;
const COL_COMMIT_ID: usize = 1;
const COL_LINE_NO: usize = 2;
const COL_LINE_CONTENT: usize = 3;
const COL_AT_COMMIT: usize = 4;

const IDX_PATH: c_int = 1;
const IDX_AT_COMMIT: c_int = 2;

#[repr(C)]
pub struct BlameTab {
    base: ffi::sqlite3_vtab,
    ctx: Arc<VtabContext>,
}

unsafe impl<'vtab> VTab<'vtab> for BlameTab {
    type Aux = Arc<VtabContext>;
    type Cursor = BlameCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let ctx = require_aux(aux)?;
        let schema = require_table_info("blame")
            .map_err(vtab_err)?
            .declaration();
        Ok((
            schema,
            BlameTab {
                base: ffi::sqlite3_vtab::default(),
                ctx,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let mut path_constraint = None;
        let mut commit_constraint = None;
        for (i, constraint) in info.constraints().enumerate() {
            if !constraint.is_usable()
                || constraint.operator() != IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ
            {
                continue;
            }
            match constraint.column() as usize {
                COL_PATH => path_constraint = Some(i),
                COL_AT_COMMIT => commit_constraint = Some(i),
                _ => {}
            }
        }

        let mut idx_num = 0;
        let mut argv = 1;
        if let Some(i) = path_constraint {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(argv);
            usage.set_omit(true);
            argv += 1;
            idx_num |= IDX_PATH;
        }
        if let Some(i) = commit_constraint {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(argv);
            usage.set_omit(true);
            idx_num |= IDX_AT_COMMIT;
        }
        info.set_idx_num(idx_num);
        info.set_estimated_cost(if idx_num & IDX_PATH != 0 {
            100.0
        } else {
            1_000_000.0
        });
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(BlameCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            ctx: self.ctx.clone(),
            target: None,
            pushed_at: None,
            paths: PathSource::Done,
            current_path: None,
            rows: Vec::new(),
            position: 0,
            row_id: 0,
            phantom: PhantomData,
        })
    }
}

/// Remaining files to blame.
enum PathSource {
    /// A single pushed path, consumed on first use.
    Single(Option<String>),
    /// Every blob at the target commit.
    Tree(TreeFiles),
    Done,
}

impl PathSource {
    fn next_path(&mut self) -> rusqlite::Result<Option<String>> {
        match self {
            PathSource::Single(slot) => {
                let path = slot.take();
                if path.is_none() {
                    *self = PathSource::Done;
                }
                Ok(path)
            }
            PathSource::Tree(files) => {
                for row in files.by_ref() {
                    let row = row.map_err(vtab_err)?;
                    if row.kind == EntryKind::Blob {
                        return Ok(Some(row.path));
                    }
                }
                *self = PathSource::Done;
                Ok(None)
            }
            PathSource::Done => Ok(None),
        }
    }
}

#[repr(C)]
pub struct BlameCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    ctx: Arc<VtabContext>,
    target: Option<Oid>,
    pushed_at: Option<String>,
    paths: PathSource,
    current_path: Option<String>,
    rows: Vec<BlameLine>,
    position: usize,
    row_id: i64,
    phantom: PhantomData<&'vtab BlameTab>,
}

impl BlameCursor<'_> {
    /// Moves to the next attributed line, blaming further files as needed.
    fn advance(&mut self) -> rusqlite::Result<()> {
        let Some(target) = self.target else {
            self.current_path = None;
            return Ok(());
        };
        while self.position >= self.rows.len() {
            match self.paths.next_path()? {
                Some(path) => {
                    debug!(path = %path, "blaming file");
                    self.rows = blame_file(&self.ctx.repo, target, &path).map_err(vtab_err)?;
                    self.position = 0;
                    self.current_path = Some(path);
                }
                None => {
                    self.current_path = None;
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

unsafe impl VTabCursor for BlameCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let mut arg_i = 0;
        let mut pushed_path: Option<String> = None;
        let mut path_was_null = false;
        if idx_num & IDX_PATH != 0 {
            pushed_path = args.get(arg_i)?;
            path_was_null = pushed_path.is_none();
            arg_i += 1;
        }
        let mut at_was_null = false;
        self.pushed_at = None;
        if idx_num & IDX_AT_COMMIT != 0 {
            self.pushed_at = args.get(arg_i)?;
            at_was_null = self.pushed_at.is_none();
        }
        if path_was_null || at_was_null {
            // A NULL compared with `=` matches nothing.
            self.target = None;
            self.paths = PathSource::Done;
            self.rows = Vec::new();
            self.position = 0;
            self.row_id = 0;
            self.current_path = None;
            return Ok(());
        }

        // A pushed target that does not resolve yields an empty scan; a
        // missing default target only means the repository has no commits.
        self.target = match &self.pushed_at {
            Some(spec) => match self.ctx.repo.resolve_ref(spec) {
                Ok(id) => Some(id),
                Err(Error::RefNotFound(_)) => None,
                Err(e) => return Err(vtab_err(e)),
            },
            None => self.ctx.default_blame_target().map_err(vtab_err)?,
        };

        self.paths = match (&self.target, pushed_path) {
            (None, _) => PathSource::Done,
            (Some(_), Some(path)) => PathSource::Single(Some(path)),
            (Some(target), None) => {
                match self.ctx.repo.try_commit_info(*target).map_err(vtab_err)? {
                    Some(info) => {
                        PathSource::Tree(TreeFiles::new(self.ctx.repo.clone(), info.tree_id))
                    }
                    None => PathSource::Done,
                }
            }
        };
        self.rows = Vec::new();
        self.position = 0;
        self.row_id = 0;
        self.current_path = None;
        self.advance()
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.position += 1;
        self.row_id += 1;
        self.advance()
    }

    fn eof(&self) -> bool {
        self.position >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let (Some(path), Some(line)) = (&self.current_path, self.rows.get(self.position)) else {
            return ctx.set_result(&Null);
        };
        match i as usize {
            COL_PATH => ctx.set_result(path),
            COL_COMMIT_ID => ctx.set_result(&line.commit_id.to_string()),
            COL_LINE_NO => ctx.set_result(&(i64::from(line.line_no))),
            COL_LINE_CONTENT => ctx.set_result(&line.content),
            COL_AT_COMMIT => ctx.set_result(&self.pushed_at),
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row_id)
    }
}
