//! The `files` virtual table: tree contents flattened per commit.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::ffi;
use rusqlite::types::Null;
use rusqlite::vtab::{
    Context, IndexConstraintOp, IndexInfo, VTab, VTabConnection, VTabCursor, Values,
};

use crate::git::{CommitInfo, EntryKind, FileRow, TreeFiles};
use crate::sql::schema::require_table_info;

use super::{require_aux, vtab_err, CommitSource, VtabContext};

const COL_COMMIT_ID: usize = 0;
const COL_PATH: usize = 1;
const COL_MODE: usize = 2;
const COL_BLOB_ID: usize = 3;
const COL_SIZE: usize = 4;

const IDX_COMMIT: c_int = 1;

#[repr(C)]
pub struct FilesTab {
    base: ffi::sqlite3_vtab,
    ctx: Arc<VtabContext>,
}

unsafe impl<'vtab> VTab<'vtab> for FilesTab {
    type Aux = Arc<VtabContext>;
    type Cursor = FilesCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let ctx = require_aux(aux)?;
        let schema = require_table_info("files")
            .map_err(vtab_err)?
            .declaration();
        Ok((
            schema,
            FilesTab {
                base: ffi::sqlite3_vtab::default(),
                ctx,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let mut commit_constraint = None;
        for (i, constraint) in info.constraints().enumerate() {
            if constraint.is_usable()
                && constraint.operator() == IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ
                && constraint.column() as usize == COL_COMMIT_ID
            {
                commit_constraint = Some(i);
            }
        }

        let mut idx_num = 0;
        if let Some(i) = commit_constraint {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(1);
            usage.set_omit(true);
            idx_num |= IDX_COMMIT;
        }
        info.set_idx_num(idx_num);
        info.set_estimated_cost(if idx_num != 0 { 10.0 } else { 10_000_000.0 });
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(FilesCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            ctx: self.ctx.clone(),
            source: CommitSource::Empty,
            commit: None,
            files: None,
            current: None,
            row_id: 0,
            phantom: PhantomData,
        })
    }
}

#[repr(C)]
pub struct FilesCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    ctx: Arc<VtabContext>,
    source: CommitSource,
    commit: Option<Arc<CommitInfo>>,
    files: Option<TreeFiles>,
    current: Option<FileRow>,
    row_id: i64,
    phantom: PhantomData<&'vtab FilesTab>,
}

impl FilesCursor<'_> {
    /// Positions on the next file row, moving to the next commit's tree
    /// when the current one is exhausted.
    fn advance(&mut self) -> rusqlite::Result<()> {
        loop {
            if let Some(files) = &mut self.files {
                match files.next() {
                    Some(Ok(row)) => {
                        self.current = Some(row);
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(vtab_err(e)),
                    None => self.files = None,
                }
            }
            match self.source.next_info()? {
                Some(info) => {
                    self.files = Some(TreeFiles::new(self.ctx.repo.clone(), info.tree_id));
                    self.commit = Some(info);
                }
                None => {
                    self.commit = None;
                    self.current = None;
                    return Ok(());
                }
            }
        }
    }
}

unsafe impl VTabCursor for FilesCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        self.source = if idx_num & IDX_COMMIT != 0 {
            match args.get::<Option<String>>(0)? {
                Some(id) => CommitSource::for_id(&self.ctx, &id)?,
                None => CommitSource::Empty,
            }
        } else {
            CommitSource::unqualified(&self.ctx)?
        };
        self.commit = None;
        self.files = None;
        self.current = None;
        self.row_id = 0;
        self.advance()
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.row_id += 1;
        self.advance()
    }

    fn eof(&self) -> bool {
        self.current.is_none()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let (Some(commit), Some(row)) = (&self.commit, &self.current) else {
            return ctx.set_result(&Null);
        };
        match i as usize {
            COL_COMMIT_ID => ctx.set_result(&commit.id.to_string()),
            COL_PATH => ctx.set_result(&row.path),
            COL_MODE => ctx.set_result(&format!("{:06o}", row.mode)),
            COL_BLOB_ID => ctx.set_result(&row.blob_id.to_string()),
            COL_SIZE => match row.kind {
                EntryKind::Blob => {
                    let size = self.ctx.repo.blob_size(row.blob_id).map_err(vtab_err)?;
                    ctx.set_result(&(size as i64))
                }
                _ => ctx.set_result(&Null),
            },
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row_id)
    }
}
