//! The `commit_parents` virtual table: one row per (commit, parent) pair.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::ffi;
use rusqlite::types::Null;
use rusqlite::vtab::{
    Context, IndexConstraintOp, IndexInfo, VTab, VTabConnection, VTabCursor, Values,
};

use crate::git::CommitInfo;
use crate::sql::schema::require_table_info;

use super::{require_aux, CommitSource, VtabContext};

const COL_COMMIT_ID: usize = 0;
const COL_PARENT_ID: usize = 1;
const COL_PARENT_INDEX: usize = 2;

const IDX_COMMIT: c_int = 1;

#[repr(C)]
pub struct CommitParentsTab {
    base: ffi::sqlite3_vtab,
    ctx: Arc<VtabContext>,
}

unsafe impl<'vtab> VTab<'vtab> for CommitParentsTab {
    type Aux = Arc<VtabContext>;
    type Cursor = CommitParentsCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let ctx = require_aux(aux)?;
        let schema = require_table_info("commit_parents")
            .map_err(super::vtab_err)?
            .declaration();
        Ok((
            schema,
            CommitParentsTab {
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
        info.set_estimated_cost(if idx_num != 0 { 1.0 } else { 1_000_000.0 });
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(CommitParentsCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            ctx: self.ctx.clone(),
            source: CommitSource::Empty,
            current: None,
            parent_index: 0,
            row_id: 0,
            phantom: PhantomData,
        })
    }
}

#[repr(C)]
pub struct CommitParentsCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    ctx: Arc<VtabContext>,
    source: CommitSource,
    current: Option<Arc<CommitInfo>>,
    parent_index: usize,
    row_id: i64,
    phantom: PhantomData<&'vtab CommitParentsTab>,
}

impl CommitParentsCursor<'_> {
    /// Positions on the next (commit, parent) pair, skipping commits with
    /// no parents.
    fn advance(&mut self) -> rusqlite::Result<()> {
        loop {
            if let Some(info) = &self.current {
                if self.parent_index < info.parents.len() {
                    return Ok(());
                }
            }
            match self.source.next_info()? {
                Some(info) => {
                    self.current = Some(info);
                    self.parent_index = 0;
                }
                None => {
                    self.current = None;
                    return Ok(());
                }
            }
        }
    }
}

unsafe impl VTabCursor for CommitParentsCursor<'_> {
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
        self.current = None;
        self.parent_index = 0;
        self.row_id = 0;
        self.advance()
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.parent_index += 1;
        self.row_id += 1;
        self.advance()
    }

    fn eof(&self) -> bool {
        self.current.is_none()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Some(info) = &self.current else {
            return ctx.set_result(&Null);
        };
        match i as usize {
            COL_COMMIT_ID => ctx.set_result(&info.id.to_string()),
            COL_PARENT_ID => ctx.set_result(&info.parents[self.parent_index].to_string()),
            COL_PARENT_INDEX => ctx.set_result(&(self.parent_index as i64)),
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row_id)
    }
}
