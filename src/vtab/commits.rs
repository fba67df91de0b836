//! The `commits` virtual table.

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

const COL_ID: usize = 0;
const COL_SHORT_ID: usize = 1;
const COL_AUTHOR_NAME: usize = 2;
const COL_AUTHOR_EMAIL: usize = 3;
const COL_AUTHORED_AT: usize = 4;
const COL_COMMITTER_NAME: usize = 5;
const COL_COMMITTER_EMAIL: usize = 6;
const COL_COMMITTED_AT: usize = 7;
const COL_SUMMARY: usize = 8;
const COL_MESSAGE: usize = 9;
const COL_TREE_ID: usize = 10;
const COL_PARENT_COUNT: usize = 11;
const COL_AT_REF: usize = 12;

const IDX_ID: c_int = 1;
const IDX_REF: c_int = 2;

#[repr(C)]
pub struct CommitsTab {
    base: ffi::sqlite3_vtab,
    ctx: Arc<VtabContext>,
}

unsafe impl<'vtab> VTab<'vtab> for CommitsTab {
    type Aux = Arc<VtabContext>;
    type Cursor = CommitsCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let ctx = require_aux(aux)?;
        let schema = require_table_info("commits")
            .map_err(super::vtab_err)?
            .declaration();
        Ok((
            schema,
            CommitsTab {
                base: ffi::sqlite3_vtab::default(),
                ctx,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let mut id_constraint = None;
        let mut ref_constraint = None;
        for (i, constraint) in info.constraints().enumerate() {
            if !constraint.is_usable()
                || constraint.operator() != IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ
            {
                continue;
            }
            match constraint.column() as usize {
                COL_ID => id_constraint = Some(i),
                COL_AT_REF => ref_constraint = Some(i),
                _ => {}
            }
        }

        let mut idx_num = 0;
        let mut argv = 1;
        if let Some(i) = id_constraint {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(argv);
            usage.set_omit(true);
            argv += 1;
            idx_num |= IDX_ID;
        }
        if let Some(i) = ref_constraint {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(argv);
            usage.set_omit(true);
            idx_num |= IDX_REF;
        }
        info.set_idx_num(idx_num);
        info.set_estimated_cost(if idx_num & IDX_ID != 0 {
            1.0
        } else if idx_num & IDX_REF != 0 {
            1_000.0
        } else {
            1_000_000.0
        });
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(CommitsCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            ctx: self.ctx.clone(),
            source: CommitSource::Empty,
            current: None,
            pushed_ref: None,
            row_id: 0,
            phantom: PhantomData,
        })
    }
}

#[repr(C)]
pub struct CommitsCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    ctx: Arc<VtabContext>,
    source: CommitSource,
    current: Option<Arc<CommitInfo>>,
    pushed_ref: Option<String>,
    row_id: i64,
    phantom: PhantomData<&'vtab CommitsTab>,
}

unsafe impl VTabCursor for CommitsCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let mut arg_i = 0;
        let mut pushed_id: Option<String> = None;
        let mut id_was_null = false;
        if idx_num & IDX_ID != 0 {
            pushed_id = args.get(arg_i)?;
            id_was_null = pushed_id.is_none();
            arg_i += 1;
        }
        let mut ref_was_null = false;
        self.pushed_ref = None;
        if idx_num & IDX_REF != 0 {
            self.pushed_ref = args.get(arg_i)?;
            ref_was_null = self.pushed_ref.is_none();
        }

        // A NULL compared with `=` matches nothing.
        self.source = if id_was_null || ref_was_null {
            CommitSource::Empty
        } else if let Some(id) = pushed_id {
            CommitSource::for_id(&self.ctx, &id)?
        } else if let Some(name) = self.pushed_ref.clone() {
            CommitSource::for_ref(&self.ctx, &name)?
        } else {
            CommitSource::unqualified(&self.ctx)?
        };
        self.row_id = 0;
        self.current = self.source.next_info()?;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.current = self.source.next_info()?;
        self.row_id += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.current.is_none()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Some(info) = &self.current else {
            return ctx.set_result(&Null);
        };
        match i as usize {
            COL_ID => ctx.set_result(&info.id.to_string()),
            COL_SHORT_ID => ctx.set_result(&short_id(info)),
            COL_AUTHOR_NAME => ctx.set_result(&info.author_name),
            COL_AUTHOR_EMAIL => ctx.set_result(&info.author_email),
            COL_AUTHORED_AT => ctx.set_result(&info.authored_at),
            COL_COMMITTER_NAME => ctx.set_result(&info.committer_name),
            COL_COMMITTER_EMAIL => ctx.set_result(&info.committer_email),
            COL_COMMITTED_AT => ctx.set_result(&info.committed_at),
            COL_SUMMARY => ctx.set_result(&info.summary),
            COL_MESSAGE => ctx.set_result(&info.message),
            COL_TREE_ID => ctx.set_result(&info.tree_id.to_string()),
            COL_PARENT_COUNT => ctx.set_result(&(info.parents.len() as i64)),
            COL_AT_REF => ctx.set_result(&self.pushed_ref),
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row_id)
    }
}

fn short_id(info: &CommitInfo) -> String {
    let id = info.id.to_string();
    id.chars().take(7).collect()
}
