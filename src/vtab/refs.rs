//! The `refs` virtual table.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::ffi;
use rusqlite::types::Null;
use rusqlite::vtab::{
    Context, IndexConstraintOp, IndexInfo, VTab, VTabConnection, VTabCursor, Values,
};

use crate::git::RefInfo;
use crate::sql::schema::require_table_info;

use super::{require_aux, vtab_err, VtabContext};

const COL_NAME: usize = 0;
const COL_SHORT_NAME: usize = 1;
const COL_TARGET: usize = 2;
const COL_KIND: usize = 3;

const IDX_NAME: c_int = 1;

#[repr(C)]
pub struct RefsTab {
    base: ffi::sqlite3_vtab,
    ctx: Arc<VtabContext>,
}

unsafe impl<'vtab> VTab<'vtab> for RefsTab {
    type Aux = Arc<VtabContext>;
    type Cursor = RefsCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let ctx = require_aux(aux)?;
        let schema = require_table_info("refs")
            .map_err(vtab_err)?
            .declaration();
        Ok((
            schema,
            RefsTab {
                base: ffi::sqlite3_vtab::default(),
                ctx,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let mut name_constraint = None;
        for (i, constraint) in info.constraints().enumerate() {
            if constraint.is_usable()
                && constraint.operator() == IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ
                && constraint.column() as usize == COL_NAME
            {
                name_constraint = Some(i);
            }
        }

        let mut idx_num = 0;
        if let Some(i) = name_constraint {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(1);
            usage.set_omit(true);
            idx_num |= IDX_NAME;
        }
        info.set_idx_num(idx_num);
        info.set_estimated_cost(if idx_num != 0 { 1.0 } else { 100.0 });
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(RefsCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            ctx: self.ctx.clone(),
            rows: Vec::new(),
            position: 0,
            phantom: PhantomData,
        })
    }
}

#[repr(C)]
pub struct RefsCursor<'vtab> {
    base: ffi::sqlite3_vtab_cursor,
    ctx: Arc<VtabContext>,
    rows: Vec<RefInfo>,
    position: usize,
    phantom: PhantomData<&'vtab RefsTab>,
}

unsafe impl VTabCursor for RefsCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let mut rows = self.ctx.repo.list_refs().map_err(vtab_err)?;
        if idx_num & IDX_NAME != 0 {
            match args.get::<Option<String>>(0)? {
                Some(name) => rows.retain(|r| r.name == name || r.short_name == name),
                None => rows.clear(),
            }
        }
        self.rows = rows;
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.position += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.position >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Some(row) = self.rows.get(self.position) else {
            return ctx.set_result(&Null);
        };
        match i as usize {
            COL_NAME => ctx.set_result(&row.name),
            COL_SHORT_NAME => ctx.set_result(&row.short_name),
            COL_TARGET => ctx.set_result(&row.target.map(|t| t.to_string())),
            COL_KIND => ctx.set_result(&row.kind.as_str()),
            _ => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.position as i64)
    }
}
