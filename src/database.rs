//! [`Database`]: the bound directory + registered table set.
//!
//! A plain owned struct, not a shared/lockable handle — there is no
//! multi-writer concurrency to support, so there's nothing to share.

use std::collections::HashSet;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::column::ColumnKind;
use crate::error::{Error, Result};
use crate::query::Predicate;
use crate::row::RowId;
use crate::store;
use crate::table::{Table, TableDef, VirtualColumnKind, VirtualValue};
use crate::value::Value;

/// A bound on-disk database: one directory, one fixed set of tables,
/// loaded once via [`Database::connect`].
pub struct Database {
    pub dir: PathBuf,
    tables: Vec<Table>,
    table_pos: FxHashMap<String, usize>,
}

impl Database {
    /// Bind `dir` (creating it if missing), register every `def`, load
    /// each table's file, then reindex all tables.
    pub fn connect(dir: impl Into<PathBuf>, defs: Vec<TableDef>) -> Result<Database> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let mut names = HashSet::new();
        for d in &defs {
            if !names.insert(d.name.clone()) {
                return Err(Error::Schema(format!("duplicate table name {}", d.name)));
            }
        }
        for d in &defs {
            for c in &d.columns {
                if let ColumnKind::Foreign(target) = &c.kind {
                    if !names.contains(target) {
                        return Err(Error::Schema(format!(
                            "table {}: foreign target {target} is not registered",
                            d.name
                        )));
                    }
                }
            }
            for vc in &d.virtual_columns {
                if let VirtualColumnKind::Belongs { table, .. } = &vc.kind {
                    if !names.contains(table) {
                        return Err(Error::Schema(format!(
                            "table {}: belongs target {table} is not registered",
                            d.name
                        )));
                    }
                }
            }
        }

        let mut table_pos = FxHashMap::default();
        let mut tables = Vec::with_capacity(defs.len());
        for (i, def) in defs.into_iter().enumerate() {
            table_pos.insert(def.name.clone(), i);
            tables.push(Table::new(def, dir.clone()));
        }

        let mut db = Database { dir, tables, table_pos };
        for t in &mut db.tables {
            log::info!("connect: loading table {}", t.name);
            store::load(t)?;
        }
        for t in &mut db.tables {
            t.reindex();
        }
        Ok(db)
    }

    /// Flush every table to disk.
    pub fn save(&mut self) -> Result<()> {
        for t in &mut self.tables {
            store::save(t, false)?;
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        let i = *self
            .table_pos
            .get(name)
            .ok_or_else(|| Error::Schema(format!("no such table {name}")))?;
        Ok(&self.tables[i])
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        let i = *self
            .table_pos
            .get(name)
            .ok_or_else(|| Error::Schema(format!("no such table {name}")))?;
        Ok(&mut self.tables[i])
    }

    /// Read a concrete column through the database, for callers that only
    /// have a table name (e.g. following a `Foreign` reference).
    ///
    /// Unlike [`Table::get`], a `Foreign` value is resolved against the
    /// referenced table: if the stored id no longer names a live row
    /// (the row it pointed to was destroyed), this returns
    /// `Value::Foreign(None)` rather than the stale id. `Table::get`
    /// itself stays a raw, context-free read — it has no sibling-table
    /// access, and the query engine/index ordering both need the stored
    /// id as-is, not a resolved lookup.
    pub fn get(&self, table: &str, id: RowId, col: &str) -> Result<Value> {
        let t = self.table(table)?;
        let raw = t.get(id, col)?;
        if let Value::Foreign(Some(rid)) = raw {
            if let Some(ci) = t.col_index(col) {
                if let ColumnKind::Foreign(target) = &t.columns[ci].kind {
                    let target_table = self.table(target)?;
                    if target_table.pos_of(rid).is_err() {
                        return Ok(Value::Foreign(None));
                    }
                }
            }
        }
        Ok(raw)
    }

    /// Evaluate a virtual column.
    pub fn get_virtual(&self, table: &str, id: RowId, col: &str) -> Result<VirtualValue> {
        let t = self.table(table)?;
        let vc = t
            .virtual_columns
            .iter()
            .find(|v| v.name == col)
            .cloned()
            .ok_or_else(|| Error::Schema(format!("no such virtual column {col} on table {table}")))?;
        match vc.kind {
            VirtualColumnKind::Through(path) => self.chase(table, vec![id], &path),
            VirtualColumnKind::Belongs { table: bt, key } => self.belongs(&bt, &key, id),
        }
    }

    fn belongs(&self, target_table: &str, key: &str, id: RowId) -> Result<VirtualValue> {
        let t = self.table(target_table)?;
        let found = t
            .where_(&[Predicate::Eq(key.to_string(), Value::Foreign(Some(id)))])
            .collect::<Result<Vec<_>>>()?;
        Ok(VirtualValue::Many(
            found.into_iter().map(|rid| Value::Foreign(Some(rid))).collect(),
        ))
    }

    /// Chase a dotted attribute path starting from `ids` in `table`,
    /// lifting over any step that fans a single row out into many.
    fn chase(&self, table: &str, ids: Vec<RowId>, path: &[String]) -> Result<VirtualValue> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(VirtualValue::Many(
                ids.into_iter().map(|id| Value::Foreign(Some(id))).collect(),
            ));
        };

        let t = self.table(table)?;
        if let Some(ci) = t.col_index(head) {
            let mut results = Vec::with_capacity(ids.len());
            for id in &ids {
                let v = self.get(table, *id, head)?;
                if rest.is_empty() {
                    results.push(v);
                    continue;
                }
                if let Value::Foreign(Some(next_id)) = v {
                    let target = match &t.columns[ci].kind {
                        ColumnKind::Foreign(tt) => tt.clone(),
                        _ => {
                            return Err(Error::Schema(format!(
                                "{head} is not a foreign column, cannot chase through it"
                            )))
                        }
                    };
                    match self.chase(&target, vec![next_id], rest)? {
                        VirtualValue::One(v2) => results.push(v2),
                        VirtualValue::Many(vs) => results.extend(vs),
                    }
                }
                // Value::Foreign(None): nothing to chase, contributes no values.
            }
            if ids.len() == 1 && rest.is_empty() {
                Ok(VirtualValue::One(results.into_iter().next().unwrap_or(Value::Foreign(None))))
            } else {
                Ok(VirtualValue::Many(results))
            }
        } else if let Some(vc) = t.virtual_columns.iter().find(|v| &v.name == head).cloned() {
            match vc.kind {
                VirtualColumnKind::Belongs { table: bt, key } => {
                    let mut all_ids = Vec::new();
                    for id in &ids {
                        let bt_table = self.table(&bt)?;
                        all_ids.extend(
                            bt_table
                                .where_(&[Predicate::Eq(key.clone(), Value::Foreign(Some(*id)))])
                                .collect::<Result<Vec<_>>>()?,
                        );
                    }
                    if rest.is_empty() {
                        Ok(VirtualValue::Many(
                            all_ids.into_iter().map(|i| Value::Foreign(Some(i))).collect(),
                        ))
                    } else {
                        self.chase(&bt, all_ids, rest)
                    }
                }
                VirtualColumnKind::Through(inner) => {
                    let mut combined = inner.clone();
                    combined.extend_from_slice(rest);
                    self.chase(table, ids, &combined)
                }
            }
        } else {
            Err(Error::Schema(format!("no such attribute {head} on table {table}")))
        }
    }
}
