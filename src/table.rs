//! [`Table`]: the per-table row set, schema, and index catalog. Row id
//! allocation and index bookkeeping live directly on `Table` rather than
//! a separate collaborator.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::column::{ColumnDef, ColumnKind};
use crate::error::{Error, Result};
use crate::index::{Index, IndexKey};
use crate::row::{Row, RowId};
use crate::schema::SchemaDescriptor;
use crate::value::{IndexValue, Value};

/// A read-only derived column.
#[derive(Clone)]
pub enum VirtualColumnKind {
    /// Chase a dotted attribute path, lifting over any step that yields a
    /// collection.
    Through(Vec<String>),
    /// Reverse of a `Foreign`: rows of `table` whose `key` column equals
    /// this row.
    Belongs { table: String, key: String },
}

/// One declared virtual column.
#[derive(Clone)]
pub struct VirtualColumnDef {
    pub name: String,
    pub kind: VirtualColumnKind,
}

impl VirtualColumnDef {
    pub fn through(name: impl Into<String>, path: Vec<String>) -> Self {
        VirtualColumnDef {
            name: name.into(),
            kind: VirtualColumnKind::Through(path),
        }
    }

    pub fn belongs(name: impl Into<String>, table: impl Into<String>, key: impl Into<String>) -> Self {
        VirtualColumnDef {
            name: name.into(),
            kind: VirtualColumnKind::Belongs {
                table: table.into(),
                key: key.into(),
            },
        }
    }
}

/// The result of reading a virtual column: either a single value (the
/// common `Through` case) or a collection (a `Belongs` reverse relation,
/// or a `Through` that crossed one while lifting over an iterable step).
#[derive(Clone, Debug, PartialEq)]
pub enum VirtualValue {
    One(Value),
    Many(Vec<Value>),
}

/// A declarative table description, built with [`TableBuilder`].
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub virtual_columns: Vec<VirtualColumnDef>,
    pub indices: Vec<Vec<String>>,
}

/// Builder for a [`TableDef`].
#[derive(Default)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    virtual_columns: Vec<VirtualColumnDef>,
    indices: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TableBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef::new(name, kind));
        self
    }

    pub fn virtual_column(mut self, def: VirtualColumnDef) -> Self {
        self.virtual_columns.push(def);
        self
    }

    pub fn index(mut self, columns: Vec<&str>) -> Self {
        self.indices
            .push(columns.into_iter().map(String::from).collect());
        self
    }

    pub fn build(self) -> Result<TableDef> {
        let mut seen = std::collections::HashSet::new();
        for c in &self.columns {
            if !seen.insert(c.name.clone()) {
                return Err(Error::Schema(format!(
                    "duplicate column {} in table {}",
                    c.name, self.name
                )));
            }
        }
        for ix in &self.indices {
            for col in ix {
                let def = self.columns.iter().find(|c| &c.name == col).ok_or_else(|| {
                    Error::Schema(format!("index refers to unknown column {col}"))
                })?;
                if !def.kind.indexable() {
                    return Err(Error::Schema(format!(
                        "column {col} cannot be indexed (pickle/blob kind)"
                    )));
                }
            }
        }
        Ok(TableDef {
            name: self.name,
            columns: self.columns,
            virtual_columns: self.virtual_columns,
            indices: self.indices,
        })
    }
}

/// A live, in-memory table: schema, rows, and index catalog.
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub virtual_columns: Vec<VirtualColumnDef>,
    pub declared_indices: Vec<Vec<String>>,
    pub(crate) col_pos: FxHashMap<String, usize>,
    pub(crate) rows: Vec<Row>,
    pub(crate) id_pos: FxHashMap<i32, usize>,
    pub(crate) max_id: i32,
    pub(crate) id_index: Index,
    pub(crate) offset_index: Index,
    pub(crate) dirty_index: Index,
    pub(crate) secondary: Vec<Index>,
    pub(crate) record_size: usize,
    pub full_dump_needed: bool,
    pub(crate) base_dir: PathBuf,
}

impl Table {
    pub fn new(def: TableDef, base_dir: impl Into<PathBuf>) -> Self {
        let col_pos = def
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let secondary = def
            .indices
            .iter()
            .cloned()
            .map(Index::new)
            .collect();
        let record_size = 4 + def.columns.iter().map(ColumnDef::footprint).sum::<usize>();
        Table {
            name: def.name,
            columns: def.columns,
            virtual_columns: def.virtual_columns,
            declared_indices: def.indices,
            col_pos,
            rows: Vec::new(),
            id_pos: FxHashMap::default(),
            max_id: 0,
            id_index: Index::new(Vec::new()),
            offset_index: Index::new(vec!["_offset".into()]),
            dirty_index: Index::new(vec!["_dirty".into()]),
            secondary,
            record_size,
            full_dump_needed: false,
            base_dir: base_dir.into(),
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.tbl", self.name))
    }

    pub fn schema_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::of(&self.columns)
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.col_pos.get(name).copied()
    }

    pub fn live_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.iter().map(|r| r.id)
    }

    /// Current `_offset` of every live row, exposed so the offset-density
    /// invariant can be checked from outside the crate: the multiset of
    /// returned offsets is always `{0, .., n-1}`.
    pub fn live_offsets(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.offset).collect()
    }

    pub(crate) fn pos_of(&self, id: RowId) -> Result<usize> {
        self.id_pos
            .get(&id.0)
            .copied()
            .ok_or_else(|| Error::Schema(format!("no such row {} in table {}", id.0, self.name)))
    }

    fn index_value(&self, row: &Row, col_idx: usize) -> IndexValue {
        IndexValue::try_from(&row.values[col_idx])
            .unwrap_or_else(|_| panic!("column {} is not indexable", self.columns[col_idx].name))
    }

    fn secondary_key(&self, row: &Row, ix: usize) -> IndexKey {
        let cols: Vec<IndexValue> = self.declared_indices[ix]
            .iter()
            .map(|name| {
                let ci = self.col_pos[name];
                self.index_value(row, ci)
            })
            .collect();
        self.secondary[ix].key_for(&cols, row.id)
    }

    fn insert_into_all_indices(&mut self, pos: usize) {
        let row = &self.rows[pos];
        let id_key = self.id_index.key_for(&[], row.id);
        self.id_index.insert(id_key, row.id);
        let off_key = self
            .offset_index
            .key_for(&[IndexValue::Int(row.offset as i32)], row.id);
        self.offset_index.insert(off_key, row.id);
        let dirty_key = self
            .dirty_index
            .key_for(&[IndexValue::Bool(row.dirty)], row.id);
        self.dirty_index.insert(dirty_key, row.id);
        for ix in 0..self.secondary.len() {
            let key = self.secondary_key(&self.rows[pos], ix);
            self.secondary[ix].insert(key, row.id);
        }
    }

    fn remove_from_all_indices(&mut self, pos: usize) {
        let row = &self.rows[pos];
        let id = row.id;
        let id_key = self.id_index.key_for(&[], id);
        self.id_index.remove(&id_key);
        let off_key = self
            .offset_index
            .key_for(&[IndexValue::Int(row.offset as i32)], id);
        self.offset_index.remove(&off_key);
        let dirty_key = self.dirty_index.key_for(&[IndexValue::Bool(row.dirty)], id);
        self.dirty_index.remove(&dirty_key);
        for ix in 0..self.secondary.len() {
            let key = self.secondary_key(&self.rows[pos], ix);
            self.secondary[ix].remove(&key);
        }
    }

    fn set_dirty(&mut self, pos: usize, dirty: bool) {
        let row = &self.rows[pos];
        if row.dirty == dirty {
            return;
        }
        let id = row.id;
        let old_key = self.dirty_index.key_for(&[IndexValue::Bool(row.dirty)], id);
        self.dirty_index.remove(&old_key);
        self.rows[pos].dirty = dirty;
        let new_key = self.dirty_index.key_for(&[IndexValue::Bool(dirty)], id);
        self.dirty_index.insert(new_key, id);
    }

    /// Create a new row, id/offset assigned, indexed, and marked dirty
    ///.
    pub fn create_row(&mut self) -> RowId {
        self.max_id += 1;
        let id = RowId(self.max_id);
        let offset = match self.offset_index.max() {
            Some((key, _)) => match key[0] {
                IndexValue::Int(o) => o as usize + 1,
                _ => unreachable!(),
            },
            None => 0,
        };
        let values = self.columns.iter().map(|c| c.kind.default_value()).collect();
        let mut row = Row::new(id, offset, values);
        row.dirty = true;
        row.new = true;
        row.loaded = true;
        let pos = self.rows.len();
        self.id_pos.insert(id.0, pos);
        self.rows.push(row);
        self.insert_into_all_indices(pos);
        id
    }

    /// Destroy a row, relocating the highest-offset row into the freed
    /// slot so `_offset` stays a dense `[0, n)` permutation.
    pub fn destroy_row(&mut self, id: RowId) -> Result<()> {
        let pos = self.pos_of(id)?;
        let removed_offset = self.rows[pos].offset;
        self.remove_from_all_indices(pos);

        let last = self.rows.len() - 1;
        self.rows.swap_remove(pos);
        self.id_pos.remove(&id.0);
        if pos != last {
            let moved_id = self.rows[pos].id;
            self.id_pos.insert(moved_id.0, pos);
        }

        if let Some((key, rid)) = self.offset_index.max() {
            let max_off = match key[0] {
                IndexValue::Int(o) => o as usize,
                _ => unreachable!(),
            };
            if max_off > removed_offset {
                let key = key.clone();
                self.offset_index.remove(&key);
                let rpos = *self.id_pos.get(&rid.0).expect("relocated row present");
                self.rows[rpos].offset = removed_offset;
                let new_key = self
                    .offset_index
                    .key_for(&[IndexValue::Int(removed_offset as i32)], rid);
                self.offset_index.insert(new_key, rid);
                self.set_dirty(rpos, true);
            }
        }
        Ok(())
    }

    /// Get a concrete column's logical value.
    pub fn get(&self, id: RowId, col: &str) -> Result<Value> {
        let ci = *self
            .col_pos
            .get(col)
            .ok_or_else(|| Error::Schema(format!("no such column {col} in table {}", self.name)))?;
        let pos = self.pos_of(id)?;
        Ok(self.rows[pos].values[ci].clone())
    }

    /// Set a concrete column's logical value, validating first and
    /// maintaining indices/dirty state.
    pub fn set(&mut self, id: RowId, col: &str, value: Value) -> Result<()> {
        let ci = *self
            .col_pos
            .get(col)
            .ok_or_else(|| Error::Schema(format!("no such column {col} in table {}", self.name)))?;
        self.columns[ci].validate(&value)?;
        let pos = self.pos_of(id)?;

        let loaded = self.rows[pos].loaded;
        let touched: Vec<usize> = if loaded {
            (0..self.secondary.len())
                .filter(|&ix| self.declared_indices[ix].iter().any(|c| self.col_pos[c] == ci))
                .collect()
        } else {
            Vec::new()
        };
        let old_keys: Vec<IndexKey> = touched
            .iter()
            .map(|&ix| self.secondary_key(&self.rows[pos], ix))
            .collect();
        for (k, &ix) in old_keys.iter().zip(&touched) {
            self.secondary[ix].remove(k);
        }

        self.rows[pos].values[ci] = value;

        for &ix in &touched {
            let key = self.secondary_key(&self.rows[pos], ix);
            let id = self.rows[pos].id;
            self.secondary[ix].insert(key, id);
        }
        if loaded {
            self.set_dirty(pos, true);
        }
        Ok(())
    }

    /// Maximum value of an indexed column, used internally for `max_id`
    /// and `max(_offset)` and exposed for user queries.
    pub fn max(&self, col: &str) -> Option<Value> {
        match col {
            "id" => self.id_index.max().map(|(k, _)| match k[0] {
                IndexValue::Id(i) => Value::Int(i),
                _ => unreachable!(),
            }),
            "_offset" => self.offset_index.max().map(|(k, _)| match k[0] {
                IndexValue::Int(o) => Value::Int(o),
                _ => unreachable!(),
            }),
            "_dirty" => self.dirty_index.max().map(|(k, _)| match k[0] {
                IndexValue::Bool(b) => Value::Bool(b),
                _ => unreachable!(),
            }),
            _ => self
                .secondary
                .iter()
                .position(|ix| ix.columns.first().map(|c| c.as_str()) == Some(col))
                .and_then(|ix| self.secondary[ix].max())
                .map(|(k, _)| match &k[0] {
                    IndexValue::Int(i) => Value::Int(*i),
                    IndexValue::Bool(b) => Value::Bool(*b),
                    IndexValue::Str(s) => Value::Str(s.clone()),
                    IndexValue::Bytes(b) => Value::Bytes(b.clone()),
                    IndexValue::Foreign(f) => Value::Foreign(*f),
                    IndexValue::Id(i) => Value::Int(*i),
                }),
        }
    }

    /// Rebuild every index from scratch over the current row set. Used
    /// after bulk load and after migration.
    pub fn reindex(&mut self) {
        self.id_index = Index::new(Vec::new());
        self.offset_index = Index::new(vec!["_offset".into()]);
        self.dirty_index = Index::new(vec!["_dirty".into()]);
        for ix in &mut self.secondary {
            *ix = Index::new(ix.columns.clone());
        }
        for pos in 0..self.rows.len() {
            self.insert_into_all_indices(pos);
        }
    }
}
