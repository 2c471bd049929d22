//! Schema migration: triggered when a `.tbl` file's on-disk
//! schema doesn't byte-equal the declared one. Builds an unregistered
//! "shadow table" from the stored descriptor, loads it, and copies
//! matching columns into the live table by name.
//!
//! The shadow table is a plain [`Table`] built from a [`TableDef`], never
//! registered with the live database and dropped at the end of this
//! function — its lifetime is scoped entirely to the migration call.

use std::fs::File;

use crate::column::ColumnDef;
use crate::error::Result;
use crate::store;
use crate::table::{Table, TableDef};

/// Copy every row of the on-disk table (described by `stored`) into
/// `table` under its current (possibly different) schema, then mark
/// `table` for a full rewrite on the next save.
pub fn run(table: &mut Table, stored: crate::schema::SchemaDescriptor, file: &mut File) -> Result<()> {
    let shadow_columns: Vec<ColumnDef> = stored
        .columns
        .iter()
        .map(|(name, desc)| ColumnDef::new(name.clone(), desc.to_kind()))
        .collect();
    // Sidecar blob paths are addressed as `<table.name>_<col>/<offset>.dat`
    // (column.rs::sidecar_dir) — the shadow table must keep the live
    // table's own name, not a synthetic one, or a blob column's existing
    // files would resolve under the wrong directory and load as absent.
    let shadow_def = TableDef {
        name: table.name.clone(),
        columns: shadow_columns,
        virtual_columns: Vec::new(),
        indices: Vec::new(),
    };
    let mut shadow = Table::new(shadow_def, table.base_dir().to_path_buf());
    store::load_records(&mut shadow, file)?;
    shadow.reindex();

    log::info!(
        "table {}: migrating {} rows from on-disk schema",
        table.name,
        shadow.live_count()
    );

    let shadow_ids: Vec<_> = shadow.row_ids().collect();
    let live_columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
    for shadow_id in shadow_ids {
        let new_id = table.create_row();
        for name in &live_columns {
            if shadow.col_index(name).is_some() {
                let v = shadow.get(shadow_id, name)?;
                table.set(new_id, name, v)?;
            }
        }
        // Rows carried over from disk are not "new" — they already exist
        // in the logical table, just under a stale on-disk layout.
        let pos = table.pos_of(new_id)?;
        table.rows[pos].new = false;
    }

    table.full_dump_needed = true;
    Ok(())
}
