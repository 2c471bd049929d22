//! On-disk load/save for one [`Table`]. One `std::fs::File` is opened and
//! closed per call — a scoped open/seek/close around the backing file,
//! with no file descriptor held between calls.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::row::{Row, RowId};
use crate::schema::SchemaDescriptor;
use crate::table::Table;
use crate::util::get_i32;
use crate::value::IndexValue;

fn header_bytes(table: &Table) -> Result<Vec<u8>> {
    let schema = table.schema_descriptor().encode()?;
    let mut out = Vec::with_capacity(4 + schema.len());
    out.extend_from_slice(&(schema.len() as u32).to_le_bytes());
    out.extend_from_slice(&schema);
    Ok(out)
}

/// Read records from `file` (cursor already past the schema header) into
/// `table`, assigning successive `_offset` values `0..`. Does not rebuild
/// indices — callers call `table.reindex()` once all rows are in place.
pub(crate) fn load_records(table: &mut Table, file: &mut File) -> Result<()> {
    let path = table.file_path();
    for col in &table.columns {
        col.load_col(table.base_dir(), &table.name)?;
    }
    let record_size = table.record_size();
    let mut buf = vec![0u8; record_size];
    let mut offset = 0usize;
    let mut max_id = 0i32;
    loop {
        match file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::io(&path, e)),
        }
        let id = get_i32(&buf, 0);
        let body = &buf[4..];
        let mut values = Vec::with_capacity(table.columns.len());
        let mut col_off = 0usize;
        for col in &table.columns {
            let v = col.load(table.base_dir(), &table.name, body, col_off, offset)?;
            values.push(v);
            col_off += col.footprint();
        }
        let mut row = Row::new(RowId(id), offset, values);
        row.dirty = false;
        row.new = false;
        row.loaded = true;
        let pos = table.rows.len();
        table.id_pos.insert(id, pos);
        table.rows.push(row);
        max_id = max_id.max(id);
        offset += 1;
    }
    table.max_id = max_id;
    Ok(())
}

/// Load a table's `.tbl` file. If the on-disk schema doesn't byte-equal
/// the declared one, hands off to `migrate::run`. A
/// missing file means a brand new table — nothing to load.
pub fn load(table: &mut Table) -> Result<()> {
    let path = table.file_path();
    if !path.exists() {
        log::debug!("table {}: no file at {}, starting empty", table.name, path.display());
        return Ok(());
    }
    let mut file = File::open(&path).map_err(|e| Error::io(&path, e))?;
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(|e| Error::io(&path, e))?;
    let schema_len = u32::from_le_bytes(len_buf) as usize;
    let mut schema_bytes = vec![0u8; schema_len];
    file.read_exact(&mut schema_bytes).map_err(|e| Error::io(&path, e))?;

    let declared_bytes = table.schema_descriptor().encode()?;
    if schema_bytes != declared_bytes {
        log::info!("table {}: on-disk schema differs, migrating", table.name);
        let stored = SchemaDescriptor::decode(&schema_bytes)?;
        crate::migrate::run(table, stored, &mut file)?;
        return Ok(());
    }

    load_records(table, &mut file)?;
    table.reindex();
    log::debug!("table {}: loaded {} rows", table.name, table.live_count());
    Ok(())
}

fn write_row(table: &Table, pos: usize, record_size: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; record_size];
    let row = &table.rows[pos];
    buf[0..4].copy_from_slice(&row.id.0.to_le_bytes());
    let body = &mut buf[4..];
    let mut col_off = 0usize;
    for (ci, col) in table.columns.iter().enumerate() {
        col.dump(table.base_dir(), &table.name, body, col_off, row.offset, &row.values[ci])?;
        col_off += col.footprint();
    }
    Ok(buf)
}

fn clear_dirty_and_reindex(table: &mut Table) {
    for row in &mut table.rows {
        row.dirty = false;
        row.new = false;
    }
    table.reindex();
}

/// Full rewrite: truncate/recreate the file, write the schema header, then
/// every row in `_offset` order.
fn save_full(table: &mut Table) -> Result<()> {
    let path = table.file_path();
    for col in &table.columns {
        col.load_col(table.base_dir(), &table.name)?;
    }
    let header = header_bytes(table)?;
    let mut file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    file.write_all(&header).map_err(|e| Error::io(&path, e))?;

    let record_size = table.record_size();
    let ordered: Vec<RowId> = table.offset_index.find(None, false).map(|(_, id)| id).collect();
    for id in ordered {
        let pos = table.pos_of(id)?;
        let buf = write_row(table, pos, record_size)?;
        file.write_all(&buf).map_err(|e| Error::io(&path, e))?;
    }

    clear_dirty_and_reindex(table);
    table.full_dump_needed = false;
    log::info!("table {}: full save, {} rows", table.name, table.live_count());
    Ok(())
}

/// Incremental save: rewrite only dirty records in place, then truncate to
/// the live extent.
fn save_incremental(table: &mut Table) -> Result<()> {
    let path = table.file_path();
    for col in &table.columns {
        col.load_col(table.base_dir(), &table.name)?;
    }
    let header_len = header_bytes(table)?.len();
    let record_size = table.record_size();

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| Error::io(&path, e))?;

    let dirty_ids: Vec<RowId> = table
        .dirty_index
        .find(Some(vec![IndexValue::Bool(true)]), false)
        .take_while(|(k, _)| matches!(k[0], IndexValue::Bool(true)))
        .map(|(_, id)| id)
        .collect();

    for id in dirty_ids {
        let pos = table.pos_of(id)?;
        let offset = table.rows[pos].offset;
        let buf = write_row(table, pos, record_size)?;
        let seek_pos = (header_len + offset * record_size) as u64;
        file.seek(SeekFrom::Start(seek_pos)).map_err(|e| Error::io(&path, e))?;
        file.write_all(&buf).map_err(|e| Error::io(&path, e))?;
    }

    let max_offset = table.rows.iter().map(|r| r.offset).max();
    let new_len = header_len as u64
        + match max_offset {
            Some(m) => ((m + 1) * record_size) as u64,
            None => 0,
        };
    file.set_len(new_len).map_err(|e| Error::io(&path, e))?;

    clear_dirty_and_reindex(table);
    log::debug!("table {}: incremental save", table.name);
    Ok(())
}

/// Flush a table to disk, choosing full vs incremental: falls back to a
/// full rewrite if the file is absent or `full_dump_needed` is set.
pub fn save(table: &mut Table, force_full: bool) -> Result<()> {
    let needs_full = force_full || table.full_dump_needed || !table.file_path().exists();
    if needs_full {
        save_full(table)
    } else {
        save_incremental(table)
    }
}
