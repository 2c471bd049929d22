//! [`Row`]: the in-memory record for one live row.

use crate::value::Value;

/// Stable row identifier — the row's `id` field. Unlike a `Vec` position
/// (which moves under offset compaction, see `table.rs::destroy_row`),
/// a `RowId` never changes once assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub i32);

impl RowId {
    /// The reserved "absent" id used by `Foreign` columns.
    pub const ABSENT: RowId = RowId(0);
}

/// One live row: the fixed-size record plus the non-persisted bookkeeping
/// attributes (`_offset`, `_dirty`, `_new`, `_loaded`).
///
/// Decoded values for variable-length columns are simply kept in
/// `values` — there is no separate decode cache, because `load`/`set`
/// always populate `values` eagerly.
#[derive(Clone, Debug)]
pub struct Row {
    /// Stable, monotonically assigned identifier.
    pub id: RowId,
    /// 0-based slot in the table file.
    pub offset: usize,
    /// True if the in-memory image differs from the on-disk image.
    pub dirty: bool,
    /// True if this row has never been written to disk.
    pub new: bool,
    /// True once the row has been fully loaded/created and is
    /// participating in index maintenance.
    pub loaded: bool,
    /// Logical value of each declared concrete column, in declaration
    /// order (the `id` column itself is not included — it lives in `id`
    /// above).
    pub values: Vec<Value>,
}

impl Row {
    /// Construct a brand-new, not-yet-indexed row. Column defaults are
    /// filled in by the caller (`Table::create_row`), one per declared
    /// column.
    pub fn new(id: RowId, offset: usize, values: Vec<Value>) -> Self {
        Row {
            id,
            offset,
            dirty: false,
            new: true,
            loaded: false,
            values,
        }
    }
}
