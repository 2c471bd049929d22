//! [`Index`]: an ordered map from a composite key to a row id.
//!
//! Backed by a sorted map rather than a page tree: a table's indices
//! don't persist on disk in their own right, they're rebuilt from the
//! `.tbl` file on every `connect`, so a plain in-memory `BTreeMap` is the
//! idiomatic substitute for an on-disk sorted tree.

use std::collections::BTreeMap;

use crate::row::RowId;
use crate::value::IndexValue;

/// A composed index key: the declared column values in order, always
/// ending with the row's id.
pub type IndexKey = Vec<IndexValue>;

/// One secondary (or default) index on a table.
pub struct Index {
    /// Declared column names this index orders by, NOT including the
    /// trailing `id`.
    pub columns: Vec<String>,
    map: BTreeMap<IndexKey, RowId>,
}

impl Index {
    pub fn new(columns: Vec<String>) -> Self {
        Index {
            columns,
            map: BTreeMap::new(),
        }
    }

    /// Compose a full key from this index's column values plus `id`.
    pub fn key_for(&self, col_values: &[IndexValue], id: RowId) -> IndexKey {
        let mut key = Vec::with_capacity(col_values.len() + 1);
        key.extend_from_slice(col_values);
        key.push(IndexValue::Id(id.0));
        key
    }

    pub fn insert(&mut self, key: IndexKey, id: RowId) {
        self.map.insert(key, id);
    }

    pub fn remove(&mut self, key: &IndexKey) {
        self.map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Ordered traversal starting at `start` (or the minimum/maximum when
    /// `None`) and proceeding forward, or backward when `reverse`. `start`
    /// need not carry a trailing `id` component — a shorter prefix
    /// compares less than any full key sharing that prefix, which is
    /// exactly "first key >= start" for a bare prefix.
    pub fn find(
        &self,
        start: Option<IndexKey>,
        reverse: bool,
    ) -> Box<dyn Iterator<Item = (&IndexKey, RowId)> + '_> {
        match (start, reverse) {
            (None, false) => Box::new(self.map.iter().map(|(k, v)| (k, *v))),
            (None, true) => Box::new(self.map.iter().rev().map(|(k, v)| (k, *v))),
            (Some(s), false) => Box::new(self.map.range(s..).map(|(k, v)| (k, *v))),
            (Some(s), true) => Box::new(self.map.range(..=s).rev().map(|(k, v)| (k, *v))),
        }
    }

    /// The maximum key currently in the index, used to implement
    /// `Table::max`.
    pub fn max(&self) -> Option<(&IndexKey, RowId)> {
        self.map.iter().next_back().map(|(k, v)| (k, *v))
    }
}
