//! Run-time [`Value`], the logical high-level type columns translate to
//! and from.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::row::RowId;

/// A dynamically-typed value stored by a `Pickle`/`PickleBlob` column.
///
/// Models what the original Python prototype stores via `pickle.dumps` on
/// an arbitrary Python object: scalars, strings, bytes, and nested
/// lists/maps. `bincode` gives this a byte-identical, deterministic wire
/// form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PickleValue {
    /// Absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A sequence of values.
    List(Vec<PickleValue>),
    /// A sequence of named values (field order preserved, unlike a `HashMap`).
    Map(Vec<(String, PickleValue)>),
}

impl PickleValue {
    /// Short, human-readable description of this value's shape, used in
    /// [`crate::error::Error::TypeMismatch`] messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PickleValue::Null => "null",
            PickleValue::Bool(_) => "bool",
            PickleValue::Int(_) => "int",
            PickleValue::Float(_) => "float",
            PickleValue::Str(_) => "str",
            PickleValue::Bytes(_) => "bytes",
            PickleValue::List(_) => "list",
            PickleValue::Map(_) => "map",
        }
    }
}

/// The logical value of a concrete column, as seen through the public
/// getter/setter API.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `Int` column value.
    Int(i32),
    /// `Bool` column value.
    Bool(bool),
    /// `Bytes(N)`/`BytesBlob` column value.
    Bytes(Vec<u8>),
    /// `String(N)`/`StringBlob` column value.
    Str(String),
    /// `Pickle(N)`/`PickleBlob` column value.
    Pickle(PickleValue),
    /// `Foreign(T)` column value: `None` is the "absent" (id 0) case.
    Foreign(Option<RowId>),
}

impl Value {
    /// Human-readable description of this value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "str",
            Value::Pickle(p) => p.kind_name(),
            Value::Foreign(_) => "foreign",
        }
    }
}

/// The restricted, totally-ordered projection of [`Value`] that secondary
/// indices and query predicates operate on.
///
/// `Pickle` and blob-backed columns have no [`IndexValue`] representation
/// — they cannot appear in a declared index or as a comparison predicate
/// (enforced at table-registration time, see `error::Error::Schema`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexValue {
    /// Ordered by plain integer comparison.
    Int(i32),
    /// `false` sorts before `true`.
    Bool(bool),
    /// Ordered lexicographically by byte value.
    Bytes(Vec<u8>),
    /// Ordered lexicographically (Rust's `String`/`str` `Ord` is byte-wise
    /// on UTF-8, which is also codepoint order).
    Str(String),
    /// A `Foreign` value sorts by the referenced row's id; `None` (absent)
    /// sorts less than any row, modeled here by wrapping in `Option`, where `None < Some(_)`.
    Foreign(Option<RowId>),
    /// The trailing tie-break component every index key carries. Never produced by
    /// [`TryFrom<&Value>`] — appended by `index.rs` itself when composing
    /// a key, never derived from a column's logical value.
    Id(i32),
}

impl TryFrom<&Value> for IndexValue {
    type Error = ();

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Int(i) => IndexValue::Int(*i),
            Value::Bool(b) => IndexValue::Bool(*b),
            Value::Bytes(b) => IndexValue::Bytes(b.clone()),
            Value::Str(s) => IndexValue::Str(s.clone()),
            Value::Foreign(id) => IndexValue::Foreign(*id),
            Value::Pickle(_) => return Err(()),
        })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Pickle(p) => write!(f, "pickle({})", p.kind_name()),
            Value::Foreign(id) => match id {
                Some(id) => write!(f, "->{}", id.0),
                None => write!(f, "->none"),
            },
        }
    }
}

/// Always tie-break by row id: compares two `(key, id)` pairs where `key`
/// has already compared equal.
pub fn break_tie(a_id: RowId, b_id: RowId) -> Ordering {
    a_id.0.cmp(&b_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_none_sorts_below_some() {
        let mut values = vec![
            IndexValue::Foreign(Some(RowId(3))),
            IndexValue::Foreign(None),
            IndexValue::Foreign(Some(RowId(1))),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                IndexValue::Foreign(None),
                IndexValue::Foreign(Some(RowId(1))),
                IndexValue::Foreign(Some(RowId(3))),
            ]
        );
    }

    #[test]
    fn pickle_not_indexable() {
        let v = Value::Pickle(PickleValue::Int(1));
        assert!(IndexValue::try_from(&v).is_err());
    }
}
