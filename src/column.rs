//! [`ColumnDef`]/[`ColumnKind`]: the typed concrete-column contract. A
//! small closed set of on-disk kinds, each knowing its own footprint and
//! its own encode/decode, factored along two orthogonal axes rather than
//! one flat enum of behaviors:
//!
//! - backend (inline, bounded-in-record vs sidecar, external per-row
//!   file): every sidecar is simply `<table>_<col>/<offset>.dat`, since
//!   there's no shared page pool across tables to allocate from.
//! - value codec (UTF-8 string, `bincode`-serialized [`PickleValue`], raw
//!   bytes), selected by [`ColumnKind`]'s variant rather than a separate
//!   trait object, since the codec and the backend are both fully
//!   determined by the variant (no column mixes codecs).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::row::RowId;
use crate::util::{get_bool, get_i32, get_u32, set_bool, set_i32, set_u32};
use crate::value::{PickleValue, Value};

/// Extra behavior attached to `Pickle`/`PickleBlob` columns.
#[derive(Clone)]
pub struct PickleSpec {
    /// Inline capacity in bytes. Ignored (must be 0) for `PickleBlob`.
    pub capacity: u32,
    /// Optional runtime type gate; `set` fails with `TypeMismatch` if this
    /// returns `false`.
    pub type_check: Option<fn(&PickleValue) -> bool>,
    /// Human-readable name of the accepted type, used in error messages.
    pub type_name: &'static str,
    /// Lazily-evaluated default used when the sidecar/inline payload is
    /// absent or empty.
    pub default: Option<fn() -> PickleValue>,
}

impl PickleSpec {
    /// A `Pickle`/`PickleBlob` column with no type restriction.
    pub fn any(capacity: u32) -> Self {
        PickleSpec {
            capacity,
            type_check: None,
            type_name: "any",
            default: None,
        }
    }

    fn default_value(&self) -> PickleValue {
        match self.default {
            Some(f) => f(),
            None => PickleValue::Null,
        }
    }

    fn check(&self, v: &PickleValue) -> Result<()> {
        if let Some(check) = self.type_check {
            if !check(v) {
                return Err(Error::TypeMismatch {
                    expected: self.type_name,
                    got: v.kind_name(),
                });
            }
        }
        Ok(())
    }
}

/// The declared kind of one concrete column.
#[derive(Clone)]
pub enum ColumnKind {
    /// Signed 32-bit integer.
    Int,
    /// Single byte, 0/1.
    Bool,
    /// 32-bit id referencing a row of the named table; 0 = absent.
    Foreign(String),
    /// Inline length-prefixed raw bytes, capacity `N`.
    Bytes(u32),
    /// Inline length-prefixed UTF-8 string, capacity `N` bytes.
    Str(u32),
    /// Inline length-prefixed serialized value, capacity `N` bytes.
    Pickle(PickleSpec),
    /// Sidecar raw bytes, zero inline footprint.
    BytesBlob,
    /// Sidecar UTF-8 string, zero inline footprint.
    StrBlob,
    /// Sidecar serialized value, zero inline footprint.
    PickleBlob(PickleSpec),
}

/// Structural shape of a [`ColumnKind`] with function pointers stripped —
/// what actually gets written to the `.tbl` schema header. `fn` pointers
/// aren't what migration keys off of: two declarations with the same
/// shape but different `Pickle.type`/`default` closures are, correctly,
/// indistinguishable on disk and do not trigger a migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKindDescriptor {
    Int,
    Bool,
    Foreign(String),
    Bytes(u32),
    Str(u32),
    Pickle(u32),
    BytesBlob,
    StrBlob,
    PickleBlob,
}

impl ColumnKind {
    /// On-disk footprint in bytes. No implicit padding is inserted
    /// between fields regardless of neighbors — the record is the plain
    /// packed concatenation of footprints, `Bool` included.
    pub fn footprint(&self) -> usize {
        match self {
            ColumnKind::Int | ColumnKind::Foreign(_) => 4,
            ColumnKind::Bool => 1,
            ColumnKind::Bytes(n) | ColumnKind::Str(n) => 4 + *n as usize,
            ColumnKind::Pickle(spec) => 4 + spec.capacity as usize,
            ColumnKind::BytesBlob | ColumnKind::StrBlob | ColumnKind::PickleBlob(_) => 0,
        }
    }

    /// The default logical value used to initialize a freshly created row,
    /// or a row loaded from a schema where this column didn't exist.
    pub fn default_value(&self) -> Value {
        match self {
            ColumnKind::Int => Value::Int(0),
            ColumnKind::Bool => Value::Bool(false),
            ColumnKind::Foreign(_) => Value::Foreign(None),
            ColumnKind::Bytes(_) | ColumnKind::BytesBlob => Value::Bytes(Vec::new()),
            ColumnKind::Str(_) | ColumnKind::StrBlob => Value::Str(String::new()),
            ColumnKind::Pickle(spec) | ColumnKind::PickleBlob(spec) => {
                Value::Pickle(spec.default_value())
            }
        }
    }

    fn sidecar(&self) -> bool {
        matches!(
            self,
            ColumnKind::BytesBlob | ColumnKind::StrBlob | ColumnKind::PickleBlob(_)
        )
    }

    /// Whether this kind may appear as a declared index/predicate column
    /// (blob and pickle columns have no ordered projection).
    pub fn indexable(&self) -> bool {
        matches!(
            self,
            ColumnKind::Int | ColumnKind::Bool | ColumnKind::Foreign(_) | ColumnKind::Bytes(_) | ColumnKind::Str(_)
        )
    }

    pub fn descriptor(&self) -> ColumnKindDescriptor {
        match self {
            ColumnKind::Int => ColumnKindDescriptor::Int,
            ColumnKind::Bool => ColumnKindDescriptor::Bool,
            ColumnKind::Foreign(t) => ColumnKindDescriptor::Foreign(t.clone()),
            ColumnKind::Bytes(n) => ColumnKindDescriptor::Bytes(*n),
            ColumnKind::Str(n) => ColumnKindDescriptor::Str(*n),
            ColumnKind::Pickle(s) => ColumnKindDescriptor::Pickle(s.capacity),
            ColumnKind::BytesBlob => ColumnKindDescriptor::BytesBlob,
            ColumnKind::StrBlob => ColumnKindDescriptor::StrBlob,
            ColumnKind::PickleBlob(_) => ColumnKindDescriptor::PickleBlob,
        }
    }
}

impl ColumnKindDescriptor {
    /// Reconstruct a (type-check-free) [`ColumnKind`] for a migration
    /// shadow table. The reconstructed `Pickle`/`PickleBlob`
    /// kinds accept any value — the original `type_check`/`default`
    /// closures aren't stored on disk and aren't needed to decode bytes.
    pub fn to_kind(&self) -> ColumnKind {
        match self {
            ColumnKindDescriptor::Int => ColumnKind::Int,
            ColumnKindDescriptor::Bool => ColumnKind::Bool,
            ColumnKindDescriptor::Foreign(t) => ColumnKind::Foreign(t.clone()),
            ColumnKindDescriptor::Bytes(n) => ColumnKind::Bytes(*n),
            ColumnKindDescriptor::Str(n) => ColumnKind::Str(*n),
            ColumnKindDescriptor::Pickle(n) => ColumnKind::Pickle(PickleSpec::any(*n)),
            ColumnKindDescriptor::BytesBlob => ColumnKind::BytesBlob,
            ColumnKindDescriptor::StrBlob => ColumnKind::StrBlob,
            ColumnKindDescriptor::PickleBlob => ColumnKind::PickleBlob(PickleSpec::any(0)),
        }
    }
}

/// One declared concrete column.
#[derive(Clone)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
        }
    }

    pub fn footprint(&self) -> usize {
        self.kind.footprint()
    }

    /// Directory holding this column's sidecar files, `<table>_<col>/`.
    pub fn sidecar_dir(&self, base_dir: &Path, table: &str) -> PathBuf {
        base_dir.join(format!("{table}_{}", self.name))
    }

    fn sidecar_path(&self, base_dir: &Path, table: &str, offset: usize) -> PathBuf {
        self.sidecar_dir(base_dir, table).join(format!("{offset}.dat"))
    }

    /// Validate a candidate value before it is written to `row.values`.
    /// Does not touch disk or indices.
    pub fn validate(&self, value: &Value) -> Result<()> {
        fn type_err(value: &Value) -> Result<()> {
            Err(Error::TypeMismatch {
                expected: "matching column kind",
                got: value.kind_name(),
            })
        }
        match &self.kind {
            ColumnKind::Int => match value {
                Value::Int(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::Bool => match value {
                Value::Bool(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::Foreign(_) => match value {
                Value::Foreign(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::Bytes(n) => match value {
                Value::Bytes(b) if b.len() as u32 > *n => Err(Error::ValueTooLarge {
                    capacity: *n,
                    got: b.len() as u32,
                }),
                Value::Bytes(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::BytesBlob => match value {
                Value::Bytes(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::Str(n) => match value {
                Value::Str(s) if s.len() as u32 > *n => Err(Error::ValueTooLarge {
                    capacity: *n,
                    got: s.len() as u32,
                }),
                Value::Str(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::StrBlob => match value {
                Value::Str(_) => Ok(()),
                _ => type_err(value),
            },
            ColumnKind::Pickle(spec) => match value {
                Value::Pickle(p) => {
                    spec.check(p)?;
                    let encoded = bincode::serialize(p)
                        .map_err(|e| Error::Migration(format!("pickle encode: {e}")))?;
                    if encoded.len() as u32 > spec.capacity {
                        Err(Error::ValueTooLarge {
                            capacity: spec.capacity,
                            got: encoded.len() as u32,
                        })
                    } else {
                        Ok(())
                    }
                }
                _ => type_err(value),
            },
            ColumnKind::PickleBlob(spec) => match value {
                Value::Pickle(p) => spec.check(p),
                _ => type_err(value),
            },
        }
    }

    /// Load this column's logical value for one row, called once per row
    /// read from disk or created.
    ///
    /// `record` is the full row record buffer (post-id); `col_offset` is
    /// this column's byte offset within it.
    pub fn load(
        &self,
        base_dir: &Path,
        table: &str,
        record: &[u8],
        col_offset: usize,
        row_offset: usize,
    ) -> Result<Value> {
        if self.kind.sidecar() {
            let path = self.sidecar_path(base_dir, table, row_offset);
            return self.load_sidecar(&path);
        }
        Ok(match &self.kind {
            ColumnKind::Int => Value::Int(get_i32(record, col_offset)),
            ColumnKind::Bool => Value::Bool(get_bool(record, col_offset)),
            ColumnKind::Foreign(_) => {
                let raw = get_i32(record, col_offset);
                Value::Foreign(if raw == 0 { None } else { Some(RowId(raw)) })
            }
            ColumnKind::Bytes(n) => {
                let len = get_u32(record, col_offset) as usize;
                let start = col_offset + 4;
                Value::Bytes(record[start..start + (*n as usize).min(len)].to_vec())
            }
            ColumnKind::Str(n) => {
                let len = get_u32(record, col_offset) as usize;
                let start = col_offset + 4;
                let bytes = &record[start..start + (*n as usize).min(len)];
                Value::Str(String::from_utf8_lossy(bytes).into_owned())
            }
            ColumnKind::Pickle(spec) => {
                let len = get_u32(record, col_offset) as usize;
                let start = col_offset + 4;
                let bytes = &record[start..start + (spec.capacity as usize).min(len)];
                if bytes.is_empty() {
                    Value::Pickle(spec.default_value())
                } else {
                    let p: PickleValue = bincode::deserialize(bytes)
                        .map_err(|e| Error::Migration(format!("pickle decode: {e}")))?;
                    Value::Pickle(p)
                }
            }
            ColumnKind::BytesBlob | ColumnKind::StrBlob | ColumnKind::PickleBlob(_) => {
                unreachable!("sidecar kinds handled above")
            }
        })
    }

    fn load_sidecar(&self, path: &Path) -> Result<Value> {
        if !path.exists() {
            return Ok(self.kind.default_value());
        }
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(match &self.kind {
            ColumnKind::BytesBlob => Value::Bytes(bytes),
            ColumnKind::StrBlob => Value::Str(String::from_utf8_lossy(&bytes).into_owned()),
            ColumnKind::PickleBlob(spec) => {
                if bytes.is_empty() {
                    Value::Pickle(spec.default_value())
                } else {
                    let p: PickleValue = bincode::deserialize(&bytes)
                        .map_err(|e| Error::Migration(format!("pickle decode: {e}")))?;
                    Value::Pickle(p)
                }
            }
            _ => unreachable!("non-sidecar kind"),
        })
    }

    /// Encode this column's logical value back into the record (or
    /// sidecar file), called once per row written to disk. The value is
    /// assumed already validated by `validate`.
    pub fn dump(
        &self,
        base_dir: &Path,
        table: &str,
        record: &mut [u8],
        col_offset: usize,
        row_offset: usize,
        value: &Value,
    ) -> Result<()> {
        if self.kind.sidecar() {
            return self.dump_sidecar(base_dir, table, row_offset, value);
        }
        match (&self.kind, value) {
            (ColumnKind::Int, Value::Int(i)) => set_i32(record, col_offset, *i),
            (ColumnKind::Bool, Value::Bool(b)) => set_bool(record, col_offset, *b),
            (ColumnKind::Foreign(_), Value::Foreign(id)) => {
                set_i32(record, col_offset, id.map(|r| r.0).unwrap_or(0))
            }
            (ColumnKind::Bytes(n), Value::Bytes(b)) => {
                set_u32(record, col_offset, b.len() as u32);
                let start = col_offset + 4;
                record[start..start + b.len()].copy_from_slice(b);
                for byte in &mut record[start + b.len()..start + *n as usize] {
                    *byte = 0;
                }
            }
            (ColumnKind::Str(n), Value::Str(s)) => {
                let bytes = s.as_bytes();
                set_u32(record, col_offset, bytes.len() as u32);
                let start = col_offset + 4;
                record[start..start + bytes.len()].copy_from_slice(bytes);
                for byte in &mut record[start + bytes.len()..start + *n as usize] {
                    *byte = 0;
                }
            }
            (ColumnKind::Pickle(spec), Value::Pickle(p)) => {
                let bytes = bincode::serialize(p)
                    .map_err(|e| Error::Migration(format!("pickle encode: {e}")))?;
                set_u32(record, col_offset, bytes.len() as u32);
                let start = col_offset + 4;
                record[start..start + bytes.len()].copy_from_slice(&bytes);
                for byte in &mut record[start + bytes.len()..start + spec.capacity as usize] {
                    *byte = 0;
                }
            }
            _ => {
                return Err(Error::TypeMismatch {
                    expected: "matching column kind",
                    got: value.kind_name(),
                })
            }
        }
        Ok(())
    }

    fn dump_sidecar(&self, base_dir: &Path, table: &str, row_offset: usize, value: &Value) -> Result<()> {
        let dir = self.sidecar_dir(base_dir, table);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let path = self.sidecar_path(base_dir, table, row_offset);
        let bytes: Vec<u8> = match value {
            Value::Bytes(b) => b.clone(),
            Value::Str(s) => s.clone().into_bytes(),
            Value::Pickle(p) => bincode::serialize(p)
                .map_err(|e| Error::Migration(format!("pickle encode: {e}")))?,
            _ => {
                return Err(Error::TypeMismatch {
                    expected: "matching column kind",
                    got: value.kind_name(),
                })
            }
        };
        fs::write(&path, bytes).map_err(|e| Error::io(&path, e))
    }

    /// Called once per file operation to prepare sidecar storage; no-op
    /// for inline columns.
    pub fn load_col(&self, base_dir: &Path, table: &str) -> Result<()> {
        if self.kind.sidecar() {
            let dir = self.sidecar_dir(base_dir, table);
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_roundtrip() {
        let col = ColumnDef::new("n", ColumnKind::Int);
        let mut record = [0u8; 4];
        col.dump(Path::new("."), "T", &mut record, 0, 0, &Value::Int(-7))
            .unwrap();
        let v = col.load(Path::new("."), "T", &record, 0, 0).unwrap();
        assert_eq!(v, Value::Int(-7));
    }

    #[test]
    fn string_too_large_rejected() {
        let col = ColumnDef::new("s", ColumnKind::Str(4));
        let err = col.validate(&Value::Str("hello".into())).unwrap_err();
        assert!(matches!(err, Error::ValueTooLarge { capacity: 4, got: 5 }));
    }

    #[test]
    fn foreign_absent_is_zero() {
        let col = ColumnDef::new("p", ColumnKind::Foreign("Parent".into()));
        let mut record = [0u8; 4];
        col.dump(Path::new("."), "T", &mut record, 0, 0, &Value::Foreign(None))
            .unwrap();
        assert_eq!(get_i32(&record, 0), 0);
    }

    #[test]
    fn pickle_roundtrip_inline() {
        let col = ColumnDef::new("p", ColumnKind::Pickle(PickleSpec::any(64)));
        let v = Value::Pickle(PickleValue::List(vec![
            PickleValue::Int(1),
            PickleValue::Str("two".into()),
        ]));
        col.validate(&v).unwrap();
        let mut record = [0u8; 68];
        col.dump(Path::new("."), "T", &mut record, 0, 0, &v).unwrap();
        let back = col.load(Path::new("."), "T", &record, 0, 0).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn pickle_type_mismatch_rejected() {
        fn is_int(v: &PickleValue) -> bool {
            matches!(v, PickleValue::Int(_))
        }
        let spec = PickleSpec {
            capacity: 32,
            type_check: Some(is_int),
            type_name: "int",
            default: None,
        };
        let col = ColumnDef::new("p", ColumnKind::Pickle(spec));
        let err = col.validate(&Value::Pickle(PickleValue::Str("nope".into()))).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "int", .. }));
    }

    #[test]
    fn bytes_blob_roundtrips_through_sidecar_file() {
        let dir = tempfile::tempdir().unwrap();
        let col = ColumnDef::new("payload", ColumnKind::BytesBlob);
        col.load_col(dir.path(), "T").unwrap();
        let v = Value::Bytes(vec![1, 2, 3, 4, 5]);
        col.dump(dir.path(), "T", &mut [], 0, 3, &v).unwrap();
        assert!(dir.path().join("T_payload").join("3.dat").exists());
        let back = col.load(dir.path(), "T", &[], 0, 3).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn blob_column_missing_sidecar_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let col = ColumnDef::new("payload", ColumnKind::StrBlob);
        let v = col.load(dir.path(), "T", &[], 0, 0).unwrap();
        assert_eq!(v, Value::Str(String::new()));
    }
}
