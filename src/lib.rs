//! `flatbase`: an embedded, single-process, on-disk table store with typed
//! columns, secondary indices, and a small query algebra.
//!
//! A host declares tables with [`table::TableBuilder`], binds a directory
//! with [`database::Database::connect`], creates/mutates/destroys rows
//! through [`table::Table`], and queries them with [`query::Predicate`].
//! Indices are maintained synchronously on every write; there is no
//! background compaction, no locking, and no multi-writer concurrency —
//! see `DESIGN.md` for the full rationale.
//!
//! ```no_run
//! use flatbase::column::ColumnKind;
//! use flatbase::database::Database;
//! use flatbase::table::TableBuilder;
//! use flatbase::value::Value;
//!
//! let def = TableBuilder::new("widgets")
//!     .column("serial", ColumnKind::Int)
//!     .column("label", ColumnKind::Str(64))
//!     .index(vec!["serial"])
//!     .build()?;
//!
//! let mut db = Database::connect("./data", vec![def])?;
//! let t = db.table_mut("widgets")?;
//! let id = t.create_row();
//! t.set(id, "serial", Value::Int(7))?;
//! t.set(id, "label", Value::Str("bolt".into()))?;
//! db.save()?;
//! # Ok::<(), flatbase::error::Error>(())
//! ```

pub mod column;
pub mod database;
pub mod error;
pub mod index;
pub mod migrate;
pub mod query;
pub mod row;
pub mod schema;
pub mod store;
pub mod table;
pub mod util;
pub mod value;

pub use database::Database;
pub use error::{Error, Result};
pub use query::{Predicate, QueryIter};
pub use row::RowId;
pub use table::{Table, TableBuilder, TableDef};
pub use value::Value;
