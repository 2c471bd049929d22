//! [`SchemaDescriptor`]: the on-disk header written at the front of every
//! `.tbl` file. Serialized with `bincode`, following our
//! teacher's own choice of a compact binary header for `ColInfo` — chosen
//! here specifically because `bincode` gives byte-identical output for
//! equal inputs, which is the whole migration trigger.

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDef, ColumnKindDescriptor};
use crate::error::{Error, Result};

/// The declared concrete-column list, stripped of everything that can't
/// round-trip through bytes (closures, target-table resolution order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub columns: Vec<(String, ColumnKindDescriptor)>,
}

impl SchemaDescriptor {
    pub fn of(columns: &[ColumnDef]) -> Self {
        SchemaDescriptor {
            columns: columns
                .iter()
                .map(|c| (c.name.clone(), c.kind.descriptor()))
                .collect(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Schema(format!("encode schema: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Schema(format!("decode schema: {e}")))
    }
}
