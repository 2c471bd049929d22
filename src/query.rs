//! [`Predicate`] and the index-backed query engine.
//!
//! Picks the declared index whose key prefix best matches the supplied
//! equality/range predicates, scans it forward from a composed start key,
//! and uses the unmatched predicates only as an early-termination guard
//! plus a final post-filter. [`Table::where_`] never fails synchronously:
//! it returns a [`QueryIter`], a true lazy sequence, and any schema error
//! (unknown column, non-comparable kind, a `get` failure mid-scan) is
//! surfaced as the `Err` item the caller's `next()` actually reaches —
//! exactly the rows a real scan would have visited, no more.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::index::{Index, IndexKey};
use crate::row::RowId;
use crate::table::Table;
use crate::value::{IndexValue, Value};

/// A single comparison against one concrete column.
#[derive(Clone, Debug)]
pub enum Predicate {
    Eq(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq(c, _)
            | Predicate::Lt(c, _)
            | Predicate::Le(c, _)
            | Predicate::Gt(c, _)
            | Predicate::Ge(c, _) => c,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Predicate::Eq(_, v)
            | Predicate::Lt(_, v)
            | Predicate::Le(_, v)
            | Predicate::Gt(_, v)
            | Predicate::Ge(_, v) => v,
        }
    }

    fn matches_index_value(&self, v: &IndexValue) -> Result<bool> {
        let target = IndexValue::try_from(self.value())
            .map_err(|_| Error::Schema(format!("column {} is not comparable", self.column())))?;
        Ok(match self {
            Predicate::Eq(..) => *v == target,
            Predicate::Lt(..) => *v < target,
            Predicate::Le(..) => *v <= target,
            Predicate::Gt(..) => *v > target,
            Predicate::Ge(..) => *v >= target,
        })
    }
}

/// The lazy sequence yielded by [`Table::where_`]. Advancing it walks the
/// chosen index one candidate at a time: an early-termination predicate
/// failing ends the sequence, a post-filter miss skips to the next
/// candidate, and a schema error (surfaced only once polling reaches the
/// row or plan step that triggers it) ends the sequence after yielding
/// one `Err`.
pub struct QueryIter<'a> {
    table: &'a Table,
    inner: Option<Box<dyn Iterator<Item = (IndexKey, RowId)> + 'a>>,
    cols: Vec<String>,
    retained: Vec<Predicate>,
    preds: Vec<Predicate>,
    pending_error: Option<Error>,
    done: bool,
}

impl<'a> QueryIter<'a> {
    fn failed(table: &'a Table, err: Error) -> Self {
        QueryIter {
            table,
            inner: None,
            cols: Vec::new(),
            retained: Vec::new(),
            preds: Vec::new(),
            pending_error: Some(err),
            done: false,
        }
    }
}

impl<'a> Iterator for QueryIter<'a> {
    type Item = Result<RowId>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            self.done = true;
            return Some(Err(err));
        }
        if self.done {
            return None;
        }
        let Some(inner) = self.inner.as_mut() else {
            return None;
        };
        loop {
            let (key, id) = inner.next()?;
            for p in &self.retained {
                let Some(pos) = self.cols.iter().position(|c| c == p.column()) else {
                    continue;
                };
                match p.matches_index_value(&key[pos]) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.done = true;
                        return None;
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            let mut all_match = true;
            for p in &self.preds {
                let v = match self.table.get(id, p.column()) {
                    Ok(v) => v,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                };
                let iv = match IndexValue::try_from(&v) {
                    Ok(iv) => iv,
                    Err(_) => {
                        self.done = true;
                        return Some(Err(Error::Schema(format!(
                            "column {} is not comparable",
                            p.column()
                        ))));
                    }
                };
                match p.matches_index_value(&iv) {
                    Ok(true) => {}
                    Ok(false) => {
                        all_match = false;
                        break;
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            if all_match {
                return Some(Ok(id));
            }
        }
    }
}

impl Table {
    /// `(columns, index)` pairs eligible for selection: the always-valid
    /// trivial `(id)` index first (strength 0, the universal fallback),
    /// then every declared secondary index in declaration order so ties
    /// are broken consistently.
    fn candidate_indices(&self) -> Vec<(&[String], &Index)> {
        let mut v: Vec<(&[String], &Index)> = vec![(&[][..], &self.id_index)];
        for (cols, ix) in self.declared_indices.iter().zip(self.secondary.iter()) {
            v.push((cols.as_slice(), ix));
        }
        v
    }

    /// Walk each candidate index's key prefix, scoring how much of it the
    /// supplied predicates cover, and return its position in
    /// `candidate_indices()`.
    fn best_index(&self, eq: &HashMap<&str, &Value>, cmp: &HashMap<&str, &Predicate>) -> usize {
        let mut best = 0usize;
        let mut best_strength = -1i32;
        for (i, (cols, _)) in self.candidate_indices().iter().enumerate() {
            let mut strength = 0i32;
            for c in cols.iter() {
                if eq.contains_key(c.as_str()) {
                    strength += 1;
                } else if cmp.contains_key(c.as_str()) {
                    strength += 1;
                    break;
                } else {
                    break;
                }
            }
            if strength > best_strength {
                best_strength = strength;
                best = i;
            }
        }
        best
    }

    /// Lazy scan satisfying the conjunction of `preds`: `{r : for all i, preds[i](r)}`.
    ///
    /// Never fails synchronously — an unknown column or a predicate over
    /// a non-comparable kind (`Pickle`/blob columns have no ordered
    /// projection, see `ColumnKind::indexable`) is reported as the first
    /// item the returned iterator yields, so `find` below still only
    /// touches the plan, never a row, before reporting it.
    pub fn where_(&self, preds: &[Predicate]) -> QueryIter<'_> {
        for p in preds {
            match self.col_pos.get(p.column()) {
                None => {
                    return QueryIter::failed(
                        self,
                        Error::Schema(format!("no such column {} in table {}", p.column(), self.name)),
                    );
                }
                Some(&ci) => {
                    if !self.columns[ci].kind.indexable() {
                        return QueryIter::failed(
                            self,
                            Error::Schema(format!(
                                "column {} cannot be compared (pickle/blob kind)",
                                p.column()
                            )),
                        );
                    }
                }
            }
        }

        let mut eq: HashMap<&str, &Value> = HashMap::new();
        let mut cmp: HashMap<&str, &Predicate> = HashMap::new();
        for p in preds {
            match p {
                Predicate::Eq(c, v) => {
                    eq.insert(c.as_str(), v);
                }
                _ => {
                    cmp.insert(p.column(), p);
                }
            }
        }

        let candidates = self.candidate_indices();
        let chosen = self.best_index(&eq, &cmp);
        let (cols, index) = candidates[chosen];

        let mut start: Vec<IndexValue> = Vec::new();
        let mut retained: Vec<Predicate> = Vec::new();
        for c in cols {
            if let Some(&v) = eq.get(c.as_str()) {
                let iv = match IndexValue::try_from(v) {
                    Ok(iv) => iv,
                    Err(_) => {
                        return QueryIter::failed(
                            self,
                            Error::Schema(format!("column {c} is not comparable")),
                        )
                    }
                };
                start.push(iv);
            } else if let Some(&p) = cmp.get(c.as_str()) {
                match p {
                    Predicate::Gt(_, v) | Predicate::Ge(_, v) => match IndexValue::try_from(v) {
                        Ok(iv) => start.push(iv),
                        Err(_) => {
                            return QueryIter::failed(
                                self,
                                Error::Schema(format!("column {c} is not comparable")),
                            )
                        }
                    },
                    _ => {}
                }
                retained.push(p.clone());
                break;
            } else {
                break;
            }
        }
        // Equality predicates on the walked prefix double as
        // early-termination guards too (a later row whose prefix no
        // longer equals `start` can never match again).
        for c in cols {
            if eq.contains_key(c.as_str()) {
                if let Some(p) = preds.iter().find(|p| matches!(p, Predicate::Eq(pc, _) if pc == c)) {
                    retained.push(p.clone());
                }
            } else {
                break;
            }
        }

        let start_opt = if start.is_empty() { None } else { Some(start) };
        let inner = index
            .find(start_opt, false)
            .map(|(k, id)| (k.clone(), id));

        QueryIter {
            table: self,
            inner: Some(Box::new(inner)),
            cols: cols.to_vec(),
            retained,
            preds: preds.to_vec(),
            pending_error: None,
            done: false,
        }
    }

    /// First matching row, or `None`. Stops at the first yielded item —
    /// rows past it are never visited, and never evaluated.
    pub fn find(&self, preds: &[Predicate]) -> Result<Option<RowId>> {
        self.where_(preds).next().transpose()
    }
}
