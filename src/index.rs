//! `Index` (§4.5): binds an ordered column tuple to an engine and
//! translates row-based table mutations into key/row-pair updates.

use crate::cell::Cell;
use crate::column::ColumnRef;
use crate::engine::{Engine, EngineKind};
use crate::error::{EngineError, IndexError, Result};
use crate::key::{key_of, Bounds, Key, KeyElem};
use crate::sliced::SlicedIndex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// What rows `Index::remove_rows` should delete (§4.5): a single row, an
/// explicit list, or a stride triple. Rust's static typing makes the
/// spec's "unsupported argument type" caller error statically unreachable
/// for the first two forms; `Stride` keeps one runtime failure mode (a
/// zero step) so the error variant still has a reachable caller.
#[derive(Debug, Clone)]
pub enum RemoveSpec {
    Row(usize),
    Rows(Vec<usize>),
    Stride { start: isize, stop: isize, step: isize },
}

impl From<usize> for RemoveSpec {
    fn from(r: usize) -> Self { RemoveSpec::Row(r) }
}

impl From<Vec<usize>> for RemoveSpec {
    fn from(rs: Vec<usize>) -> Self { RemoveSpec::Rows(rs) }
}

impl From<&[usize]> for RemoveSpec {
    fn from(rs: &[usize]) -> Self { RemoveSpec::Rows(rs.to_vec()) }
}

pub struct Index {
    columns: Vec<ColumnRef>,
    engine_kind: EngineKind,
    engine: Box<dyn Engine>,
    frozen: bool,
}

impl Index {
    /// Create an index over `columns` (in the given order) using
    /// `engine_kind`, bulk-loading from the columns' current contents.
    /// Fails if `columns` is empty (§7: "creating an index with zero
    /// columns" is a caller error).
    pub fn new(columns: Vec<ColumnRef>, engine_kind: EngineKind) -> Result<Self> {
        if columns.is_empty() {
            return Err(IndexError::ZeroColumns);
        }
        let mut index = Self { columns, engine_kind, engine: engine_kind.build(std::iter::empty()), frozen: false };
        index.reload()?;
        Ok(index)
    }

    pub fn is_frozen(&self) -> bool { self.frozen }

    pub(crate) fn set_frozen(&mut self, frozen: bool) { self.frozen = frozen; }

    fn row_count(&self) -> usize { self.columns.first().map(|c| c.borrow().len()).unwrap_or(0) }

    /// Build the key for `row` by reading the current value of every
    /// indexed column at that row. Every path that needs "the key at row
    /// r" (`add_row`, `remove_row`, `replace`) goes through this, so there
    /// is exactly one place that can get the column order wrong.
    fn key_at(&self, row: usize) -> Result<Key> {
        let mut cells = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let cell = col
                .borrow()
                .get(row)
                .ok_or_else(|| IndexError::Other(anyhow::anyhow!("column {:?} has no row {row}", col.borrow().name())))?;
            cells.push(cell);
        }
        Ok(key_of(cells))
    }

    /// Locate one of this index's columns by name (§4.5 `col_position`).
    /// Hard failure (§7): referencing a column this index doesn't bind is
    /// an invariant violation at the call site, not a soft miss.
    pub fn col_position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.borrow().name() == name)
            .ok_or_else(|| IndexError::ColumnNotFound(name.to_string()))
    }

    pub fn columns(&self) -> &[ColumnRef] { &self.columns }

    // -- table integration hooks (§4.5 / §4.8) ----------------------------

    /// Called after the host table inserts a new row at `pos`, shifting
    /// rows `[pos, N)` right by one. The host must have already inserted
    /// the row's values into the shared columns before calling this, so
    /// `key_at(pos)` reads the row that now exists there.
    pub fn add_row(&mut self, pos: usize) -> Result<()> {
        if self.frozen {
            tracing::trace!(pos, "index frozen; dropping add_row");
            return Ok(());
        }
        self.engine.shift_right(pos);
        let key = self.key_at(pos)?;
        self.engine.add(key, pos);
        Ok(())
    }

    /// Called when the host is about to remove row `r`. Must be called
    /// *before* the host deletes the row from its columns, since this
    /// reads `key_at(r)` to know what to remove from the engine.
    pub fn remove_row(&mut self, r: usize, reorder: bool) -> Result<()> {
        if self.frozen {
            tracing::trace!(row = r, "index frozen; dropping remove_row");
            return Ok(());
        }
        let key = self.key_at(r)?;
        let removed = self.engine.remove(&key, Some(r)).map_err(|e: EngineError| {
            tracing::error!(row = r, error = %e, "remove_row: engine invariant violation");
            IndexError::Engine(e)
        })?;
        if !removed {
            tracing::error!(row = r, "remove_row: no entry for key (invariant violation)");
            return Err(IndexError::NoEntryForRow { row: r });
        }
        if reorder {
            self.engine.shift_left(r);
        }
        Ok(())
    }

    /// Remove a batch of rows per `spec`. Two-pass discipline (§4.5): every
    /// `remove_row` runs with `reorder=false` first, then `shift_left` is
    /// applied once per removed row in **descending** order of original
    /// row number — applying it between removals would change the meaning
    /// of the remaining row numbers.
    ///
    /// Must, like `remove_row`, be called before the host deletes the
    /// corresponding rows from its columns.
    pub fn remove_rows(&mut self, spec: impl Into<RemoveSpec>) -> Result<()> {
        if self.frozen {
            tracing::trace!("index frozen; dropping remove_rows");
            return Ok(());
        }
        let mut rows = match spec.into() {
            RemoveSpec::Row(r) => vec![r],
            RemoveSpec::Rows(rs) => rs,
            RemoveSpec::Stride { start, stop, step } => {
                if step == 0 {
                    return Err(IndexError::UnsupportedRemoveSpec("stride step cannot be zero".to_string()));
                }
                crate::slice_math::stride_rows(start, stop, step)
            }
        };
        rows.sort_unstable();
        rows.dedup();

        for &r in &rows {
            self.remove_row(r, false)?;
        }
        for &r in rows.iter().rev() {
            self.engine.shift_left(r);
        }
        Ok(())
    }

    /// In-place cell edit (§4.5): remove the old entry, rebuild the key
    /// with the column's new value, re-insert under the same row number.
    /// `col` is a position among this index's own columns; `old`/`new`
    /// are the cell's value before and after the edit.
    ///
    /// Must be called *before* the host writes `new` into the column,
    /// since `key_at` would otherwise read the already-updated value for
    /// the remove half of the operation.
    pub fn replace(&mut self, r: usize, col: usize, new: Cell) -> Result<()> {
        if self.frozen {
            tracing::trace!(row = r, "index frozen; dropping replace");
            return Ok(());
        }
        if col >= self.columns.len() {
            return Err(IndexError::ColumnNotFound(format!("position {col}")));
        }
        let old_key = self.key_at(r)?;
        let removed = self.engine.remove(&old_key, Some(r)).map_err(IndexError::Engine)?;
        if !removed {
            return Err(IndexError::NoEntryForRow { row: r });
        }
        let mut new_key = old_key;
        new_key[col] = KeyElem::Value(new);
        self.engine.add(new_key, r);
        Ok(())
    }

    /// Given a sequence mapping new row number → old row number (a
    /// positional reorder/fancy-index selection), rewrite every stored row
    /// number through the inverse map; entries whose old row is absent
    /// from `perm` are dropped.
    pub fn replace_rows(&mut self, perm: &[usize]) -> Result<()> {
        if self.frozen {
            tracing::trace!("index frozen; dropping replace_rows");
            return Ok(());
        }
        let mut inverse = HashMap::with_capacity(perm.len());
        for (new_row, &old_row) in perm.iter().enumerate() {
            inverse.insert(old_row, new_row);
        }
        self.engine.replace_rows(&inverse);
        Ok(())
    }

    /// Recompute the engine from the columns' current contents (§4.5);
    /// used both for initial construction and to resynchronise a frozen
    /// index at unfreeze time.
    pub fn reload(&mut self) -> Result<()> {
        let n = self.row_count();
        let mut entries = Vec::with_capacity(n);
        for r in 0..n {
            entries.push((self.key_at(r)?, r));
        }
        self.engine = self.engine_kind.build(entries);
        Ok(())
    }

    /// Rebind column references by name (used after a shallow table copy
    /// re-identifies columns under new `Rc`s).
    pub fn refresh(&mut self, columns: Vec<ColumnRef>) -> Result<()> {
        if columns.len() != self.columns.len() {
            return Err(IndexError::Other(anyhow::anyhow!(
                "refresh: expected {} columns, got {}",
                self.columns.len(),
                columns.len()
            )));
        }
        self.columns = columns;
        Ok(())
    }

    // -- queries --------------------------------------------------------

    pub fn find(&self, values: &[Cell]) -> Vec<usize> { self.engine.find(&key_of(values.iter().cloned())) }

    /// Range query. `lo`/`hi` may be shorter than the full column count —
    /// missing trailing elements are synthesised with MIN/MAX sentinels
    /// (§4.1): MIN padding on the low side, MAX padding on the high side,
    /// so a partial bound still ranges over every value of the unspecified
    /// trailing columns.
    pub fn range(&self, lo: &[Cell], hi: &[Cell], bounds: Bounds) -> Vec<usize> {
        let width = self.columns.len();
        let lo_key = crate::key::pad_with(lo, width, || KeyElem::Min);
        let hi_key = crate::key::pad_with(hi, width, || KeyElem::Max);
        self.engine.range(&lo_key, &hi_key, bounds)
    }

    /// Same as `range`, but operating directly on already-built `Key`s —
    /// the escape hatch for callers that need explicit sentinel control
    /// (e.g. an `EPSILON`-padded exclusive upper bound) rather than the
    /// MIN/MAX padding `range` applies automatically.
    pub fn range_keys(&self, lo: &Key, hi: &Key, bounds: Bounds) -> Vec<usize> { self.engine.range(lo, hi, bounds) }

    /// All rows whose key has `prefix` as an element-wise prefix (§4.2).
    /// Implemented, per P5, as the range `[prefix++MIN*k, prefix++MAX*k]`
    /// with both bounds closed.
    pub fn same_prefix(&self, prefix: &[Cell]) -> Vec<usize> {
        let width = self.columns.len();
        let lo = crate::key::pad_with(prefix, width, || KeyElem::Min);
        let hi = crate::key::pad_with(prefix, width, || KeyElem::Max);
        self.engine.range(&lo, &hi, (true, true))
    }

    /// The argsort of the table by this index's key tuple.
    pub fn sorted_data(&self) -> Vec<usize> { self.engine.sort() }

    pub fn items(&self) -> Vec<(Key, Vec<usize>)> { self.engine.items() }

    /// A read-mostly coordinate-translating view over a strided row
    /// window (§4.6). Never materialises.
    pub fn get(parent: &Rc<RefCell<Index>>, start: isize, stop: isize, step: isize) -> SlicedIndex {
        SlicedIndex::new(Rc::clone(parent), start, stop, step)
    }

    /// Deep-copy the engine's contents while rebinding to `new_columns`
    /// (shallow on columns, deep on index data) — see §9 "Deep copy with
    /// column-identity sharing". Not a `Clone` impl because the caller
    /// must supply the *new* table's column handles.
    pub fn clone_with_columns(&self, new_columns: Vec<ColumnRef>) -> Result<Self> {
        if new_columns.len() != self.columns.len() {
            return Err(IndexError::Other(anyhow::anyhow!(
                "clone_with_columns: expected {} columns, got {}",
                self.columns.len(),
                new_columns.len()
            )));
        }
        Ok(Self { columns: new_columns, engine_kind: self.engine_kind, engine: self.engine_kind.build(self.engine.items_flat()), frozen: self.frozen })
    }
}

/// Flatten `items()` back into `(key, row)` pairs for bulk-reconstruction
/// (deep copy, reload-equivalent rebuilds from an already-built engine).
trait ItemsFlat {
    fn items_flat(&self) -> Vec<(Key, usize)>;
}

impl ItemsFlat for Box<dyn Engine> {
    fn items_flat(&self) -> Vec<(Key, usize)> {
        self.items().into_iter().flat_map(|(key, rows)| rows.into_iter().map(move |r| (key.clone(), r))).collect()
    }
}
