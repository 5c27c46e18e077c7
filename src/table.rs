//! Minimal reference `Table` (§2 C9, §6): just enough column storage and
//! index registry to exercise the external-interfaces contract in tests.
//! Not a general dataframe — no schema validation, no dtype promotion, no
//! query planner. A host table with richer storage wires the same hooks.

use crate::column::{Column, ColumnRef, VecColumn};
use crate::error::{IndexError, Result};
use crate::index::Index;
use crate::mode::{mode_flag, Mode, ModeFlag, ModeGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One registered index plus the three mode flags `index_mode` toggles
/// (§4.7). Each index gets its own independent set of flags — modes are
/// per-index, not global to the table.
struct Registered {
    index: Rc<RefCell<Index>>,
    freeze: ModeFlag,
    discard_on_copy: ModeFlag,
    copy_on_getitem: ModeFlag,
}

pub struct Table {
    columns: Vec<ColumnRef>,
    indices: HashMap<String, Registered>,
}

/// Guard returned by `Table::index_mode`. `Freeze` carries enough state to
/// unfreeze and `reload` the index on drop rather than leaving that to the
/// caller; the other two modes are plain flag toggles with no follow-up
/// work, so they reuse `ModeGuard` as-is.
pub enum IndexModeGuard {
    Plain(ModeGuard),
    Freeze { flag: ModeFlag, previous: bool, index: Rc<RefCell<Index>> },
}

impl Drop for IndexModeGuard {
    fn drop(&mut self) {
        if let IndexModeGuard::Freeze { flag, previous, index } = self {
            flag.set(*previous);
            if !flag.get() {
                index.borrow_mut().set_frozen(false);
                let _ = index.borrow_mut().reload();
            }
        }
    }
}

impl Table {
    pub fn new(columns: Vec<ColumnRef>) -> Self { Self { columns, indices: HashMap::new() } }

    pub fn row_count(&self) -> usize { self.columns.first().map(|c| c.borrow().len()).unwrap_or(0) }

    pub fn column(&self, name: &str) -> Option<ColumnRef> { self.columns.iter().find(|c| c.borrow().name() == name).cloned() }

    pub fn columns(&self) -> &[ColumnRef] { &self.columns }

    // -- index registry (§6) ---------------------------------------------

    /// Register a new index under `name`, built from `col_names` in order.
    pub fn add_index(&mut self, name: impl Into<String>, col_names: &[&str], engine_kind: crate::engine::EngineKind) -> Result<()> {
        let name = name.into();
        let cols = col_names
            .iter()
            .map(|n| self.column(n).ok_or_else(|| IndexError::ColumnNotFound(n.to_string())))
            .collect::<Result<Vec<_>>>()?;
        let index = Index::new(cols, engine_kind)?;
        self.indices.insert(
            name,
            Registered {
                index: Rc::new(RefCell::new(index)),
                freeze: mode_flag(false),
                discard_on_copy: mode_flag(false),
                copy_on_getitem: mode_flag(false),
            },
        );
        Ok(())
    }

    pub fn remove_indices(&mut self, names: &[&str]) { for n in names { self.indices.remove(*n); } }

    pub fn indices(&self) -> Vec<&str> { self.indices.keys().map(String::as_str).collect() }

    pub fn index(&self, name: &str) -> Option<Rc<RefCell<Index>>> { self.indices.get(name).map(|r| Rc::clone(&r.index)) }

    /// Enter `mode` on the named index for the lifetime of the returned
    /// guard (§4.7). Fails if the index doesn't exist.
    ///
    /// `Freeze` is handled specially: on exit, only the outermost guard
    /// (the one whose `previous` value was "not frozen") clears the
    /// index's frozen flag and triggers a `reload` to resynchronise —
    /// nesting a second freeze inside an already-frozen scope must not
    /// resync early just because the inner guard dropped first.
    pub fn index_mode(&self, name: &str, mode: Mode) -> Result<IndexModeGuard> {
        let reg = self.indices.get(name).ok_or_else(|| IndexError::ColumnNotFound(name.to_string()))?;
        match mode {
            Mode::Freeze => {
                let previous = reg.freeze.get();
                reg.freeze.set(true);
                reg.index.borrow_mut().set_frozen(true);
                Ok(IndexModeGuard::Freeze { flag: Rc::clone(&reg.freeze), previous, index: Rc::clone(&reg.index) })
            }
            Mode::DiscardOnCopy => Ok(IndexModeGuard::Plain(ModeGuard::enter(Rc::clone(&reg.discard_on_copy)))),
            Mode::CopyOnGetitem => Ok(IndexModeGuard::Plain(ModeGuard::enter(Rc::clone(&reg.copy_on_getitem)))),
        }
    }

    // -- row mutation hooks (§4.8) ----------------------------------------

    /// Append `values` (one cell per column, in column order) as a new row.
    pub fn append_row(&mut self, values: Vec<crate::cell::Cell>) -> Result<()> {
        let pos = self.row_count();
        self.insert_row(pos, values)
    }

    /// Insert `values` as a new row at `pos`, shifting rows `[pos, N)`
    /// right by one. Column storage is mutated first so `add_row`'s
    /// `key_at(pos)` read sees the new row.
    pub fn insert_row(&mut self, pos: usize, values: Vec<crate::cell::Cell>) -> Result<()> {
        for (col, value) in self.columns.iter().zip(values) {
            col.borrow_mut().insert(pos, value);
        }
        for reg in self.indices.values() {
            if !reg.freeze.get() {
                reg.index.borrow_mut().add_row(pos)?;
            }
        }
        Ok(())
    }

    /// Delete row `r`. Indices are updated before the column storage so
    /// their `remove_row` can still read the soon-to-be-deleted values.
    pub fn remove_row(&mut self, r: usize) -> Result<()> {
        for reg in self.indices.values() {
            if !reg.freeze.get() {
                reg.index.borrow_mut().remove_row(r, true)?;
            }
        }
        for col in &self.columns {
            col.borrow_mut().remove(r);
        }
        Ok(())
    }

    /// Delete a batch of rows per `spec` (§4.5's two-pass discipline).
    /// Indices are updated first; the physical column removal then runs in
    /// descending row order so earlier removals don't shift the positions
    /// still pending deletion.
    pub fn remove_rows(&mut self, spec: crate::index::RemoveSpec) -> Result<()> {
        let mut rows: Vec<usize> = match &spec {
            crate::index::RemoveSpec::Row(r) => vec![*r],
            crate::index::RemoveSpec::Rows(rs) => rs.clone(),
            crate::index::RemoveSpec::Stride { start, stop, step } => {
                if *step == 0 {
                    return Err(IndexError::UnsupportedRemoveSpec("stride step cannot be zero".to_string()));
                }
                crate::slice_math::stride_rows(*start, *stop, *step)
            }
        };
        rows.sort_unstable();
        rows.dedup();

        for reg in self.indices.values() {
            if !reg.freeze.get() {
                reg.index.borrow_mut().remove_rows(spec.clone())?;
            }
        }
        for &r in rows.iter().rev() {
            for col in &self.columns {
                col.borrow_mut().remove(r);
            }
        }
        Ok(())
    }

    /// Assign a single cell. Indices are updated before the column write so
    /// they can still read the old value for the remove half of `replace`.
    pub fn set_cell(&mut self, row: usize, col_name: &str, value: crate::cell::Cell) -> Result<()> {
        let col_pos_in_table = self.columns.iter().position(|c| c.borrow().name() == col_name).ok_or_else(|| IndexError::ColumnNotFound(col_name.to_string()))?;
        for reg in self.indices.values() {
            if reg.freeze.get() {
                continue;
            }
            let mut idx = reg.index.borrow_mut();
            if let Ok(pos) = idx.col_position(col_name) {
                idx.replace(row, pos, value.clone())?;
            }
        }
        self.columns[col_pos_in_table].borrow_mut().set(row, value);
        Ok(())
    }

    /// Reorder every column per `perm` (new row -> old row), e.g. after a
    /// table-level sort or fancy-index selection (§4.8).
    pub fn reorder_rows(&mut self, perm: &[usize]) -> Result<()> {
        for reg in self.indices.values() {
            if !reg.freeze.get() {
                reg.index.borrow_mut().replace_rows(perm)?;
            }
        }
        for col in &self.columns {
            col.borrow_mut().reorder(perm);
        }
        Ok(())
    }

    /// Deep copy: clones column storage into new `Rc`s, then rebuilds (or
    /// drops, per `discard_on_copy`) every index against the new columns
    /// (§4.7, §4.8).
    pub fn deep_copy(&self) -> Result<Table> {
        let mut name_to_new_col: HashMap<String, ColumnRef> = HashMap::new();
        let new_columns: Vec<ColumnRef> = self
            .columns
            .iter()
            .map(|c| {
                let c = c.borrow();
                let cloned: ColumnRef = Rc::new(RefCell::new(VecColumn::new(
                    c.name(),
                    c.dtype(),
                    (0..c.len()).map(|i| c.get(i).expect("row within len")).collect(),
                )));
                name_to_new_col.insert(c.name().to_string(), Rc::clone(&cloned));
                cloned
            })
            .collect();

        let mut copy = Table::new(new_columns);
        for (name, reg) in &self.indices {
            if reg.discard_on_copy.get() {
                continue;
            }
            let old_index = reg.index.borrow();
            let new_cols: Vec<ColumnRef> = old_index
                .columns()
                .iter()
                .map(|c| name_to_new_col.get(c.borrow().name()).cloned().expect("column present in copy"))
                .collect();
            let new_index = old_index.clone_with_columns(new_cols)?;
            copy.indices.insert(
                name.clone(),
                Registered {
                    index: Rc::new(RefCell::new(new_index)),
                    freeze: mode_flag(reg.freeze.get()),
                    discard_on_copy: mode_flag(reg.discard_on_copy.get()),
                    copy_on_getitem: mode_flag(reg.copy_on_getitem.get()),
                },
            );
        }
        Ok(copy)
    }

    /// Rebind every index's column references after this table's own
    /// columns have been re-identified (e.g. replaced wholesale under the
    /// same names) — §4.8's `refresh` hook.
    pub fn refresh_indices(&mut self) -> Result<()> {
        for reg in self.indices.values() {
            let mut idx = reg.index.borrow_mut();
            let names: Vec<String> = idx.columns().iter().map(|c| c.borrow().name().to_string()).collect();
            let cols = names
                .iter()
                .map(|n| self.column(n).ok_or_else(|| IndexError::ColumnNotFound(n.clone())))
                .collect::<Result<Vec<_>>>()?;
            idx.refresh(cols)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, CellType};
    use crate::engine::EngineKind;

    fn sample_table() -> Table {
        let a = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, vec![Cell::Int(3), Cell::Int(1), Cell::Int(2)])));
        Table::new(vec![a])
    }

    #[test]
    fn add_index_then_find() {
        let mut t = sample_table();
        t.add_index("by_a", &["a"], EngineKind::Bst).unwrap();
        let idx = t.index("by_a").unwrap();
        assert_eq!(idx.borrow().find(&[Cell::Int(1)]), vec![1]);
    }

    #[test]
    fn append_and_remove_row_keep_index_in_sync() {
        let mut t = sample_table();
        t.add_index("by_a", &["a"], EngineKind::SortedArray).unwrap();
        t.append_row(vec![Cell::Int(9)]).unwrap();
        let idx = t.index("by_a").unwrap();
        assert_eq!(idx.borrow().find(&[Cell::Int(9)]), vec![3]);

        t.remove_row(0).unwrap();
        let idx = t.index("by_a").unwrap();
        assert!(idx.borrow().find(&[Cell::Int(3)]).is_empty());
        assert_eq!(idx.borrow().find(&[Cell::Int(9)]), vec![2]);
    }

    #[test]
    fn set_cell_moves_row_to_new_key() {
        let mut t = sample_table();
        t.add_index("by_a", &["a"], EngineKind::Rbt).unwrap();
        t.set_cell(1, "a", Cell::Int(50)).unwrap();
        let idx = t.index("by_a").unwrap();
        assert!(idx.borrow().find(&[Cell::Int(1)]).is_empty());
        assert_eq!(idx.borrow().find(&[Cell::Int(50)]), vec![1]);
    }

    #[test]
    fn discard_on_copy_drops_the_index_in_the_copy() {
        let mut t = sample_table();
        t.add_index("by_a", &["a"], EngineKind::Bst).unwrap();
        {
            let _g = t.index_mode("by_a", Mode::DiscardOnCopy).unwrap();
            let copy = t.deep_copy().unwrap();
            assert!(copy.index("by_a").is_none());
        }
        let copy = t.deep_copy().unwrap();
        assert!(copy.index("by_a").is_some());
    }

    #[test]
    fn freeze_mode_suspends_tracking_until_guard_drops() {
        let mut t = sample_table();
        t.add_index("by_a", &["a"], EngineKind::Bst).unwrap();
        {
            let _g = t.index_mode("by_a", Mode::Freeze).unwrap();
            t.append_row(vec![Cell::Int(42)]).unwrap();
            let idx = t.index("by_a").unwrap();
            assert!(idx.borrow().find(&[Cell::Int(42)]).is_empty());
        }
        // guard dropped: unfreeze + reload happen automatically
        let idx = t.index("by_a").unwrap();
        assert!(!idx.borrow().is_frozen());
        assert_eq!(idx.borrow().find(&[Cell::Int(42)]), vec![3]);
    }

    #[test]
    fn nested_freeze_does_not_resync_until_outer_guard_drops() {
        let mut t = sample_table();
        t.add_index("by_a", &["a"], EngineKind::Bst).unwrap();
        let outer = t.index_mode("by_a", Mode::Freeze).unwrap();
        {
            let _inner = t.index_mode("by_a", Mode::Freeze).unwrap();
            t.append_row(vec![Cell::Int(7)]).unwrap();
        }
        let idx = t.index("by_a").unwrap();
        assert!(idx.borrow().is_frozen(), "outer freeze must still be in effect");
        assert!(idx.borrow().find(&[Cell::Int(7)]).is_empty());
        drop(outer);
        let idx = t.index("by_a").unwrap();
        assert!(!idx.borrow().is_frozen());
        assert_eq!(idx.borrow().find(&[Cell::Int(7)]), vec![3]);
    }
}
