//! `SlicedIndex` (§4.6): a coordinate-translating read-mostly view over an
//! `Index` for a strided row window. Never materialises a copy of the
//! parent's engine contents.

use crate::cell::Cell;
use crate::error::Result;
use crate::index::Index;
use crate::key::{Bounds, Key};
use crate::slice_math::{orig_coord, row_in_slice, sliced_coord, slice_length};
use std::cell::RefCell;
use std::rc::Rc;

pub struct SlicedIndex {
    parent: Rc<RefCell<Index>>,
    start: isize,
    stop: isize,
    step: isize,
    length: usize,
}

impl SlicedIndex {
    pub fn new(parent: Rc<RefCell<Index>>, start: isize, stop: isize, step: isize) -> Self {
        let length = slice_length(start, stop, step);
        Self { parent, start, stop, step, length }
    }

    pub fn len(&self) -> usize { self.length }
    pub fn is_empty(&self) -> bool { self.length == 0 }

    fn orig(&self, i: usize) -> isize { orig_coord(i, self.start, self.step) }

    /// Translate a set of parent row numbers into sliced coordinates,
    /// dropping any row that isn't visible through this window (S3). An
    /// empty view never touches the parent engine at all.
    fn sliced_coords(&self, parent_rows: Vec<usize>) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        parent_rows
            .into_iter()
            .filter_map(|r| {
                let r = r as isize;
                row_in_slice(r, self.start, self.stop, self.step).then(|| sliced_coord(r, self.start, self.step))
            })
            .collect()
    }

    pub fn find(&self, values: &[Cell]) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let rows = self.parent.borrow().find(values);
        self.sliced_coords(rows)
    }

    pub fn range(&self, lo: &[Cell], hi: &[Cell], bounds: Bounds) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let rows = self.parent.borrow().range(lo, hi, bounds);
        self.sliced_coords(rows)
    }

    pub fn same_prefix(&self, prefix: &[Cell]) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let rows = self.parent.borrow().same_prefix(prefix);
        self.sliced_coords(rows)
    }

    pub fn range_keys(&self, lo: &Key, hi: &Key, bounds: Bounds) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let rows = self.parent.borrow().range_keys(lo, hi, bounds);
        self.sliced_coords(rows)
    }

    /// The argsort restricted to this window, in sliced coordinates.
    pub fn sorted_data(&self) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let parent_sorted = self.parent.borrow().sorted_data();
        self.sliced_coords(parent_sorted)
    }

    /// Writes forward to the parent with the sliced row translated back to
    /// parent coordinates (§4.6's `orig_coords`).
    pub fn replace(&self, sliced_row: usize, col: usize, new: Cell) -> Result<()> {
        if self.is_empty() || sliced_row >= self.length {
            return Ok(());
        }
        let parent_row = self.orig(sliced_row) as usize;
        self.parent.borrow_mut().replace(parent_row, col, new)
    }

    /// Slicing a `SlicedIndex` composes the affine transforms instead of
    /// nesting views: the new window's `(start, stop, step)` are expressed
    /// directly against the same parent.
    pub fn get(&self, start: isize, stop: isize, step: isize) -> SlicedIndex {
        if self.is_empty() || step == 0 {
            return SlicedIndex { parent: Rc::clone(&self.parent), start: 0, stop: 0, step: 1, length: 0 };
        }
        let composed_start = self.orig(start.clamp(0, self.length as isize).max(0) as usize);
        let composed_step = self.step * step;
        let clamped_stop = stop.clamp(-1, self.length as isize);
        let composed_stop = if clamped_stop >= self.length as isize {
            // "one past the end" in parent coordinates — but which end
            // depends on the composed step's own direction, not `self`'s:
            // a negative composed step can never walk up to the forward
            // boundary, so the exclusive sentinel must be the backward one
            // (same formula as the `clamped_stop < 0` branch below).
            if composed_step < 0 {
                self.start - self.step
            } else {
                self.start + self.step * self.length as isize
            }
        } else if clamped_stop < 0 {
            self.start - self.step
        } else {
            self.orig(clamped_stop as usize)
        };
        SlicedIndex::new(Rc::clone(&self.parent), composed_start, composed_stop, composed_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellType;
    use crate::column::VecColumn;
    use crate::engine::EngineKind;

    fn make_index(values: Vec<i64>) -> Rc<RefCell<Index>> {
        let col = Rc::new(RefCell::new(VecColumn::new("a", CellType::Int, values.into_iter().map(Cell::Int).collect())));
        Rc::new(RefCell::new(Index::new(vec![col], EngineKind::SortedArray).unwrap()))
    }

    #[test]
    fn basic_stride_and_reverse_matches_scenario_3() {
        // initial load a = [1,2,3,4,5] indexed by a; t[::2] then [::-1]
        let parent = make_index(vec![1, 2, 3, 4, 5]);
        let s1 = SlicedIndex::new(Rc::clone(&parent), 0, 5, 2); // rows 0,2,4
        assert_eq!(s1.len(), 3);
        let s2 = s1.get(2, -1, -1); // [::-1] over the 3-length slice
        assert_eq!(s2.sorted_data(), vec![2, 1, 0]);
    }

    #[test]
    fn empty_slice_never_touches_parent() {
        let parent = make_index(vec![1, 2, 3]);
        let empty = SlicedIndex::new(Rc::clone(&parent), 5, 5, 1);
        assert!(empty.is_empty());
        assert!(empty.find(&[Cell::Int(1)]).is_empty());
        assert!(empty.sorted_data().is_empty());
    }

    #[test]
    fn negative_step_slice() {
        let parent = make_index(vec![10, 20, 30, 40, 50]);
        let rev = SlicedIndex::new(Rc::clone(&parent), 4, -1, -1);
        assert_eq!(rev.len(), 5);
        // parent row 4 -> sliced coord 0, parent row 0 -> sliced coord 4
        let rows = rev.find(&[Cell::Int(10)]);
        assert_eq!(rows, vec![4]);
    }

    #[test]
    fn out_of_range_slice_is_empty() {
        let parent = make_index(vec![1, 2, 3]);
        let oob = SlicedIndex::new(Rc::clone(&parent), 10, 20, 1);
        assert!(oob.is_empty());
    }
}
