//! The ordered-map engine contract (§4.2) and the three engines that
//! implement it.
//!
//! Each engine is gated behind its own Cargo feature (`bst`, `rbt`,
//! `sorted-array`, all on by default) mirroring how the teacher crate gates
//! optional storage backends (`postgres`, `sled`) behind features rather
//! than a runtime config file — see SPEC_FULL.md's "Configuration" note.
//! `bst` and `rbt` share the same underlying module (`bst.rs`) since they
//! are the same node/tree shape with balancing fix-ups toggled on or off;
//! the module compiles in if either feature is enabled.

#[cfg(any(feature = "bst", feature = "rbt"))]
mod bst;
#[cfg(feature = "sorted-array")]
mod sorted_array;

#[cfg(any(feature = "bst", feature = "rbt"))]
pub use bst::BstEngine;
#[cfg(feature = "sorted-array")]
pub use sorted_array::SortedArrayEngine;

use crate::error::{EngineError, IndexError};
use crate::key::{Bounds, Key};

/// Which concrete engine backs an `Index`. Chosen once at `Index::new` time
/// — the closest thing this library has to a runtime "configuration" knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Unbalanced binary search tree. Degrades to O(N) on adversarial
    /// (sorted) insertion order; kept as the reference/teaching engine.
    #[cfg(feature = "bst")]
    Bst,
    /// Red-black tree: same node shape as `Bst`, with rotate/recolour
    /// fix-ups after insertion, so it stays O(log N) regardless of
    /// insertion order.
    #[cfg(feature = "rbt")]
    Rbt,
    /// Sorted parallel arrays with binary search. Fastest bulk-load and
    /// read path; O(N) per write. Default for read-mostly indices.
    #[cfg(feature = "sorted-array")]
    SortedArray,
}

impl EngineKind {
    /// Parse a caller-supplied identifier (§6: "Engine-kind identifiers:
    /// `BST`, `RBT`, `SortedArray`. Unknown kinds fail at index creation
    /// time."). An identifier naming an engine whose feature is not
    /// compiled in fails the same way an unrecognized identifier does.
    pub fn parse(s: &str) -> Result<Self, IndexError> {
        match s {
            #[cfg(feature = "bst")]
            "BST" => Ok(EngineKind::Bst),
            #[cfg(feature = "rbt")]
            "RBT" => Ok(EngineKind::Rbt),
            #[cfg(feature = "sorted-array")]
            "SortedArray" => Ok(EngineKind::SortedArray),
            other => Err(IndexError::UnknownEngineKind(other.to_string())),
        }
    }

    pub fn build(self, entries: impl IntoIterator<Item = (Key, usize)>) -> Box<dyn Engine> {
        match self {
            #[cfg(feature = "bst")]
            EngineKind::Bst => Box::new(BstEngine::new(entries, false)),
            #[cfg(feature = "rbt")]
            EngineKind::Rbt => Box::new(BstEngine::new(entries, true)),
            #[cfg(feature = "sorted-array")]
            EngineKind::SortedArray => Box::new(SortedArrayEngine::new(entries)),
        }
    }
}

/// The capability set every ordered-map engine must provide (§4.2).
///
/// Implemented as a trait object (`Box<dyn Engine>`) rather than a generic
/// parameter on `Index`, so the engine kind can be chosen dynamically from
/// an `EngineKind` value rather than baked into `Index`'s type — see
/// "Polymorphism across engines" in the design notes.
pub trait Engine {
    /// All rows whose key equals `key`, ascending. Never fails on a
    /// type-mismatched key; an incomparable key simply matches nothing.
    fn find(&self, key: &Key) -> Vec<usize>;

    /// Insert one `(key, row)` entry. Does not invalidate any other stored
    /// row number.
    fn add(&mut self, key: Key, row: usize);

    /// All rows whose key falls in `[lo, hi]`/`(lo, hi)`/etc. per `bounds`.
    /// Unordered; callers needing order call `sort()`/`sorted_data()`
    /// afterward.
    fn range(&self, lo: &Key, hi: &Key, bounds: Bounds) -> Vec<usize>;

    /// All rows whose key has `prefix` as an element-wise prefix.
    fn same_prefix(&self, prefix: &Key) -> Vec<usize>;

    /// Remove one `(key, row)` entry if `row` is `Some`, or every entry
    /// under `key` if `row` is `None`.
    ///
    /// Returns `Ok(false)` only when `key` is absent entirely. Returns
    /// `Err` when `row` was given, the key exists, but `row` is not among
    /// its entries — that is an invariant violation, not a soft miss.
    fn remove(&mut self, key: &Key, row: Option<usize>) -> Result<bool, EngineError>;

    /// Subtract 1 from every row number strictly greater than `r`.
    fn shift_left(&mut self, r: usize);

    /// Add 1 to every row number greater than or equal to `r`.
    fn shift_right(&mut self, r: usize);

    /// For every entry whose row is a key of `map`, rewrite it to
    /// `map[row]`; drop entries whose row has no entry in `map`.
    fn replace_rows(&mut self, map: &std::collections::HashMap<usize, usize>);

    /// All rows in in-order key sequence: the argsort.
    fn sort(&self) -> Vec<usize>;

    /// Key-grouped entries in in-order key sequence.
    fn items(&self) -> Vec<(Key, Vec<usize>)>;
}

#[cfg(any(feature = "bst", feature = "rbt"))]
impl Engine for BstEngine {
    fn find(&self, key: &Key) -> Vec<usize> { BstEngine::find(self, key) }
    fn add(&mut self, key: Key, row: usize) { BstEngine::add(self, key, row) }
    fn range(&self, lo: &Key, hi: &Key, bounds: Bounds) -> Vec<usize> { BstEngine::range(self, lo, hi, bounds) }
    fn same_prefix(&self, prefix: &Key) -> Vec<usize> { BstEngine::same_prefix(self, prefix) }
    fn remove(&mut self, key: &Key, row: Option<usize>) -> Result<bool, EngineError> { BstEngine::remove(self, key, row) }
    fn shift_left(&mut self, r: usize) { BstEngine::shift_left(self, r) }
    fn shift_right(&mut self, r: usize) { BstEngine::shift_right(self, r) }
    fn replace_rows(&mut self, map: &std::collections::HashMap<usize, usize>) { BstEngine::replace_rows(self, map) }
    fn sort(&self) -> Vec<usize> { BstEngine::sort(self) }
    fn items(&self) -> Vec<(Key, Vec<usize>)> { BstEngine::items(self) }
}

#[cfg(feature = "sorted-array")]
impl Engine for SortedArrayEngine {
    fn find(&self, key: &Key) -> Vec<usize> { SortedArrayEngine::find(self, key) }
    fn add(&mut self, key: Key, row: usize) { SortedArrayEngine::add(self, key, row) }
    fn range(&self, lo: &Key, hi: &Key, bounds: Bounds) -> Vec<usize> { SortedArrayEngine::range(self, lo, hi, bounds) }
    fn same_prefix(&self, prefix: &Key) -> Vec<usize> { SortedArrayEngine::same_prefix(self, prefix) }
    fn remove(&mut self, key: &Key, row: Option<usize>) -> Result<bool, EngineError> { SortedArrayEngine::remove(self, key, row) }
    fn shift_left(&mut self, r: usize) { SortedArrayEngine::shift_left(self, r) }
    fn shift_right(&mut self, r: usize) { SortedArrayEngine::shift_right(self, r) }
    fn replace_rows(&mut self, map: &std::collections::HashMap<usize, usize>) { SortedArrayEngine::replace_rows(self, map) }
    fn sort(&self) -> Vec<usize> { SortedArrayEngine::sort(self) }
    fn items(&self) -> Vec<(Key, Vec<usize>)> { SortedArrayEngine::items(self) }
}
