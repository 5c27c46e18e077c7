//! Mode context (§4.7): three mutually-exclusive modes an index (or a whole
//! table of indices) can be put into for the duration of a bulk operation,
//! each restored by `Drop` rather than requiring the caller to remember to
//! undo it — the same shape as a transaction guard, scoped to a narrower
//! concern.

use crate::error::IndexError;
use std::cell::Cell as StdCell;
use std::rc::Rc;

/// Which exclusive mode is active. `parse` mirrors `EngineKind::parse`'s
/// contract: an unrecognized mode string fails at the call site rather than
/// silently doing nothing (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Indices stop tracking row mutations until unfrozen, then
    /// resynchronise via `reload` (§4.7, §4.5).
    Freeze,
    /// A deep copy of the host table does not deep-copy its indices; the
    /// copy starts with none.
    DiscardOnCopy,
    /// A `__getitem__`-style read returns a deep copy rather than a live
    /// `SlicedIndex` view.
    CopyOnGetitem,
}

impl Mode {
    pub fn parse(s: &str) -> Result<Self, IndexError> {
        match s {
            "freeze" => Ok(Mode::Freeze),
            "discard_on_copy" => Ok(Mode::DiscardOnCopy),
            "copy_on_getitem" => Ok(Mode::CopyOnGetitem),
            other => Err(IndexError::UnknownMode(other.to_string())),
        }
    }
}

/// Shared boolean flag a `ModeGuard` toggles on enter and restores on exit.
/// `Rc<Cell<bool>>` rather than `Rc<RefCell<bool>>`: `bool` is `Copy`, so
/// the interior-mutability cell needs no borrow tracking.
pub type ModeFlag = Rc<StdCell<bool>>;

pub fn mode_flag(initial: bool) -> ModeFlag { Rc::new(StdCell::new(initial)) }

/// RAII guard that sets a mode flag to `true` on construction and restores
/// its prior value on `Drop`, however the scope exits (including via `?` or
/// panic unwind) — see §4.7 and the design notes' "RAII mode guards".
///
/// Deliberately does not implement `Clone`/`Copy`: a mode's lifetime must
/// map onto exactly one lexical scope, not be duplicated.
pub struct ModeGuard {
    flag: ModeFlag,
    previous: bool,
}

impl ModeGuard {
    /// Enter the mode tracked by `flag`. Nesting is allowed (matches the
    /// prior value on exit rather than unconditionally clearing), so a
    /// guard entered inside an already-active outer guard of the same kind
    /// leaves that outer guard's effect intact.
    pub fn enter(flag: ModeFlag) -> Self {
        let previous = flag.get();
        flag.set(true);
        Self { flag, previous }
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) { self.flag.set(self.previous); }
}
