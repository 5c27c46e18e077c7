//! Secondary-index subsystem for in-memory tabular data.
//!
//! An [`index::Index`] binds an ordered tuple of [`column::Column`]s to one
//! of three pluggable ordered-map engines ([`engine`]) and keeps itself in
//! sync with row-level table mutations through a small set of hooks
//! (`add_row`, `remove_row`, `replace`, ...). [`sliced::SlicedIndex`]
//! layers a coordinate-translating view on top for strided row windows, and
//! [`mode`] provides RAII guards for the freeze / discard-on-copy /
//! copy-on-getitem modes a host table can put an index into.
//!
//! [`table::Table`] is a minimal reference host that wires these hooks
//! together; it exists to exercise the contract in tests, not as a general
//! dataframe.
//!
//! This crate is single-threaded by construction: indices share column
//! storage via `Rc<RefCell<_>>`, not `Arc<Mutex<_>>`, and carry no
//! `Send`/`Sync` bounds (§5).

pub mod cell;
pub mod column;
pub mod engine;
pub mod error;
pub mod index;
pub mod key;
pub mod mode;
pub mod slice_math;
pub mod sliced;
pub mod table;

pub use cell::{Cell, CellType};
pub use column::{Column, ColumnRef, VecColumn};
pub use engine::{Engine, EngineKind};
pub use error::{IndexError, Result};
pub use index::{Index, RemoveSpec};
pub use key::{Bounds, Key, KeyElem};
pub use mode::{Mode, ModeGuard};
pub use sliced::SlicedIndex;
pub use table::Table;
