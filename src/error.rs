use thiserror::Error;

/// Errors raised by an ordered-map engine (§4.2 of the contract).
///
/// These sit below [`IndexError`] and are wrapped by it rather than exposed
/// directly to callers of [`crate::index::Index`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// `remove(key, Some(row))` found the key but not that row among its entries.
    #[error("row {row} not found under key (invariant violation)")]
    RowNotFoundUnderKey { row: usize },
}

/// Top-level error type for the secondary-index subsystem.
#[derive(Error, Debug)]
pub enum IndexError {
    /// An engine-level invariant was violated. Indicates corruption upstream;
    /// never attempt to repair and continue.
    #[error("engine invariant violation: {0}")]
    Engine(#[from] EngineError),

    /// A row delete could not find a matching key in the engine at all.
    #[error("could not remove row {row}: no entry for its key")]
    NoEntryForRow { row: usize },

    /// `col_position` (or index construction) referenced a column the index
    /// does not bind.
    #[error("column {0:?} is not part of this index")]
    ColumnNotFound(String),

    /// Constructing an `Index` with an empty column list.
    #[error("an index must bind at least one column")]
    ZeroColumns,

    /// `EngineKind` parsed from a caller-supplied string/identifier that isn't
    /// one of `BST`, `RBT`, `SortedArray`.
    #[error("unknown engine kind: {0:?}")]
    UnknownEngineKind(String),

    /// `remove_rows` called with a specification shape the crate doesn't
    /// recognise (anything other than a single row, a list of rows, or a
    /// stride triple).
    #[error("unsupported remove_rows argument: {0}")]
    UnsupportedRemoveSpec(String),

    /// `ModeContext`/`index_mode` called with a mode string that is not one
    /// of `freeze`, `discard_on_copy`, `copy_on_getitem`.
    #[error("unknown index mode: {0:?}")]
    UnknownMode(String),

    /// Catch-all for host-supplied failures (e.g. a `Column` implementation's
    /// own error) that don't fit the taxonomy above.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
