//! Columnar filter engine for trace analysis.
//!
//! Traces routinely carry hundreds of millions of rows, so this engine never
//! materializes column copies to answer a predicate. Instead it composes:
//! - typed storages ([`storage::IdStorage`], [`storage::NumericStorage`],
//!   [`storage::StringStorage`], [`storage::SetIdStorage`],
//!   [`storage::NullStorage`]) that answer filter operations against their
//!   native encodings, binary searching wherever sortedness allows;
//! - overlays ([`overlay::SelectorOverlay`], [`overlay::ArrangementOverlay`])
//!   that remap row indices above a storage without ever reading values;
//! - a [`QueryExecutor`] that narrows a [`tracegrid_columnar::RowMap`]
//!   constraint by constraint, choosing between range-threaded and
//!   index-threaded evaluation per column.
//!
//! Ingestion and querying are phase-separated: [`table::TableBuilder`] owns
//! the append-only build path and validates encoding invariants once, at
//! finalize time; everything query-facing borrows immutably from the
//! finished [`table::Table`].

pub mod executor;
pub mod glob;
pub mod overlay;
pub mod storage;
pub mod table;
pub mod types;
pub mod value;

pub use crate::executor::{Column, FilterConfig, QueryExecutor};
pub use crate::table::{Table, TableBuilder, TableError};
pub use crate::types::{
    Constraint, FilterOp, IndexState, Indices, RangeOrBitVec, SearchValidation, SingleSearch,
    SortDirection, SortToken,
};
pub use crate::value::SqlValue;
