//! Row-set containers for the tracegrid query engine.
//!
//! This crate holds the value-free primitives the engine composes:
//! - [`BitVec`]: a word-packed bitmap with O(1) set-bit count, rank/select
//!   queries, and a fixed-length streaming builder for predicate loops.
//! - [`RowRange`]: a half-open span of row indices.
//! - [`RowMap`]: the working "matching rows" set, switching between range,
//!   bitmap, and explicit index-list backing as results lose contiguity.
//! - [`StringPool`]: deduplicating string storage handing out stable ids.

#![forbid(unsafe_code)]

mod bitvec;
mod range;
mod row_map;
mod string_pool;

pub use crate::bitvec::{BitVec, BitVecBuilder, SetBitsIter, BITS_IN_WORD};
pub use crate::range::RowRange;
pub use crate::row_map::RowMap;
pub use crate::string_pool::{StringId, StringPool};
