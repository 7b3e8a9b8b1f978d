use tracegrid_columnar::{BitVec, RowRange};

use crate::value::SqlValue;

/// Filter operations a constraint can apply to a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
    Glob,
    Regex,
}

/// Outcome of the cheap pre-check run before any real search work.
///
/// `AllData`/`NoData` let the executor skip touching the storage entirely:
/// type mismatches, out-of-domain numerics and unsupported operations all
/// resolve here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchValidation {
    Ok,
    AllData,
    NoData,
}

/// Outcome of probing a single row without running a full search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SingleSearch {
    Match,
    NoMatch,
    /// The probe could not decide cheaply (type coercion or out-of-range
    /// handling would be needed); run a full search instead.
    NeedsFullSearch,
}

/// A filter result: either a contiguous range of matching positions or an
/// arbitrary bitmap.
///
/// The range form is what makes binary-searchable storages cheap to compose:
/// it propagates through overlay stacks as two integers. Results degrade to
/// a bitmap only when matches lose contiguity (`Ne`, unsorted scans, null
/// punctures).
#[derive(Clone, Debug, PartialEq)]
pub enum RangeOrBitVec {
    Range(RowRange),
    BitVec(BitVec),
}

impl RangeOrBitVec {
    pub fn empty() -> Self {
        RangeOrBitVec::Range(RowRange::empty())
    }

    pub fn is_range(&self) -> bool {
        matches!(self, RangeOrBitVec::Range(_))
    }

    /// Unwraps the range variant. Panics on a bitmap; callers branch on
    /// [`RangeOrBitVec::is_range`] or match instead of guessing.
    pub fn take_if_range(self) -> RowRange {
        match self {
            RangeOrBitVec::Range(r) => r,
            RangeOrBitVec::BitVec(_) => panic!("result is a bit vector, not a range"),
        }
    }

    pub fn take_if_bit_vec(self) -> BitVec {
        match self {
            RangeOrBitVec::BitVec(bv) => bv,
            RangeOrBitVec::Range(_) => panic!("result is a range, not a bit vector"),
        }
    }
}

/// Whether an explicit index list is known to be sorted ascending.
///
/// Monotonic indices keep binary search available even after the list has
/// been threaded through order-preserving overlays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
    Monotonic,
    Nonmonotonic,
}

/// A borrowed list of storage positions to evaluate a predicate against.
#[derive(Clone, Copy, Debug)]
pub struct Indices<'a> {
    pub data: &'a [u32],
    pub state: IndexState,
}

impl<'a> Indices<'a> {
    pub fn monotonic(data: &'a [u32]) -> Self {
        debug_assert!(data.windows(2).all(|w| w[0] <= w[1]));
        Self { data, state: IndexState::Monotonic }
    }

    pub fn nonmonotonic(data: &'a [u32]) -> Self {
        Self { data, state: IndexState::Nonmonotonic }
    }

    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single filter constraint: `column <op> value`.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub column: usize,
    pub op: FilterOp,
    pub value: SqlValue,
}

impl Constraint {
    pub fn new(column: usize, op: FilterOp, value: SqlValue) -> Self {
        Self { column, op, value }
    }
}

/// Sort direction for storage-driven ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// An element handed to storage sorting.
///
/// `index` is the storage row whose value drives the comparison; `payload` is
/// opaque to the storage and carries whatever the caller needs to recover
/// (typically the pre-translation row number). Sorting consumes `index`;
/// callers read `payload` afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortToken {
    pub index: u32,
    pub payload: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_or_bit_vec_accessors() {
        let r = RangeOrBitVec::Range(RowRange::new(1, 4));
        assert!(r.is_range());
        assert_eq!(r.take_if_range(), RowRange::new(1, 4));

        let bv = RangeOrBitVec::BitVec([true, false].into());
        assert!(!bv.is_range());
        assert_eq!(bv.take_if_bit_vec().count_set_bits(), 1);
    }

    #[test]
    #[should_panic(expected = "not a range")]
    fn take_if_range_panics_on_bit_vec() {
        RangeOrBitVec::BitVec(BitVec::new()).take_if_range();
    }
}
