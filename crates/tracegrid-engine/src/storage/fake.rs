use tracegrid_columnar::{BitVec, BitVecBuilder, RowRange};

use crate::storage::Storage;
use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

/// A storage double with a fixed answer, for exercising overlay and executor
/// plumbing without real data.
pub(crate) struct FakeStorage {
    len: u32,
    behavior: Behavior,
}

enum Behavior {
    All,
    None,
    Range(RowRange),
    BitVec(BitVec),
}

impl FakeStorage {
    pub(crate) fn match_all(len: u32) -> Self {
        Self { len, behavior: Behavior::All }
    }

    pub(crate) fn match_none(len: u32) -> Self {
        Self { len, behavior: Behavior::None }
    }

    pub(crate) fn match_range(len: u32, range: RowRange) -> Self {
        Self { len, behavior: Behavior::Range(range) }
    }

    pub(crate) fn match_bit_vec(bv: BitVec) -> Self {
        Self { len: bv.len(), behavior: Behavior::BitVec(bv) }
    }

    fn matches_row(&self, row: u32) -> bool {
        match &self.behavior {
            Behavior::All => true,
            Behavior::None => false,
            Behavior::Range(r) => r.contains(row),
            Behavior::BitVec(bv) => bv.get(row),
        }
    }
}

impl Storage for FakeStorage {
    fn len(&self) -> u32 {
        self.len
    }

    fn validate(&self, _: FilterOp, _: &SqlValue) -> SearchValidation {
        SearchValidation::Ok
    }

    fn search_validated(&self, _: FilterOp, _: &SqlValue, range: RowRange) -> RangeOrBitVec {
        match &self.behavior {
            Behavior::All => RangeOrBitVec::Range(range),
            Behavior::None => RangeOrBitVec::empty(),
            Behavior::Range(r) => RangeOrBitVec::Range(range.intersect(r)),
            Behavior::BitVec(bv) => {
                let mut out = bv.intersect_range(range.start, range.end);
                out.resize(range.end, false);
                RangeOrBitVec::BitVec(out)
            }
        }
    }

    fn index_search_validated(
        &self,
        _: FilterOp,
        _: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec {
        let mut builder = BitVecBuilder::new(indices.len());
        for &row in indices.data {
            builder.append(self.matches_row(row));
        }
        RangeOrBitVec::BitVec(builder.build())
    }

    fn ordered_index_search_validated(
        &self,
        _: FilterOp,
        _: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange {
        // The matching positions are assumed contiguous in the view.
        let first = indices
            .data
            .iter()
            .position(|&row| self.matches_row(row))
            .unwrap_or(indices.data.len());
        let end = indices.data[first..]
            .iter()
            .position(|&row| !self.matches_row(row))
            .map_or(indices.data.len(), |p| first + p);
        RowRange::new(first as u32, end as u32)
    }

    fn single_search(&self, _: FilterOp, _: &SqlValue, row: u32) -> SingleSearch {
        if self.matches_row(row) {
            SingleSearch::Match
        } else {
            SingleSearch::NoMatch
        }
    }

    fn stable_sort_tokens(&self, _: &mut [SortToken], _: SortDirection) {
        unimplemented!("FakeStorage carries no values to sort by");
    }
}
