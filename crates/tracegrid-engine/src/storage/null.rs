use tracegrid_columnar::{BitVec, BitVecBuilder, RowRange};

use crate::storage::Storage;
use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

/// Wraps an inner storage with a presence bitmap, making a dense column
/// nullable without widening its backing array.
///
/// Outer row `r` is null when `presence[r] == 0`; otherwise it maps to inner
/// row `rank(presence, r)`. Every predicate except the null tests runs on
/// the compacted inner positions and the result is translated back to the
/// sparse outer numbering. Null positions puncture contiguity, so bounded
/// searches over a nulled column produce bitmaps, never ranges.
pub struct NullStorage<'a> {
    inner: Box<dyn Storage + 'a>,
    presence: &'a BitVec,
}

/// Maps an inner (compact-space) result back through `non_null` to the outer
/// numbering, clamped to `out_end` bits.
fn reconcile(non_null: &BitVec, inner_res: RangeOrBitVec, out_end: u32) -> BitVec {
    let mut res = match inner_res {
        RangeOrBitVec::Range(r) if !r.is_empty() => {
            // The compact run [r.start, r.end) covers the outer positions
            // between its first and last set bit; nulls in between drop out
            // via the intersection.
            let lo = non_null.index_of_nth_set(r.start);
            let hi = non_null.index_of_nth_set(r.end - 1) + 1;
            non_null.intersect_range(lo, hi)
        }
        RangeOrBitVec::Range(_) => BitVec::filled(non_null.len(), false),
        RangeOrBitVec::BitVec(bv) => {
            let mut out = non_null.clone();
            out.update_set_bits(&bv);
            out
        }
    };
    res.resize(out_end, false);
    res
}

impl<'a> NullStorage<'a> {
    pub fn new(inner: Box<dyn Storage + 'a>, presence: &'a BitVec) -> Self {
        debug_assert!(presence.count_set_bits() <= inner.len());
        Self { inner, presence }
    }

    /// The null positions within `range`, as a bitmap of `range.end` bits.
    fn null_bits_in_range(&self, range: RowRange) -> BitVec {
        let mut nulls = self.presence.clone();
        nulls.resize(range.end, false);
        nulls.not_inplace();
        nulls.intersect_range(range.start, range.end)
    }

    /// Splits the outer positions into a presence bitmap (position space) and
    /// the compact indices of the non-null ones.
    fn translate_indices(&self, indices: &Indices<'_>) -> (BitVec, Vec<u32>) {
        let mut present = BitVecBuilder::new(indices.len());
        let mut compact = Vec::with_capacity(indices.data.len());
        for &row in indices.data {
            let non_null = self.presence.get(row);
            if non_null {
                compact.push(self.presence.count_set_bits_before(row));
            }
            present.append(non_null);
        }
        (present.build(), compact)
    }
}

impl Storage for NullStorage<'_> {
    fn len(&self) -> u32 {
        self.presence.len()
    }

    fn validate(&self, op: FilterOp, value: &SqlValue) -> SearchValidation {
        // The null tests are always answerable from the bitmap, whatever the
        // inner storage thinks of the operand.
        if matches!(op, FilterOp::IsNull | FilterOp::IsNotNull) {
            return SearchValidation::Ok;
        }
        self.inner.validate(op, value)
    }

    fn search_validated(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec {
        debug_assert!(range.end <= self.len());
        log::trace!("NullStorage::search {op:?} over [{}, {})", range.start, range.end);

        // The inner storage may itself hold nulls (a string column's null
        // sentinel); its verdict decides whether delegation is needed at all.
        if op == FilterOp::IsNull {
            match self.inner.validate(op, value) {
                SearchValidation::NoData => {
                    return RangeOrBitVec::BitVec(self.null_bits_in_range(range))
                }
                SearchValidation::AllData => return RangeOrBitVec::Range(range),
                SearchValidation::Ok => {}
            }
        }
        if op == FilterOp::IsNotNull {
            match self.inner.validate(op, value) {
                SearchValidation::AllData => {
                    let mut bv = self.presence.intersect_range(range.start, range.end);
                    bv.resize(range.end, false);
                    return RangeOrBitVec::BitVec(bv);
                }
                SearchValidation::NoData => return RangeOrBitVec::empty(),
                SearchValidation::Ok => {}
            }
        }

        let inner_range = RowRange::new(
            self.presence.count_set_bits_before(range.start),
            self.presence.count_set_bits_before(range.end),
        );
        let inner_res = self.inner.search_validated(op, value, inner_range);
        let mut res = reconcile(self.presence, inner_res, range.end);
        if op == FilterOp::IsNull {
            res.or_inplace(&self.null_bits_in_range(range));
        }
        RangeOrBitVec::BitVec(res)
    }

    fn index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec {
        log::trace!("NullStorage::index_search {op:?} over {} indices", indices.len());

        let (present, compact) = self.translate_indices(indices);

        if op == FilterOp::IsNull {
            match self.inner.validate(op, value) {
                SearchValidation::NoData => {
                    let mut nulls = present;
                    nulls.not_inplace();
                    return RangeOrBitVec::BitVec(nulls);
                }
                SearchValidation::AllData => {
                    return RangeOrBitVec::Range(RowRange::new(0, indices.len()))
                }
                SearchValidation::Ok => {}
            }
        }
        if op == FilterOp::IsNotNull {
            match self.inner.validate(op, value) {
                SearchValidation::AllData => return RangeOrBitVec::BitVec(present),
                SearchValidation::NoData => return RangeOrBitVec::empty(),
                SearchValidation::Ok => {}
            }
        }

        let inner_res = self.inner.index_search_validated(
            op,
            value,
            &Indices { data: &compact, state: indices.state },
        );
        let mut res = reconcile(&present, inner_res, indices.len());
        if op == FilterOp::IsNull {
            let mut nulls = present;
            nulls.not_inplace();
            res.or_inplace(&nulls);
        }
        RangeOrBitVec::BitVec(res)
    }

    fn ordered_index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange {
        assert!(op != FilterOp::Ne, "not-equal cannot use an ordered search");

        // Ordered views put every null in front.
        let non_null_offset =
            indices.data.partition_point(|&row| !self.presence.get(row)) as u32;

        if op == FilterOp::IsNull {
            return RowRange::new(0, non_null_offset);
        }
        if op == FilterOp::IsNotNull {
            match self.inner.validate(op, value) {
                SearchValidation::NoData => return RowRange::empty(),
                SearchValidation::AllData => return RowRange::new(non_null_offset, indices.len()),
                SearchValidation::Ok => {}
            }
        }

        let compact: Vec<u32> = indices.data[non_null_offset as usize..]
            .iter()
            .map(|&row| self.presence.count_set_bits_before(row))
            .collect();
        let inner = self.inner.ordered_index_search_validated(
            op,
            value,
            &Indices { data: &compact, state: indices.state },
        );
        RowRange::new(inner.start + non_null_offset, inner.end + non_null_offset)
    }

    fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch {
        if !self.presence.get(row) {
            return if op == FilterOp::IsNull { SingleSearch::Match } else { SingleSearch::NoMatch };
        }
        self.inner.single_search(op, value, self.presence.count_set_bits_before(row))
    }

    fn stable_sort_tokens(&self, tokens: &mut [SortToken], direction: SortDirection) {
        // Stable partition: nulls first, then the non-null tail sorted by the
        // inner storage through compact indices.
        let mut nulls = Vec::new();
        let mut non_nulls = Vec::new();
        for t in tokens.iter() {
            if self.presence.get(t.index) {
                non_nulls.push(SortToken {
                    index: self.presence.count_set_bits_before(t.index),
                    payload: t.payload,
                });
            } else {
                nulls.push(*t);
            }
        }
        self.inner.stable_sort_tokens(&mut non_nulls, direction);

        let split = nulls.len();
        tokens[..split].copy_from_slice(&nulls);
        tokens[split..].copy_from_slice(&non_nulls);
        if direction == SortDirection::Descending {
            tokens.rotate_left(split);
        }
    }
}
