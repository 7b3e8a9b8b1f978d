use tracegrid_columnar::{BitVecBuilder, RowRange};

use crate::storage::{
    compare, index_search_into, int_column_with_double, single_search_compare, validate_numeric,
    Coerced, NumericDomain, Storage,
};
use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

/// A column partitioning rows into contiguous sets.
///
/// The value at row `i` is the index of the first row of `i`'s set, so the
/// sequence is non-decreasing, `data[i] <= i`, and `data[data[i]] == data[i]`.
/// That self-indexing makes the value array its own group-boundary index:
/// a set id `v` can only occur at rows `>= v`, which bounds every binary
/// search probe.
#[derive(Debug, Clone, Copy)]
pub struct SetIdStorage<'a> {
    data: &'a [u32],
}

impl<'a> SetIdStorage<'a> {
    pub fn new(data: &'a [u32]) -> Self {
        debug_assert!(data.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!(data.iter().enumerate().all(|(i, &v)| v as usize <= i));
        Self { data }
    }

    fn upper_bound(&self, id: u32, range: RowRange) -> u32 {
        if id >= range.end {
            return range.end;
        }
        // `id` can only occur at rows >= id; skip straight there.
        let lo = range.start.max(id);
        let slice = &self.data[lo as usize..range.end as usize];
        lo + slice.partition_point(|&v| v <= id) as u32
    }

    fn lower_bound(&self, id: u32, range: RowRange) -> u32 {
        if range.is_empty() {
            return range.start;
        }
        if self.data[range.start as usize] == id {
            return range.start;
        }
        // A present set id is its own first row.
        if range.contains(id) && self.data[id as usize] == id {
            return id;
        }
        // Not present: the first row with a larger id is the lower bound.
        self.upper_bound(id, range)
    }

    fn binary_search_intrinsic(&self, op: FilterOp, id: u32, range: RowRange) -> RowRange {
        match op {
            FilterOp::Eq => RowRange::new(self.lower_bound(id, range), self.upper_bound(id, range)),
            FilterOp::Le => RowRange::new(range.start, self.upper_bound(id, range)),
            FilterOp::Lt => RowRange::new(range.start, self.lower_bound(id, range)),
            FilterOp::Ge => RowRange::new(self.lower_bound(id, range), range.end),
            FilterOp::Gt => RowRange::new(self.upper_bound(id, range), range.end),
            _ => panic!("invalid filter operation for a set id search"),
        }
    }

    fn coerce(op: FilterOp, value: &SqlValue) -> Coerced<u32> {
        match value {
            SqlValue::Double(d) => match int_column_with_double(op, *d) {
                Coerced::Value(v) => Coerced::Value(v as u32),
                Coerced::AllData => Coerced::AllData,
                Coerced::NoData => Coerced::NoData,
            },
            _ => Coerced::Value(value.as_long() as u32),
        }
    }
}

impl Storage for SetIdStorage<'_> {
    fn len(&self) -> u32 {
        self.data.len() as u32
    }

    fn validate(&self, op: FilterOp, value: &SqlValue) -> SearchValidation {
        validate_numeric(
            op,
            value,
            NumericDomain { min: Some(0.0), max: Some(u32::MAX as f64) },
        )
    }

    fn search_validated(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec {
        debug_assert!(range.end <= self.len());
        log::trace!("SetIdStorage::search {op:?} over [{}, {})", range.start, range.end);

        let id = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RangeOrBitVec::Range(range),
            Coerced::NoData => return RangeOrBitVec::empty(),
        };

        if op == FilterOp::Ne {
            let eq = self.binary_search_intrinsic(FilterOp::Eq, id, range);
            let mut builder = BitVecBuilder::with_prefix_zeros(range.end, range.start);
            for row in range.start..range.end {
                builder.append(!eq.contains(row));
            }
            return RangeOrBitVec::BitVec(builder.build());
        }
        RangeOrBitVec::Range(self.binary_search_intrinsic(op, id, range))
    }

    fn index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec {
        log::trace!("SetIdStorage::index_search {op:?} over {} indices", indices.len());

        let id = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RangeOrBitVec::Range(RowRange::new(0, indices.len())),
            Coerced::NoData => return RangeOrBitVec::empty(),
        };

        // TODO(tracegrid): exploit data[i] <= i to bisect per probe instead
        // of comparing every index.
        let mut builder = BitVecBuilder::new(indices.len());
        index_search_into(&mut builder, self.data, indices.data, |v| compare(op, v, &id));
        RangeOrBitVec::BitVec(builder.build())
    }

    fn ordered_index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange {
        if indices.is_empty() {
            return RowRange::empty();
        }
        // The monotonic indices cover a contiguous storage span; search that
        // span, then map its bounds back to positions in the index list.
        let span = RowRange::new(indices.data[0], indices.data[indices.len() as usize - 1] + 1);
        let res = self.search_validated(op, value, span);
        let hit = match res {
            RangeOrBitVec::Range(r) => r,
            RangeOrBitVec::BitVec(_) => panic!("ordered index search requires a range result"),
        };
        let start = indices.data.partition_point(|&i| i < hit.start) as u32;
        let end = indices.data.partition_point(|&i| i < hit.end) as u32;
        RowRange::new(start, end)
    }

    fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch {
        match value {
            SqlValue::Long(v) if *v >= 0 && *v <= u32::MAX as i64 => {
                single_search_compare(op, &self.data[row as usize], &(*v as u32))
            }
            _ => SingleSearch::NeedsFullSearch,
        }
    }

    fn stable_sort_tokens(&self, tokens: &mut [SortToken], direction: SortDirection) {
        let key = |t: &SortToken| self.data[t.index as usize];
        match direction {
            SortDirection::Ascending => tokens.sort_by_key(key),
            SortDirection::Descending => tokens.sort_by(|a, b| key(b).cmp(&key(a))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::to_index_vec;
    use pretty_assertions::assert_eq;

    const DATA: [u32; 12] = [0, 0, 0, 3, 3, 3, 6, 6, 6, 9, 9, 9];

    #[test]
    fn eq_finds_the_contiguous_run() {
        let storage = SetIdStorage::new(&DATA);
        let range = RowRange::new(0, 12);

        let res = storage.search(FilterOp::Eq, &SqlValue::Long(3), range);
        assert_eq!(res.take_if_range(), RowRange::new(3, 6));
        let res = storage.search(FilterOp::Eq, &SqlValue::Long(9), range);
        assert_eq!(res.take_if_range(), RowRange::new(9, 12));
    }

    #[test]
    fn eq_between_boundaries_is_empty() {
        let storage = SetIdStorage::new(&DATA);
        // 4 is inside the domain but is not a set boundary.
        let res = storage.search(FilterOp::Eq, &SqlValue::Long(4), RowRange::new(0, 12));
        assert_eq!(res.take_if_range().len(), 0);
    }

    #[test]
    fn eq_respects_the_search_range() {
        let data = [0u32, 0, 2, 2, 4, 4, 6, 6];
        let storage = SetIdStorage::new(&data);
        let res = storage.search(FilterOp::Eq, &SqlValue::Long(4), RowRange::new(1, 7));
        assert_eq!(res.take_if_range(), RowRange::new(4, 6));

        // A run truncated by the range end.
        let res = storage.search(FilterOp::Eq, &SqlValue::Long(6), RowRange::new(0, 7));
        assert_eq!(res.take_if_range(), RowRange::new(6, 7));
    }

    #[test]
    fn ordering_operators() {
        let storage = SetIdStorage::new(&DATA);
        let range = RowRange::new(0, 12);

        let res = storage.search(FilterOp::Lt, &SqlValue::Long(6), range);
        assert_eq!(res.take_if_range(), RowRange::new(0, 6));
        let res = storage.search(FilterOp::Le, &SqlValue::Long(6), range);
        assert_eq!(res.take_if_range(), RowRange::new(0, 9));
        let res = storage.search(FilterOp::Gt, &SqlValue::Long(6), range);
        assert_eq!(res.take_if_range(), RowRange::new(9, 12));
        let res = storage.search(FilterOp::Ge, &SqlValue::Long(6), range);
        assert_eq!(res.take_if_range(), RowRange::new(6, 12));
    }

    #[test]
    fn ne_inverts_the_run() {
        let storage = SetIdStorage::new(&DATA);
        let res = storage.search(FilterOp::Ne, &SqlValue::Long(3), RowRange::new(1, 8));
        assert_eq!(to_index_vec(&res), vec![1, 2, 6, 7]);
    }

    #[test]
    fn out_of_domain_values() {
        let storage = SetIdStorage::new(&DATA);
        let range = RowRange::new(0, 12);
        let too_big = SqlValue::Long(u32::MAX as i64 + 1);
        let res = storage.search(FilterOp::Ne, &too_big, range);
        assert_eq!(res.take_if_range(), range);
        assert_eq!(storage.validate(FilterOp::Eq, &too_big), SearchValidation::NoData);
        let res = storage.search(FilterOp::Ge, &SqlValue::Long(-1), range);
        assert_eq!(res.take_if_range(), range);
    }

    #[test]
    fn double_operands_coerce() {
        let storage = SetIdStorage::new(&DATA);
        let range = RowRange::new(0, 12);
        let res = storage.search(FilterOp::Eq, &SqlValue::Double(3.0), range);
        assert_eq!(res.take_if_range(), RowRange::new(3, 6));
        let res = storage.search(FilterOp::Gt, &SqlValue::Double(3.5), range);
        assert_eq!(res.take_if_range(), RowRange::new(6, 12));
    }

    #[test]
    fn index_search_compares_values() {
        let storage = SetIdStorage::new(&DATA);
        let indices = [11u32, 0, 5, 6];
        let res = storage.index_search(
            FilterOp::Ge,
            &SqlValue::Long(6),
            &Indices::nonmonotonic(&indices),
        );
        assert_eq!(to_index_vec(&res), vec![0, 3]);
    }

    #[test]
    fn ordered_index_search_maps_back_to_positions() {
        let storage = SetIdStorage::new(&DATA);
        let indices = [1u32, 3, 5, 7, 9, 11];
        let view = Indices::monotonic(&indices);
        let res = storage.ordered_index_search(FilterOp::Eq, &SqlValue::Long(3), &view);
        assert_eq!(res, RowRange::new(1, 3));
        let res = storage.ordered_index_search(FilterOp::Ge, &SqlValue::Long(9), &view);
        assert_eq!(res, RowRange::new(4, 6));
    }
}
