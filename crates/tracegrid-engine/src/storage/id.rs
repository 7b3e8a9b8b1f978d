use tracegrid_columnar::{BitVecBuilder, RowRange};

use crate::storage::{
    int_column_with_double, linear_search_into, single_search_compare, validate_numeric, Coerced,
    NumericDomain, Storage,
};
use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

/// A column whose rows are their own values: row `i` holds value `i`.
///
/// Nothing is materialized; every comparison reduces to arithmetic range
/// intersection, except `Ne` which has to punch a hole and therefore
/// produces a bitmap.
#[derive(Debug, Clone, Copy)]
pub struct IdStorage {
    row_count: u32,
}

impl IdStorage {
    pub fn new(row_count: u32) -> Self {
        Self { row_count }
    }

    fn binary_search_intrinsic(op: FilterOp, val: u32, range: RowRange) -> RowRange {
        match op {
            FilterOp::Eq => {
                let hit = range.contains(val) as u32;
                RowRange::new(val, val + hit)
            }
            FilterOp::Le => RowRange::new(range.start, range.end.min(val.saturating_add(1))),
            FilterOp::Lt => RowRange::new(range.start, range.end.min(val)),
            FilterOp::Ge => RowRange::new(range.start.max(val), range.end),
            FilterOp::Gt => RowRange::new(range.start.max(val.saturating_add(1)), range.end),
            _ => panic!("invalid filter operation for an id column"),
        }
    }

    /// Resolves the double-typed operand cases, returning the effective u32
    /// operand or the early result.
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

impl Storage for IdStorage {
    fn len(&self) -> u32 {
        self.row_count
    }

    fn validate(&self, op: FilterOp, value: &SqlValue) -> SearchValidation {
        validate_numeric(
            op,
            value,
            NumericDomain { min: Some(0.0), max: Some(u32::MAX as f64) },
        )
    }

    fn search_validated(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec {
        debug_assert!(range.end <= self.row_count);
        log::trace!("IdStorage::search {op:?} over [{}, {})", range.start, range.end);

        let val = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RangeOrBitVec::Range(range),
            Coerced::NoData => return RangeOrBitVec::empty(),
        };

        if op == FilterOp::Ne {
            // Every row in the range except the one equal to the operand.
            let mut builder = BitVecBuilder::with_prefix_zeros(range.end, range.start);
            for row in range.start..range.end {
                builder.append(row != val);
            }
            return RangeOrBitVec::BitVec(builder.build());
        }
        RangeOrBitVec::Range(Self::binary_search_intrinsic(op, val, range))
    }

    fn index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec {
        log::trace!("IdStorage::index_search {op:?} over {} indices", indices.len());

        let val = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RangeOrBitVec::Range(RowRange::new(0, indices.len())),
            Coerced::NoData => return RangeOrBitVec::empty(),
        };

        let mut builder = BitVecBuilder::new(indices.len());
        // The indices are the values; compare them in place.
        linear_search_into(&mut builder, indices.data, |&row| super::compare(op, &row, &val));
        RangeOrBitVec::BitVec(builder.build())
    }

    fn ordered_index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange {
        debug_assert!(op != FilterOp::Ne);
        if indices.is_empty() {
            return RowRange::empty();
        }

        let val = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RowRange::new(0, indices.len()),
            Coerced::NoData => return RowRange::empty(),
        };

        // The monotonic indices span a contiguous id range; binary search that
        // range, then locate its bounds back inside the index list.
        let span = RowRange::new(indices.data[0], indices.data[indices.len() as usize - 1] + 1);
        let hit = Self::binary_search_intrinsic(op, val, span);

        let start = indices.data.partition_point(|&i| i < hit.start) as u32;
        let end = indices.data.partition_point(|&i| i < hit.end) as u32;
        RowRange::new(start, end)
    }

    fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch {
        match value {
            SqlValue::Long(v) if *v >= 0 && *v <= u32::MAX as i64 => {
                single_search_compare(op, &row, &(*v as u32))
            }
            // Doubles and out-of-range longs need the coercion machinery.
            _ => SingleSearch::NeedsFullSearch,
        }
    }

    fn stable_sort_tokens(&self, tokens: &mut [SortToken], direction: SortDirection) {
        match direction {
            SortDirection::Ascending => tokens.sort_by_key(|t| t.index),
            SortDirection::Descending => tokens.sort_by_key(|t| std::cmp::Reverse(t.index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::to_index_vec;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_is_arithmetic_range_intersection() {
        let storage = IdStorage::new(100);
        let range = RowRange::new(30, 70);

        let res = storage.search(FilterOp::Gt, &SqlValue::Long(40), range);
        assert_eq!(res.take_if_range(), RowRange::new(41, 70));

        let res = storage.search(FilterOp::Ge, &SqlValue::Long(40), range);
        assert_eq!(res.take_if_range(), RowRange::new(40, 70));

        let res = storage.search(FilterOp::Lt, &SqlValue::Long(40), range);
        assert_eq!(res.take_if_range(), RowRange::new(30, 40));

        let res = storage.search(FilterOp::Le, &SqlValue::Long(40), range);
        assert_eq!(res.take_if_range(), RowRange::new(30, 41));
    }

    #[test]
    fn eq_inside_range_is_single_row() {
        let storage = IdStorage::new(100);
        let res = storage.search(FilterOp::Eq, &SqlValue::Long(45), RowRange::new(30, 70));
        let r = res.take_if_range();
        assert_eq!((r.start, r.len()), (45, 1));

        // At or past the range end the hit disappears.
        let res = storage.search(FilterOp::Eq, &SqlValue::Long(70), RowRange::new(30, 70));
        assert_eq!(res.take_if_range().len(), 0);
    }

    #[test]
    fn ne_materializes_a_punctured_bitmap() {
        let storage = IdStorage::new(10);
        let res = storage.search(FilterOp::Ne, &SqlValue::Long(5), RowRange::new(3, 8));
        assert_eq!(to_index_vec(&res), vec![3, 4, 6, 7]);
    }

    #[test]
    fn out_of_domain_values_resolve_in_validation() {
        let storage = IdStorage::new(10);
        let too_big = SqlValue::Long(u32::MAX as i64 + 10);
        let range = RowRange::new(0, 10);

        assert_eq!(storage.validate(FilterOp::Eq, &too_big), SearchValidation::NoData);
        let res = storage.search(FilterOp::Le, &too_big, range);
        assert_eq!(res.take_if_range(), range);
        let res = storage.search(FilterOp::Ne, &too_big, range);
        assert_eq!(res.take_if_range(), range);

        let negative = SqlValue::Long(-5);
        let res = storage.search(FilterOp::Ge, &negative, range);
        assert_eq!(res.take_if_range(), range);
        let res = storage.search(FilterOp::Gt, &negative, range);
        assert_eq!(res.take_if_range(), range);
        assert_eq!(storage.validate(FilterOp::Eq, &negative), SearchValidation::NoData);
    }

    #[test]
    fn double_operands_coerce() {
        let storage = IdStorage::new(10);
        let range = RowRange::new(0, 10);

        let res = storage.search(FilterOp::Eq, &SqlValue::Double(5.0), range);
        assert_eq!(to_index_vec(&res), vec![5]);
        let res = storage.search(FilterOp::Eq, &SqlValue::Double(5.5), range);
        assert_eq!(to_index_vec(&res), Vec::<u32>::new());
        let res = storage.search(FilterOp::Ge, &SqlValue::Double(5.5), range);
        assert_eq!(res.take_if_range(), RowRange::new(6, 10));
        let res = storage.search(FilterOp::Le, &SqlValue::Double(5.5), range);
        assert_eq!(res.take_if_range(), RowRange::new(0, 6));
    }

    #[test]
    fn index_search_compares_positions() {
        let storage = IdStorage::new(10);
        let indices = [7u32, 1, 3, 9, 3];
        let res = storage.index_search(
            FilterOp::Ge,
            &SqlValue::Long(3),
            &Indices::nonmonotonic(&indices),
        );
        assert_eq!(to_index_vec(&res), vec![0, 2, 3, 4]);
    }

    #[test]
    fn is_null_family() {
        let storage = IdStorage::new(5);
        assert_eq!(storage.validate(FilterOp::IsNull, &SqlValue::Long(0)), SearchValidation::NoData);
        assert_eq!(
            storage.validate(FilterOp::IsNotNull, &SqlValue::Long(0)),
            SearchValidation::AllData
        );
        assert_eq!(storage.validate(FilterOp::IsNotNull, &SqlValue::Null), SearchValidation::AllData);
    }

    #[test]
    fn ordered_index_search_narrows_monotonic_views() {
        let storage = IdStorage::new(100);
        let indices = [10u32, 20, 30, 40, 50];
        let view = Indices::monotonic(&indices);

        let res = storage.ordered_index_search(FilterOp::Ge, &SqlValue::Long(30), &view);
        assert_eq!(res, RowRange::new(2, 5));
        let res = storage.ordered_index_search(FilterOp::Eq, &SqlValue::Long(30), &view);
        assert_eq!(res, RowRange::new(2, 3));
        let res = storage.ordered_index_search(FilterOp::Eq, &SqlValue::Long(35), &view);
        assert_eq!(res.len(), 0);
    }

    #[test]
    fn sort_is_identity_order() {
        let storage = IdStorage::new(10);
        let mut rows = [5u32, 1, 9, 0];
        storage.stable_sort_rows(&mut rows, SortDirection::Ascending);
        assert_eq!(rows, [0, 1, 5, 9]);
        storage.stable_sort_rows(&mut rows, SortDirection::Descending);
        assert_eq!(rows, [9, 5, 1, 0]);
    }
}
