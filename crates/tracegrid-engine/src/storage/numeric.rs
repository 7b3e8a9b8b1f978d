use tracegrid_columnar::{BitVecBuilder, RowRange};

use crate::storage::{
    compare, double_column_with_int, index_search_into, int_column_with_double,
    linear_search_into, single_search_compare, validate_numeric, Coerced, NumericDomain, Storage,
};
use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

/// A numeric encoding a column can be stored as.
pub trait NumericNative: Copy + PartialOrd + std::fmt::Debug + 'static {
    /// Domain bounds for validation; `None` means the whole SQL numeric
    /// domain fits.
    fn domain() -> NumericDomain;

    /// Narrows an operand the validation and coercion steps have already
    /// cleared for this encoding.
    fn from_coerced(value: &SqlValue) -> Self;

    /// True when the operand's SQL type matches this encoding exactly, i.e.
    /// no cross-type adjustment is needed.
    fn type_matches(value: &SqlValue) -> bool;
}

impl NumericNative for u32 {
    fn domain() -> NumericDomain {
        NumericDomain { min: Some(0.0), max: Some(u32::MAX as f64) }
    }
    fn from_coerced(value: &SqlValue) -> Self {
        value.as_long() as u32
    }
    fn type_matches(value: &SqlValue) -> bool {
        matches!(value, SqlValue::Long(_))
    }
}

impl NumericNative for i32 {
    fn domain() -> NumericDomain {
        NumericDomain { min: Some(i32::MIN as f64), max: Some(i32::MAX as f64) }
    }
    fn from_coerced(value: &SqlValue) -> Self {
        value.as_long() as i32
    }
    fn type_matches(value: &SqlValue) -> bool {
        matches!(value, SqlValue::Long(_))
    }
}

impl NumericNative for i64 {
    fn domain() -> NumericDomain {
        NumericDomain { min: None, max: None }
    }
    fn from_coerced(value: &SqlValue) -> Self {
        value.as_long()
    }
    fn type_matches(value: &SqlValue) -> bool {
        matches!(value, SqlValue::Long(_))
    }
}

impl NumericNative for f64 {
    fn domain() -> NumericDomain {
        NumericDomain { min: None, max: None }
    }
    fn from_coerced(value: &SqlValue) -> Self {
        value.as_double()
    }
    fn type_matches(value: &SqlValue) -> bool {
        matches!(value, SqlValue::Double(_))
    }
}

/// A flat numeric column, optionally known to be sorted ascending.
///
/// Sorted data answers every comparison except `Ne` with a binary search;
/// `Ne` inverts the `Eq` run into a bitmap. Unsorted data always linear
/// scans.
#[derive(Debug, Clone, Copy)]
pub struct NumericStorage<'a, T> {
    data: &'a [T],
    is_sorted: bool,
}

impl<'a, T: NumericNative> NumericStorage<'a, T> {
    pub fn new(data: &'a [T]) -> Self {
        Self { data, is_sorted: false }
    }

    /// Declares the backing data sorted ascending. The claim is the caller's
    /// responsibility; it is validated at table-build time, not here.
    pub fn new_sorted(data: &'a [T]) -> Self {
        Self { data, is_sorted: true }
    }

    /// Resolves cross-type operands to the native encoding, or an early
    /// verdict when no row can (or every row must) match.
    fn coerce(op: FilterOp, value: &SqlValue) -> Coerced<SqlValue> {
        match value {
            SqlValue::Double(d) if !is_double_column::<T>() => {
                match int_column_with_double(op, *d) {
                    Coerced::Value(v) => Coerced::Value(SqlValue::Long(v)),
                    Coerced::AllData => Coerced::AllData,
                    Coerced::NoData => Coerced::NoData,
                }
            }
            SqlValue::Long(l) if is_double_column::<T>() => {
                match double_column_with_int(op, *l) {
                    Coerced::Value(v) => Coerced::Value(SqlValue::Double(v)),
                    Coerced::AllData => Coerced::AllData,
                    Coerced::NoData => Coerced::NoData,
                }
            }
            other => Coerced::Value(other.clone()),
        }
    }

    fn lower_bound(&self, val: &T, range: RowRange) -> u32 {
        let slice = &self.data[range.start as usize..range.end as usize];
        range.start + slice.partition_point(|v| v < val) as u32
    }

    fn upper_bound(&self, val: &T, range: RowRange) -> u32 {
        let slice = &self.data[range.start as usize..range.end as usize];
        range.start + slice.partition_point(|v| v <= val) as u32
    }

    fn binary_search_intrinsic(&self, op: FilterOp, val: &T, range: RowRange) -> RowRange {
        match op {
            FilterOp::Eq => RowRange::new(self.lower_bound(val, range), self.upper_bound(val, range)),
            FilterOp::Le => RowRange::new(range.start, self.upper_bound(val, range)),
            FilterOp::Lt => RowRange::new(range.start, self.lower_bound(val, range)),
            FilterOp::Ge => RowRange::new(self.lower_bound(val, range), range.end),
            FilterOp::Gt => RowRange::new(self.upper_bound(val, range), range.end),
            _ => panic!("invalid filter operation for a binary search"),
        }
    }
}

/// Whether `T` is the double encoding (the only cross-family coercion axis).
fn is_double_column<T: NumericNative>() -> bool {
    std::any::TypeId::of::<T>() == std::any::TypeId::of::<f64>()
}

impl<T: NumericNative> Storage for NumericStorage<'_, T> {
    fn len(&self) -> u32 {
        self.data.len() as u32
    }

    fn validate(&self, op: FilterOp, value: &SqlValue) -> SearchValidation {
        validate_numeric(op, value, T::domain())
    }

    fn search_validated(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec {
        debug_assert!(range.end <= self.len());
        log::trace!("NumericStorage::search {op:?} over [{}, {})", range.start, range.end);

        let value = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RangeOrBitVec::Range(range),
            Coerced::NoData => return RangeOrBitVec::empty(),
        };
        let val = T::from_coerced(&value);

        if self.is_sorted {
            if op != FilterOp::Ne {
                return RangeOrBitVec::Range(self.binary_search_intrinsic(op, &val, range));
            }
            // Not-equal on sorted data is the complement of the equal run.
            let eq = self.binary_search_intrinsic(FilterOp::Eq, &val, range);
            let mut builder = BitVecBuilder::with_prefix_zeros(range.end, range.start);
            for row in range.start..range.end {
                builder.append(!eq.contains(row));
            }
            return RangeOrBitVec::BitVec(builder.build());
        }

        let mut builder = BitVecBuilder::with_prefix_zeros(range.end, range.start);
        let slice = &self.data[range.start as usize..range.end as usize];
        linear_search_into(&mut builder, slice, |v| compare(op, v, &val));
        RangeOrBitVec::BitVec(builder.build())
    }

    fn index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec {
        debug_assert!(indices.data.iter().all(|&i| i < self.len()));
        log::trace!("NumericStorage::index_search {op:?} over {} indices", indices.len());

        let value = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RangeOrBitVec::Range(RowRange::new(0, indices.len())),
            Coerced::NoData => return RangeOrBitVec::empty(),
        };
        let val = T::from_coerced(&value);

        let mut builder = BitVecBuilder::new(indices.len());
        index_search_into(&mut builder, self.data, indices.data, |v| compare(op, v, &val));
        RangeOrBitVec::BitVec(builder.build())
    }

    fn ordered_index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange {
        let value = match Self::coerce(op, value) {
            Coerced::Value(v) => v,
            Coerced::AllData => return RowRange::new(0, indices.len()),
            Coerced::NoData => return RowRange::empty(),
        };
        let val = T::from_coerced(&value);

        let lower = || indices.data.partition_point(|&i| self.data[i as usize] < val) as u32;
        let upper = || indices.data.partition_point(|&i| self.data[i as usize] <= val) as u32;
        match op {
            FilterOp::Eq => RowRange::new(lower(), upper()),
            FilterOp::Le => RowRange::new(0, upper()),
            FilterOp::Lt => RowRange::new(0, lower()),
            FilterOp::Ge => RowRange::new(lower(), indices.len()),
            FilterOp::Gt => RowRange::new(upper(), indices.len()),
            _ => panic!("invalid filter operation for an ordered index search"),
        }
    }

    fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch {
        // Cross-type operands and out-of-domain values need the full coercion
        // machinery; punt rather than duplicate it per row.
        if !T::type_matches(value) || !matches!(self.validate(op, value), SearchValidation::Ok) {
            return SingleSearch::NeedsFullSearch;
        }
        single_search_compare(op, &self.data[row as usize], &T::from_coerced(value))
    }

    fn stable_sort_tokens(&self, tokens: &mut [SortToken], direction: SortDirection) {
        let key = |t: &SortToken| self.data[t.index as usize];
        match direction {
            SortDirection::Ascending => {
                tokens.sort_by(|a, b| key(a).partial_cmp(&key(b)).expect("unordered value"))
            }
            SortDirection::Descending => {
                tokens.sort_by(|a, b| key(b).partial_cmp(&key(a)).expect("unordered value"))
            }
        }
    }
}
