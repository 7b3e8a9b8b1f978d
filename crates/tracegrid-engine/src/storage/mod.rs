//! Terminal, value-bearing column layers.
//!
//! Every storage answers predicate queries against its native encoding
//! through the same contract: a cheap [`Storage::validate`] pre-check, a
//! bounded [`Storage::search`] over a contiguous range in the storage's own
//! order, and an [`Storage::index_search`] over arbitrary (possibly
//! overlay-translated) positions. The validated entry points split exactly
//! like that: `search`/`index_search` run validation and short-circuit,
//! the `*_validated` methods assume it already happened.

mod id;
mod null;
mod numeric;
mod set_id;
mod string;

#[cfg(test)]
pub(crate) mod fake;

pub use id::IdStorage;
pub use null::NullStorage;
pub use numeric::NumericStorage;
pub use set_id::SetIdStorage;
pub use string::StringStorage;

use tracegrid_columnar::{BitVecBuilder, RowRange, BITS_IN_WORD};

use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

pub trait Storage {
    /// Number of rows.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cheap pre-check: catches type mismatches, out-of-domain numerics and
    /// unsupported operations without touching the data.
    fn validate(&self, op: FilterOp, value: &SqlValue) -> SearchValidation;

    /// Bounded search over `[range.start, range.end)` in storage order.
    /// Assumes [`Storage::validate`] returned [`SearchValidation::Ok`].
    ///
    /// The result holds positions in the storage's row space: a returned
    /// range is a subrange of the input, a returned bitmap is exactly
    /// `range.end` bits with nothing set outside the input range.
    fn search_validated(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec;

    /// Search at the given positions. The result is in positions-of-`indices`
    /// space: a returned bitmap is exactly `indices.len()` bits.
    fn index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec;

    /// Binary search through a monotonic index view. The returned range is in
    /// positions-of-`indices` space.
    ///
    /// Never valid for `Ne` (inherently non-contiguous; run `Eq` and invert)
    /// nor `Glob`/`Regex`. Calling it with those is a programmer error.
    fn ordered_index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange;

    /// Probes whether a single row matches without a full search.
    fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch;

    /// Stably reorders `tokens` so their `index` fields are in value order.
    /// Payloads travel with their tokens and are never inspected.
    fn stable_sort_tokens(&self, tokens: &mut [SortToken], direction: SortDirection);

    /// Validating wrapper around [`Storage::search_validated`].
    fn search(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec {
        match self.validate(op, value) {
            SearchValidation::AllData => RangeOrBitVec::Range(range),
            SearchValidation::NoData => RangeOrBitVec::empty(),
            SearchValidation::Ok => self.search_validated(op, value, range),
        }
    }

    /// Validating wrapper around [`Storage::index_search_validated`].
    fn index_search(&self, op: FilterOp, value: &SqlValue, indices: &Indices<'_>) -> RangeOrBitVec {
        match self.validate(op, value) {
            SearchValidation::AllData => RangeOrBitVec::Range(RowRange::new(0, indices.len())),
            SearchValidation::NoData => RangeOrBitVec::empty(),
            SearchValidation::Ok => self.index_search_validated(op, value, indices),
        }
    }

    /// Validating wrapper around [`Storage::ordered_index_search_validated`].
    fn ordered_index_search(&self, op: FilterOp, value: &SqlValue, indices: &Indices<'_>) -> RowRange {
        match self.validate(op, value) {
            SearchValidation::AllData => RowRange::new(0, indices.len()),
            SearchValidation::NoData => RowRange::empty(),
            SearchValidation::Ok => self.ordered_index_search_validated(op, value, indices),
        }
    }

    /// Stably sorts a plain array of row numbers by this column's values.
    fn stable_sort_rows(&self, rows: &mut [u32], direction: SortDirection) {
        let mut tokens: Vec<SortToken> =
            rows.iter().map(|&r| SortToken { index: r, payload: r }).collect();
        self.stable_sort_tokens(&mut tokens, direction);
        for (slot, token) in rows.iter_mut().zip(&tokens) {
            *slot = token.payload;
        }
    }

    /// Like [`Storage::stable_sort_rows`] without the stability guarantee.
    /// Storages with a cheaper unstable path may override.
    fn sort_rows(&self, rows: &mut [u32], direction: SortDirection) {
        self.stable_sort_rows(rows, direction);
    }
}

/// True when `left <op> right` holds for an already-coerced operand pair.
pub(crate) fn compare<T: PartialOrd>(op: FilterOp, left: &T, right: &T) -> bool {
    match op {
        FilterOp::Eq => left == right,
        FilterOp::Ne => left != right,
        FilterOp::Lt => left < right,
        FilterOp::Le => left <= right,
        FilterOp::Gt => left > right,
        FilterOp::Ge => left >= right,
        FilterOp::IsNull | FilterOp::IsNotNull | FilterOp::Glob | FilterOp::Regex => {
            panic!("non-comparison op reached a comparison scan")
        }
    }
}

pub(crate) fn single_search_compare<T: PartialOrd>(op: FilterOp, left: &T, right: &T) -> SingleSearch {
    let matched = match op {
        FilterOp::IsNotNull => true,
        FilterOp::IsNull | FilterOp::Glob | FilterOp::Regex => false,
        _ => compare(op, left, right),
    };
    if matched {
        SingleSearch::Match
    } else {
        SingleSearch::NoMatch
    }
}

/// Appends `pred(data[i])` for every position in the builder's remaining
/// capacity, packing complete words at a time.
///
/// Word packing is what the compiler can vectorize, so the loop is staged:
/// single bits until word-aligned, then whole words, then the tail.
pub(crate) fn linear_search_into<T>(
    builder: &mut BitVecBuilder,
    data: &[T],
    pred: impl Fn(&T) -> bool,
) {
    let mut i = 0usize;

    let front = builder.bits_until_word_boundary_or_full();
    for _ in 0..front {
        builder.append(pred(&data[i]));
        i += 1;
    }

    let full = builder.bits_in_complete_words_until_full();
    let mut done = 0;
    while done < full {
        let mut word = 0u64;
        for k in 0..BITS_IN_WORD as usize {
            word |= (pred(&data[i + k]) as u64) << k;
        }
        builder.append_word(word);
        i += BITS_IN_WORD as usize;
        done += BITS_IN_WORD;
    }

    let back = builder.bits_until_full();
    for _ in 0..back {
        builder.append(pred(&data[i]));
        i += 1;
    }
}

/// Appends `pred(data[indices[i]])` for every index, packing words like
/// [`linear_search_into`].
pub(crate) fn index_search_into<T>(
    builder: &mut BitVecBuilder,
    data: &[T],
    indices: &[u32],
    pred: impl Fn(&T) -> bool,
) {
    let mut i = 0usize;

    let front = builder.bits_until_word_boundary_or_full();
    for _ in 0..front {
        builder.append(pred(&data[indices[i] as usize]));
        i += 1;
    }

    let full = builder.bits_in_complete_words_until_full();
    let mut done = 0;
    while done < full {
        let mut word = 0u64;
        for k in 0..BITS_IN_WORD as usize {
            word |= (pred(&data[indices[i + k] as usize]) as u64) << k;
        }
        builder.append_word(word);
        i += BITS_IN_WORD as usize;
        done += BITS_IN_WORD;
    }

    let back = builder.bits_until_full();
    for _ in 0..back {
        builder.append(pred(&data[indices[i] as usize]));
        i += 1;
    }
}

/// Outcome of coercing a cross-typed comparison operand.
pub(crate) enum Coerced<T> {
    Value(T),
    AllData,
    NoData,
}

/// Adjusts a double operand for comparison against an integer column.
///
/// An integral double compares directly. A fractional one can never be equal
/// to an integer, and the ordering operators shift to the enclosing integer
/// (`x <= 2.5` over integers is `x <= 2`, `x >= 2.5` is `x >= 3`).
pub(crate) fn int_column_with_double(op: FilterOp, value: f64) -> Coerced<i64> {
    if (value as i64) as f64 == value {
        return Coerced::Value(value as i64);
    }
    match op {
        FilterOp::Eq => Coerced::NoData,
        FilterOp::Ne => Coerced::AllData,
        FilterOp::Le | FilterOp::Gt => Coerced::Value(value.floor() as i64),
        FilterOp::Lt | FilterOp::Ge => Coerced::Value(value.ceil() as i64),
        _ => panic!("invalid operation for a numeric comparison"),
    }
}

/// Adjusts an integer operand for comparison against a double column.
///
/// Longs that survive the round trip through double compare directly; the
/// rest nudge to the nearest representable double on the correct side.
pub(crate) fn double_column_with_int(op: FilterOp, value: i64) -> Coerced<f64> {
    let as_double = value as f64;
    if as_double as i64 == value {
        return Coerced::Value(as_double);
    }
    match op {
        FilterOp::Eq => Coerced::NoData,
        FilterOp::Ne => Coerced::AllData,
        FilterOp::Le | FilterOp::Gt => Coerced::Value(libm::nextafter(as_double, f64::NEG_INFINITY)),
        FilterOp::Lt | FilterOp::Ge => Coerced::Value(libm::nextafter(as_double, f64::INFINITY)),
        _ => panic!("invalid operation for a numeric comparison"),
    }
}

/// Domain bounds of a numeric encoding, for validation.
pub(crate) struct NumericDomain {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// The validation steps shared by every numeric-valued storage: null
/// handling, operation support, type ordering against strings/bytes, and
/// domain bounds.
pub(crate) fn validate_numeric(
    op: FilterOp,
    value: &SqlValue,
    domain: NumericDomain,
) -> SearchValidation {
    if value.is_null() {
        return match op {
            FilterOp::IsNotNull => SearchValidation::AllData,
            FilterOp::IsNull => SearchValidation::NoData,
            _ => {
                debug_assert!(false, "NULL is only comparable with IS NULL / IS NOT NULL");
                SearchValidation::NoData
            }
        };
    }

    match op {
        FilterOp::Eq | FilterOp::Ne | FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {}
        // These storages hold no nulls.
        FilterOp::IsNull => return SearchValidation::NoData,
        FilterOp::IsNotNull => return SearchValidation::AllData,
        FilterOp::Glob | FilterOp::Regex => return SearchValidation::NoData,
    }

    match value {
        SqlValue::Long(_) | SqlValue::Double(_) => {}
        SqlValue::String(_) => {
            // Any string is greater than any numeric.
            return if matches!(op, FilterOp::Lt | FilterOp::Le) {
                SearchValidation::AllData
            } else {
                SearchValidation::NoData
            };
        }
        SqlValue::Bytes(_) => return SearchValidation::NoData,
        SqlValue::Null => unreachable!(),
    }

    let num = value.numeric_as_double();
    if let Some(max) = domain.max {
        if num > max {
            return if matches!(op, FilterOp::Lt | FilterOp::Le | FilterOp::Ne) {
                SearchValidation::AllData
            } else {
                SearchValidation::NoData
            };
        }
    }
    if let Some(min) = domain.min {
        if num < min {
            return if matches!(op, FilterOp::Gt | FilterOp::Ge | FilterOp::Ne) {
                SearchValidation::AllData
            } else {
                SearchValidation::NoData
            };
        }
    }

    SearchValidation::Ok
}

/// Collects a result into explicit positions; test helper shared by the
/// storage and overlay unit tests.
#[cfg(test)]
pub(crate) fn to_index_vec(result: &RangeOrBitVec) -> Vec<u32> {
    match result {
        RangeOrBitVec::Range(r) => (r.start..r.end.max(r.start)).collect(),
        RangeOrBitVec::BitVec(bv) => bv.iter_set_bits().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegrid_columnar::BitVecBuilder;

    #[test]
    fn linear_search_word_path_matches_naive() {
        let data: Vec<i64> = (0..150).map(|i| i % 7).collect();
        let mut builder = BitVecBuilder::new(data.len() as u32);
        linear_search_into(&mut builder, &data, |&v| v >= 4);
        let got: Vec<u32> = builder.build().iter_set_bits().collect();
        let want: Vec<u32> =
            (0..data.len() as u32).filter(|&i| data[i as usize] >= 4).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn index_search_reads_through_indices() {
        let data: Vec<i64> = vec![5, 1, 4, 2, 3];
        let indices: Vec<u32> = vec![4, 0, 1, 0];
        let mut builder = BitVecBuilder::new(indices.len() as u32);
        index_search_into(&mut builder, &data, &indices, |&v| v >= 3);
        let got: Vec<u32> = builder.build().iter_set_bits().collect();
        assert_eq!(got, vec![0, 1, 3]);
    }

    #[test]
    fn int_column_with_double_shifts_bounds() {
        assert!(matches!(int_column_with_double(FilterOp::Eq, 2.5), Coerced::NoData));
        assert!(matches!(int_column_with_double(FilterOp::Ne, 2.5), Coerced::AllData));
        assert!(matches!(int_column_with_double(FilterOp::Le, 2.5), Coerced::Value(2)));
        assert!(matches!(int_column_with_double(FilterOp::Gt, 2.5), Coerced::Value(2)));
        assert!(matches!(int_column_with_double(FilterOp::Lt, 2.5), Coerced::Value(3)));
        assert!(matches!(int_column_with_double(FilterOp::Ge, 2.5), Coerced::Value(3)));
        assert!(matches!(int_column_with_double(FilterOp::Eq, 3.0), Coerced::Value(3)));
    }

    #[test]
    fn double_column_with_int_nudges_unrepresentable() {
        // 2^53 + 1 does not survive the round trip through f64.
        let v = (1i64 << 53) + 1;
        let exact = 1i64 << 53;
        assert!(matches!(double_column_with_int(FilterOp::Eq, v), Coerced::NoData));
        assert!(matches!(double_column_with_int(FilterOp::Ne, v), Coerced::AllData));
        match double_column_with_int(FilterOp::Ge, v) {
            Coerced::Value(d) => assert!(d > exact as f64),
            _ => panic!("expected a coerced value"),
        }
        match double_column_with_int(FilterOp::Le, v) {
            Coerced::Value(d) => assert!(d < exact as f64),
            _ => panic!("expected a coerced value"),
        }
        assert!(matches!(double_column_with_int(FilterOp::Eq, 7), Coerced::Value(_)));
    }

    #[test]
    fn validate_numeric_bounds() {
        let dom = || NumericDomain { min: Some(0.0), max: Some(u32::MAX as f64) };
        let too_big = SqlValue::Long(u32::MAX as i64 + 1);
        assert_eq!(validate_numeric(FilterOp::Eq, &too_big, dom()), SearchValidation::NoData);
        assert_eq!(validate_numeric(FilterOp::Ne, &too_big, dom()), SearchValidation::AllData);
        assert_eq!(validate_numeric(FilterOp::Le, &too_big, dom()), SearchValidation::AllData);

        let negative = SqlValue::Long(-1);
        assert_eq!(validate_numeric(FilterOp::Ge, &negative, dom()), SearchValidation::AllData);
        assert_eq!(validate_numeric(FilterOp::Eq, &negative, dom()), SearchValidation::NoData);
        assert_eq!(validate_numeric(FilterOp::Lt, &negative, dom()), SearchValidation::NoData);
    }

    #[test]
    fn validate_numeric_type_mismatches() {
        let dom = || NumericDomain { min: None, max: None };
        let s = SqlValue::string("z");
        assert_eq!(validate_numeric(FilterOp::Lt, &s, dom()), SearchValidation::AllData);
        assert_eq!(validate_numeric(FilterOp::Gt, &s, dom()), SearchValidation::NoData);
        assert_eq!(validate_numeric(FilterOp::Glob, &s, dom()), SearchValidation::NoData);
        let b = SqlValue::Bytes(vec![1u8].into());
        assert_eq!(validate_numeric(FilterOp::Eq, &b, dom()), SearchValidation::NoData);
    }
}
