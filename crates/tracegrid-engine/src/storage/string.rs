use tracegrid_columnar::{BitVecBuilder, RowRange, StringId, StringPool};

use crate::glob::GlobMatcher;
use crate::storage::{index_search_into, linear_search_into, Storage};
use crate::types::{
    FilterOp, Indices, RangeOrBitVec, SearchValidation, SingleSearch, SortDirection, SortToken,
};
use crate::value::SqlValue;

/// A column of interned string handles, with the pool alongside for byte
/// comparison.
///
/// Equality never touches string bytes: interning is canonical, so comparing
/// ids is enough. Ordering operators compare bytes through the pool unless
/// the column is sorted, in which case they binary search. Null is the
/// sentinel id, excluded from every predicate except `IsNull`.
#[derive(Debug, Clone, Copy)]
pub struct StringStorage<'a> {
    pool: &'a StringPool,
    data: &'a [StringId],
    is_sorted: bool,
}

impl<'a> StringStorage<'a> {
    pub fn new(pool: &'a StringPool, data: &'a [StringId]) -> Self {
        Self { pool, data, is_sorted: false }
    }

    pub fn new_sorted(pool: &'a StringPool, data: &'a [StringId]) -> Self {
        Self { pool, data, is_sorted: true }
    }

    fn lower_bound(&self, val: &str, range: RowRange) -> u32 {
        let slice = &self.data[range.start as usize..range.end as usize];
        let pred = |id: &StringId| !id.is_null() && self.pool.get(*id) < val;
        range.start + slice.partition_point(pred) as u32
    }

    fn upper_bound(&self, val: &str, range: RowRange) -> u32 {
        let slice = &self.data[range.start as usize..range.end as usize];
        let pred = |id: &StringId| id.is_null() || self.pool.get(*id) <= val;
        range.start + slice.partition_point(pred) as u32
    }

    fn binary_search_intrinsic(&self, op: FilterOp, val: &str, range: RowRange) -> RowRange {
        match op {
            FilterOp::Eq => RowRange::new(self.lower_bound(val, range), self.upper_bound(val, range)),
            FilterOp::Le => RowRange::new(range.start, self.upper_bound(val, range)),
            FilterOp::Lt => RowRange::new(range.start, self.lower_bound(val, range)),
            FilterOp::Ge => RowRange::new(self.lower_bound(val, range), range.end),
            FilterOp::Gt => RowRange::new(self.upper_bound(val, range), range.end),
            _ => panic!("invalid filter operation for a binary search"),
        }
    }

    /// Builds the per-row predicate for ops that cannot use id equality.
    /// Null ids never match any of these.
    fn byte_predicate<'v>(&'v self, op: FilterOp, val: &'v str) -> impl Fn(&StringId) -> bool + 'v {
        move |id: &StringId| {
            if id.is_null() {
                return false;
            }
            let s = self.pool.get(*id);
            match op {
                FilterOp::Lt => s < val,
                FilterOp::Le => s <= val,
                FilterOp::Gt => s > val,
                FilterOp::Ge => s >= val,
                _ => unreachable!("byte comparison covers ordering ops only"),
            }
        }
    }

    fn scan<F: Fn(&StringId) -> bool>(&self, range: RowRange, pred: F) -> RangeOrBitVec {
        let mut builder = BitVecBuilder::with_prefix_zeros(range.end, range.start);
        let slice = &self.data[range.start as usize..range.end as usize];
        linear_search_into(&mut builder, slice, pred);
        RangeOrBitVec::BitVec(builder.build())
    }

    fn scan_indices<F: Fn(&StringId) -> bool>(&self, indices: &Indices<'_>, pred: F) -> RangeOrBitVec {
        let mut builder = BitVecBuilder::new(indices.len());
        index_search_into(&mut builder, self.data, indices.data, pred);
        RangeOrBitVec::BitVec(builder.build())
    }

    /// Dispatches a search at either a range or an index list. All the
    /// operator-specific logic lives here once; the two entry points only
    /// differ in how they walk positions.
    fn search_internal(
        &self,
        op: FilterOp,
        value: &SqlValue,
        range: Option<RowRange>,
        indices: Option<&Indices<'_>>,
    ) -> RangeOrBitVec {
        let run = |pred: &dyn Fn(&StringId) -> bool| match (range, indices) {
            (Some(r), None) => self.scan(r, pred),
            (None, Some(ix)) => self.scan_indices(ix, pred),
            _ => unreachable!(),
        };

        match op {
            FilterOp::IsNull => run(&|id: &StringId| id.is_null()),
            FilterOp::IsNotNull => run(&|id: &StringId| !id.is_null()),
            FilterOp::Eq => {
                let target = self.pool.get_id(value.as_str());
                run(&|id: &StringId| Some(*id) == target)
            }
            FilterOp::Ne => {
                // A value absent from the pool differs from every non-null row.
                let target = self.pool.get_id(value.as_str());
                run(&|id: &StringId| !id.is_null() && Some(*id) != target)
            }
            FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {
                run(&self.byte_predicate(op, value.as_str()))
            }
            FilterOp::Glob => {
                let matcher = GlobMatcher::new(value.as_str());
                if let Some(literal) = matcher.as_literal() {
                    let target = self.pool.get_id(&literal);
                    return run(&|id: &StringId| Some(*id) == target);
                }
                run(&|id: &StringId| !id.is_null() && matcher.matches(self.pool.get(*id)))
            }
            FilterOp::Regex => match regex::Regex::new(value.as_str()) {
                Ok(re) => run(&|id: &StringId| !id.is_null() && re.is_match(self.pool.get(*id))),
                // A malformed pattern matches nothing rather than erroring.
                Err(_) => run(&|_: &StringId| false),
            },
        }
    }
}

impl Storage for StringStorage<'_> {
    fn len(&self) -> u32 {
        self.data.len() as u32
    }

    fn validate(&self, op: FilterOp, value: &SqlValue) -> SearchValidation {
        // Null tests ignore the operand entirely.
        if matches!(op, FilterOp::IsNull | FilterOp::IsNotNull) {
            return SearchValidation::Ok;
        }
        match value {
            SqlValue::String(_) => SearchValidation::Ok,
            SqlValue::Null => {
                debug_assert!(false, "NULL is only comparable with IS NULL / IS NOT NULL");
                SearchValidation::NoData
            }
            SqlValue::Long(_) | SqlValue::Double(_) => {
                // Any string is greater than any numeric.
                if matches!(op, FilterOp::Gt | FilterOp::Ge) {
                    SearchValidation::AllData
                } else {
                    SearchValidation::NoData
                }
            }
            SqlValue::Bytes(_) => SearchValidation::NoData,
        }
    }

    fn search_validated(&self, op: FilterOp, value: &SqlValue, range: RowRange) -> RangeOrBitVec {
        debug_assert!(range.end <= self.len());
        log::trace!("StringStorage::search {op:?} over [{}, {})", range.start, range.end);

        if self.is_sorted {
            match op {
                FilterOp::Eq | FilterOp::Ge | FilterOp::Gt | FilterOp::Le | FilterOp::Lt => {
                    return RangeOrBitVec::Range(
                        self.binary_search_intrinsic(op, value.as_str(), range),
                    );
                }
                FilterOp::Ne => {
                    let eq = self.binary_search_intrinsic(FilterOp::Eq, value.as_str(), range);
                    let mut builder = BitVecBuilder::with_prefix_zeros(range.end, range.start);
                    for row in range.start..range.end {
                        builder.append(!eq.contains(row));
                    }
                    return RangeOrBitVec::BitVec(builder.build());
                }
                // Pattern and null ops cannot use sortedness.
                _ => {}
            }
        }
        self.search_internal(op, value, Some(range), None)
    }

    fn index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RangeOrBitVec {
        log::trace!("StringStorage::index_search {op:?} over {} indices", indices.len());
        self.search_internal(op, value, None, Some(indices))
    }

    fn ordered_index_search_validated(
        &self,
        op: FilterOp,
        value: &SqlValue,
        indices: &Indices<'_>,
    ) -> RowRange {
        let nulls_first = |i: &u32| self.data[*i as usize].is_null();
        match op {
            // Nulls sort to the front of an ordered view.
            FilterOp::IsNull => {
                RowRange::new(0, indices.data.partition_point(nulls_first) as u32)
            }
            FilterOp::IsNotNull => {
                RowRange::new(indices.data.partition_point(nulls_first) as u32, indices.len())
            }
            FilterOp::Eq | FilterOp::Le | FilterOp::Lt | FilterOp::Ge | FilterOp::Gt => {
                let val = value.as_str();
                let lower = || {
                    indices.data.partition_point(|&i| {
                        let id = self.data[i as usize];
                        !id.is_null() && self.pool.get(id) < val
                    }) as u32
                };
                let upper = || {
                    indices.data.partition_point(|&i| {
                        let id = self.data[i as usize];
                        id.is_null() || self.pool.get(id) <= val
                    }) as u32
                };
                match op {
                    FilterOp::Eq => RowRange::new(lower(), upper()),
                    FilterOp::Le => RowRange::new(0, upper()),
                    FilterOp::Lt => RowRange::new(0, lower()),
                    FilterOp::Ge => RowRange::new(lower(), indices.len()),
                    FilterOp::Gt => RowRange::new(upper(), indices.len()),
                    _ => unreachable!(),
                }
            }
            FilterOp::Ne | FilterOp::Glob | FilterOp::Regex => {
                panic!("operation not supported by ordered index search")
            }
        }
    }

    fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch {
        let id = self.data[row as usize];
        match op {
            FilterOp::IsNull => {
                return if id.is_null() { SingleSearch::Match } else { SingleSearch::NoMatch }
            }
            FilterOp::IsNotNull => {
                return if id.is_null() { SingleSearch::NoMatch } else { SingleSearch::Match }
            }
            _ => {}
        }
        if !matches!(value, SqlValue::String(_)) {
            return SingleSearch::NeedsFullSearch;
        }
        let val = value.as_str();
        let matched = match op {
            FilterOp::Eq => self.pool.get_id(val).is_some_and(|t| t == id),
            FilterOp::Ne => !id.is_null() && self.pool.get_id(val) != Some(id),
            FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {
                self.byte_predicate(op, val)(&id)
            }
            FilterOp::Glob => !id.is_null() && GlobMatcher::new(val).matches(self.pool.get(id)),
            FilterOp::Regex => match regex::Regex::new(val) {
                Ok(re) => !id.is_null() && re.is_match(self.pool.get(id)),
                Err(_) => false,
            },
            FilterOp::IsNull | FilterOp::IsNotNull => unreachable!(),
        };
        if matched {
            SingleSearch::Match
        } else {
            SingleSearch::NoMatch
        }
    }

    fn stable_sort_tokens(&self, tokens: &mut [SortToken], direction: SortDirection) {
        // The null sentinel reads as the empty string and sorts first.
        let key = |t: &SortToken| self.pool.get(self.data[t.index as usize]);
        match direction {
            SortDirection::Ascending => tokens.sort_by(|a, b| key(a).cmp(key(b))),
            SortDirection::Descending => tokens.sort_by(|a, b| key(b).cmp(key(a))),
        }
    }
}
