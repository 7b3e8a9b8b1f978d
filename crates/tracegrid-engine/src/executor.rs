use smallvec::SmallVec;
use tracegrid_columnar::{RowMap, RowRange};

use crate::overlay::Overlay;
use crate::storage::Storage;
use crate::types::{
    Constraint, FilterOp, IndexState, Indices, RangeOrBitVec, SearchValidation, SingleSearch,
    SortDirection, SortToken,
};
use crate::value::SqlValue;

/// Overlay stacks are almost always 0-2 layers deep; keep them inline.
pub const MAX_INLINE_OVERLAYS: usize = 4;

pub type OverlayStack<'a> = SmallVec<[&'a dyn Overlay; MAX_INLINE_OVERLAYS]>;

/// One queryable column: a terminal storage under an ordered stack of
/// overlays. The first overlay is the outermost, i.e. the one whose row
/// space the table exposes.
pub struct Column<'a> {
    pub overlays: OverlayStack<'a>,
    pub storage: &'a dyn Storage,
}

impl<'a> Column<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { overlays: OverlayStack::new(), storage }
    }

    pub fn with_overlays(overlays: OverlayStack<'a>, storage: &'a dyn Storage) -> Self {
        Self { overlays, storage }
    }

    /// Probes one table row against a constraint, translating it through the
    /// overlay stack first.
    pub fn single_search(&self, op: FilterOp, value: &SqlValue, row: u32) -> SingleSearch {
        let mut inner = row;
        for overlay in &self.overlays {
            inner = overlay.to_inner_row(inner);
        }
        self.storage.single_search(op, value, inner)
    }

    /// Stably sorts table row numbers by this column's values.
    pub fn stable_sort_rows(&self, rows: &mut [u32], direction: SortDirection) {
        let mut translated: Vec<u32> = rows.to_vec();
        for overlay in &self.overlays {
            translated = overlay.to_inner_indices(&translated);
        }
        let mut tokens: Vec<SortToken> = translated
            .iter()
            .zip(rows.iter())
            .map(|(&inner, &outer)| SortToken { index: inner, payload: outer })
            .collect();
        self.storage.stable_sort_tokens(&mut tokens, direction);
        for (slot, token) in rows.iter_mut().zip(&tokens) {
            *slot = token.payload;
        }
    }
}

/// Tuning knobs for the bounded-vs-indexed choice.
///
/// A sparse row map touches few rows relative to its span, so walking its
/// explicit indices beats scanning the whole span; the defaults are the
/// crossover observed on real trace tables.
#[derive(Clone, Copy, Debug)]
pub struct FilterConfig {
    /// Row maps at least this large always take the bounded path.
    pub indexed_filter_max_rows: u32,
    /// Density (rows / spanned range) below which the indexed path wins.
    pub indexed_filter_max_density: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { indexed_filter_max_rows: 1024, indexed_filter_max_density: 0.5 }
    }
}

/// Evaluates filter constraints against a fixed list of columns, narrowing a
/// working [`RowMap`] constraint by constraint.
///
/// Constraints are applied in the order given; there is no cross-constraint
/// reordering. The whole computation is synchronous and deterministic over
/// immutable storages, so filtering twice with the same inputs is
/// bit-identical.
pub struct QueryExecutor<'a> {
    columns: Vec<Column<'a>>,
    row_count: u32,
    config: FilterConfig,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(columns: Vec<Column<'a>>, row_count: u32) -> Self {
        Self::with_config(columns, row_count, FilterConfig::default())
    }

    pub fn with_config(columns: Vec<Column<'a>>, row_count: u32, config: FilterConfig) -> Self {
        Self { columns, row_count, config }
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn filter(&self, constraints: &[Constraint]) -> RowMap {
        let mut rm = RowMap::from_range(0, self.row_count);
        for constraint in constraints {
            if rm.is_empty() {
                break;
            }
            let column = &self.columns[constraint.column];
            match column.storage.validate(constraint.op, &constraint.value) {
                SearchValidation::NoData => {
                    log::trace!("constraint on column {} matches nothing", constraint.column);
                    return RowMap::empty();
                }
                SearchValidation::AllData => {
                    log::trace!("constraint on column {} matches everything", constraint.column);
                    continue;
                }
                SearchValidation::Ok => {}
            }
            self.filter_column(constraint, column, &mut rm);
        }
        rm
    }

    fn filter_column(&self, constraint: &Constraint, column: &Column<'a>, rm: &mut RowMap) {
        let first = rm.get(0);
        let last = rm.get(rm.len() - 1);
        let span = (last - first) as f64;

        // Sparse, small row maps are cheaper to walk explicitly than to
        // rescan as a range. Division by a zero span yields +inf and takes
        // the bounded path, which is right for single-row maps.
        let indexed = rm.len() < self.config.indexed_filter_max_rows
            && (rm.len() as f64) / span < self.config.indexed_filter_max_density;
        if indexed {
            *rm = self.indexed_filter(constraint, column, rm);
        } else {
            rm.intersect(&self.bounded_filter(constraint, column, rm));
        }
    }

    /// Range-threaded filtering: the row map's bounding range is pushed down
    /// the overlay stack, the storage searches once, and the result is
    /// translated back out layer by layer.
    pub fn bounded_filter(&self, constraint: &Constraint, column: &Column<'a>, rm: &RowMap) -> RowMap {
        let mut range = RowRange::new(rm.get(0), rm.get(rm.len() - 1) + 1);

        let mut outer_ranges: SmallVec<[RowRange; MAX_INLINE_OVERLAYS]> = SmallVec::new();
        for overlay in &column.overlays {
            outer_ranges.push(range);
            range = overlay.to_inner_range(range);
        }

        let mut result =
            column.storage.search_validated(constraint.op, &constraint.value, range);

        for (overlay, outer) in column.overlays.iter().zip(outer_ranges).rev() {
            result = overlay.to_outer(result, outer);
        }

        match result {
            RangeOrBitVec::Range(r) => RowMap::from_range(r.start, r.end.max(r.start)),
            RangeOrBitVec::BitVec(bv) => RowMap::from_bit_vec(bv),
        }
    }

    /// Index-threaded filtering: the row map is expanded to explicit rows,
    /// translated through each overlay, and evaluated per position.
    pub fn indexed_filter(&self, constraint: &Constraint, column: &Column<'a>, rm: &RowMap) -> RowMap {
        let table_rows: Vec<u32> = rm.iter().collect();

        let mut state = IndexState::Monotonic;
        let mut current = table_rows.clone();
        for overlay in &column.overlays {
            current = overlay.to_inner_indices(&current);
            if !overlay.preserves_order() {
                state = IndexState::Nonmonotonic;
            }
        }

        let result = column.storage.index_search_validated(
            constraint.op,
            &constraint.value,
            &Indices { data: &current, state },
        );

        // The result is in positions-of-`table_rows` space; re-emit the rows
        // that survived. Iteration order is ascending, so the output is too.
        let kept: Vec<u32> = match result {
            RangeOrBitVec::Range(r) => {
                table_rows[r.start as usize..r.end.max(r.start) as usize].to_vec()
            }
            RangeOrBitVec::BitVec(bv) => {
                bv.iter_set_bits().map(|pos| table_rows[pos as usize]).collect()
            }
        };
        RowMap::from_indices(kept)
    }
}
