use tracegrid_columnar::{BitVecBuilder, RowRange};

use crate::overlay::Overlay;
use crate::types::RangeOrBitVec;

/// Rearranges an inner row space through an explicit index array: outer row
/// `k` reads inner row `arrangement[k]`.
///
/// The arrangement may duplicate and reorder rows (join-style fan-out), so
/// results generally leave as bitmaps and every duplicate is evaluated
/// independently. An arrangement known to be increasing can declare
/// `orders_storage`, which keeps ordered translation available.
#[derive(Clone, Copy, Debug)]
pub struct ArrangementOverlay<'a> {
    arrangement: &'a [u32],
    orders_storage: bool,
}

impl<'a> ArrangementOverlay<'a> {
    pub fn new(arrangement: &'a [u32]) -> Self {
        Self { arrangement, orders_storage: false }
    }

    /// Declares the arrangement strictly increasing over inner rows. The
    /// claim is validated at table-build time.
    pub fn new_ordering(arrangement: &'a [u32]) -> Self {
        debug_assert!(arrangement.windows(2).all(|w| w[0] < w[1]));
        Self { arrangement, orders_storage: true }
    }
}

impl Overlay for ArrangementOverlay<'_> {
    fn len(&self) -> u32 {
        self.arrangement.len() as u32
    }

    fn preserves_order(&self) -> bool {
        self.orders_storage
    }

    fn to_inner_range(&self, outer: RowRange) -> RowRange {
        debug_assert!(!outer.is_empty() && outer.end <= self.len());
        let span = &self.arrangement[outer.start as usize..outer.end as usize];
        let min = span.iter().min().copied().unwrap_or(0);
        let max = span.iter().max().copied().unwrap_or(0);
        RowRange::new(min, max + 1)
    }

    fn to_outer(&self, inner: RangeOrBitVec, outer: RowRange) -> RangeOrBitVec {
        let mut builder = BitVecBuilder::with_prefix_zeros(outer.end, outer.start);
        match inner {
            RangeOrBitVec::Range(r) => {
                for &inner_row in &self.arrangement[outer.start as usize..outer.end as usize] {
                    builder.append(r.contains(inner_row));
                }
            }
            RangeOrBitVec::BitVec(bv) => {
                for &inner_row in &self.arrangement[outer.start as usize..outer.end as usize] {
                    builder.append(inner_row < bv.len() && bv.get(inner_row));
                }
            }
        }
        RangeOrBitVec::BitVec(builder.build())
    }

    fn to_inner_indices(&self, indices: &[u32]) -> Vec<u32> {
        indices.iter().map(|&i| self.arrangement[i as usize]).collect()
    }

    fn to_inner_indices_ordered(&self, indices: &[u32]) -> Vec<u32> {
        if !self.orders_storage {
            panic!("ordered index translation requires an arrangement that orders storage");
        }
        self.to_inner_indices(indices)
    }

    fn to_inner_row(&self, row: u32) -> u32 {
        self.arrangement[row as usize]
    }
}
