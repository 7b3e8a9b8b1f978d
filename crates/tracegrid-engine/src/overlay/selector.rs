use tracegrid_columnar::{BitVec, BitVecBuilder, RowRange};

use crate::overlay::Overlay;
use crate::types::RangeOrBitVec;

/// Exposes the set-bit positions of a selector bitmap as a dense outer row
/// space: outer row `k` is the `k`-th set bit of the selector.
///
/// Translation is rank/select over the bitmap in both directions, so results
/// that arrive as ranges leave as ranges; relative order always survives.
#[derive(Clone, Copy, Debug)]
pub struct SelectorOverlay<'a> {
    selector: &'a BitVec,
}

impl<'a> SelectorOverlay<'a> {
    pub fn new(selector: &'a BitVec) -> Self {
        Self { selector }
    }
}

impl Overlay for SelectorOverlay<'_> {
    fn len(&self) -> u32 {
        self.selector.count_set_bits()
    }

    fn preserves_order(&self) -> bool {
        true
    }

    fn to_inner_range(&self, outer: RowRange) -> RowRange {
        debug_assert!(!outer.is_empty() && outer.end <= self.len());
        RowRange::new(
            self.selector.index_of_nth_set(outer.start),
            self.selector.index_of_nth_set(outer.end - 1) + 1,
        )
    }

    fn to_outer(&self, inner: RangeOrBitVec, outer: RowRange) -> RangeOrBitVec {
        match inner {
            // Contiguity survives subsetting: the matching outer rows are the
            // ranks of the inner bounds.
            RangeOrBitVec::Range(r) => RangeOrBitVec::Range(RowRange::new(
                self.selector.count_set_bits_before(r.start),
                self.selector.count_set_bits_before(r.end.min(self.selector.len())),
            )),
            RangeOrBitVec::BitVec(bv) => {
                let mut builder = BitVecBuilder::new(outer.end);
                for outer_row in 0..outer.end {
                    let inner_row = self.selector.index_of_nth_set(outer_row);
                    builder.append(inner_row < bv.len() && bv.get(inner_row));
                }
                RangeOrBitVec::BitVec(builder.build())
            }
        }
    }

    fn to_inner_indices(&self, indices: &[u32]) -> Vec<u32> {
        indices.iter().map(|&i| self.selector.index_of_nth_set(i)).collect()
    }

    fn to_inner_indices_ordered(&self, indices: &[u32]) -> Vec<u32> {
        // Select is monotonic, so ordered inputs stay ordered.
        self.to_inner_indices(indices)
    }

    fn to_inner_row(&self, row: u32) -> u32 {
        self.selector.index_of_nth_set(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::to_index_vec;
    use pretty_assertions::assert_eq;

    fn selector(bits: &[u8]) -> BitVec {
        bits.iter().map(|&b| b != 0).collect()
    }

    #[test]
    fn inner_range_covers_the_selected_rows() {
        let bv = selector(&[0, 0, 0, 1, 1, 0, 1, 1, 0, 0, 1]);
        let overlay = SelectorOverlay::new(&bv);
        assert_eq!(overlay.len(), 5);
        // Outer rows 1..4 are the 2nd..4th set bits: inner 4, 6, 7.
        assert_eq!(overlay.to_inner_range(RowRange::new(1, 4)), RowRange::new(4, 8));
    }

    #[test]
    fn range_results_stay_ranges() {
        let bv = selector(&[0, 0, 0, 1, 1, 0, 1, 1, 0, 0, 1]);
        let overlay = SelectorOverlay::new(&bv);
        // An all-match over inner [4, 8) translates to outer rows 1..4.
        let res = overlay.to_outer(
            RangeOrBitVec::Range(RowRange::new(4, 8)),
            RowRange::new(1, 4),
        );
        assert_eq!(res.take_if_range(), RowRange::new(1, 4));
    }

    #[test]
    fn bitmap_results_reselect() {
        let bv = selector(&[0, 1, 1, 0, 0, 1, 1, 0]);
        let overlay = SelectorOverlay::new(&bv);
        let inner: BitVec = [false, true, false, true, false, true, false, false].into();
        let res = overlay.to_outer(RangeOrBitVec::BitVec(inner), RowRange::new(0, 4));
        // Selected inner rows are 1, 2, 5, 6; of those, 1 and 5 are set.
        assert_eq!(to_index_vec(&res), vec![0, 2]);
    }

    #[test]
    fn empty_inner_result_translates_to_empty() {
        let bv = selector(&[0, 1, 1, 0, 1]);
        let overlay = SelectorOverlay::new(&bv);
        let res = overlay.to_outer(RangeOrBitVec::empty(), RowRange::new(0, 3));
        assert_eq!(res.take_if_range().len(), 0);
    }

    #[test]
    fn index_translation_selects_set_bits() {
        let bv = selector(&[0, 1, 1, 0, 0, 1, 1, 0]);
        let overlay = SelectorOverlay::new(&bv);
        assert_eq!(overlay.to_inner_indices(&[1, 0, 3]), vec![2, 1, 6]);
        assert_eq!(overlay.to_inner_indices_ordered(&[0, 1, 3]), vec![1, 2, 6]);
        assert!(overlay.preserves_order());
        assert_eq!(overlay.to_inner_row(2), 5);
    }
}
