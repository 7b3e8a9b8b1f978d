#![forbid(unsafe_code)]

use crate::bitvec::BitVec;
use crate::range::RowRange;

/// The set of table rows matching a query, in ascending row order unless the
/// map was built from an explicit index list.
///
/// Backed by one of three representations, preferred in the order
/// range > bitmap > index vector. The range form is a pair of integers no
/// matter how many rows it spans; the bitmap handles holes; the index vector
/// is the only form that can express reordering or duplication.
#[derive(Clone, Debug, PartialEq)]
pub struct RowMap {
    mode: Mode,
}

#[derive(Clone, Debug, PartialEq)]
enum Mode {
    Range(RowRange),
    BitVec(BitVec),
    Indices(Vec<u32>),
}

impl RowMap {
    /// An empty row map.
    pub fn empty() -> Self {
        Self::from_range(0, 0)
    }

    /// All rows in `[start, end)`.
    pub fn from_range(start: u32, end: u32) -> Self {
        Self { mode: Mode::Range(RowRange::new(start, end)) }
    }

    pub fn single_row(row: u32) -> Self {
        Self::from_range(row, row + 1)
    }

    /// Rows at the set-bit positions of `bv`.
    pub fn from_bit_vec(bv: BitVec) -> Self {
        Self { mode: Mode::BitVec(bv) }
    }

    /// Rows given explicitly. The order of `indices` is preserved.
    pub fn from_indices(indices: Vec<u32>) -> Self {
        Self { mode: Mode::Indices(indices) }
    }

    pub fn len(&self) -> u32 {
        match &self.mode {
            Mode::Range(r) => r.len(),
            Mode::BitVec(bv) => bv.count_set_bits(),
            Mode::Indices(v) => v.len() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The row at position `idx`.
    pub fn get(&self, idx: u32) -> u32 {
        debug_assert!(idx < self.len());
        match &self.mode {
            Mode::Range(r) => r.start + idx,
            Mode::BitVec(bv) => bv.index_of_nth_set(idx),
            Mode::Indices(v) => v[idx as usize],
        }
    }

    pub fn contains(&self, row: u32) -> bool {
        match &self.mode {
            Mode::Range(r) => r.contains(row),
            Mode::BitVec(bv) => row < bv.len() && bv.get(row),
            Mode::Indices(v) => v.contains(&row),
        }
    }

    /// The position of the first occurrence of `row`, if present.
    pub fn index_of(&self, row: u32) -> Option<u32> {
        match &self.mode {
            Mode::Range(r) => r.contains(row).then(|| row - r.start),
            Mode::BitVec(bv) => {
                (row < bv.len() && bv.get(row)).then(|| bv.count_set_bits_before(row))
            }
            Mode::Indices(v) => v.iter().position(|&r| r == row).map(|p| p as u32),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        // Boxing keeps the three backing iterators behind one signature; row
        // maps are iterated once per constraint so the indirection is noise.
        let it: Box<dyn Iterator<Item = u32>> = match &self.mode {
            Mode::Range(r) => Box::new(r.start..r.end.max(r.start)),
            Mode::BitVec(bv) => Box::new(bv.iter_set_bits()),
            Mode::Indices(v) => Box::new(v.iter().copied()),
        };
        it
    }

    /// Keeps only the rows also present in `other`, preserving this map's
    /// order.
    pub fn intersect(&mut self, other: &RowMap) {
        match other.len() {
            0 => {
                *self = RowMap::empty();
                return;
            }
            1 => {
                let row = other.get(0);
                *self = if self.contains(row) { RowMap::single_row(row) } else { RowMap::empty() };
                return;
            }
            _ => {}
        }

        match &mut self.mode {
            Mode::Range(r) => {
                let r = *r;
                // Range-range intersection never needs to leave range mode.
                if let Mode::Range(o) = &other.mode {
                    self.mode = Mode::Range(r.intersect(o));
                    return;
                }
                let mut bv = BitVec::filled(r.start, false);
                for row in r.start..r.end.max(r.start) {
                    bv.push(other.contains(row));
                }
                self.mode = Mode::BitVec(bv);
            }
            Mode::BitVec(bv) => {
                let cleared: Vec<u32> =
                    bv.iter_set_bits().filter(|&row| !other.contains(row)).collect();
                for row in cleared {
                    bv.set(row, false);
                }
            }
            Mode::Indices(v) => v.retain(|&row| other.contains(row)),
        }
    }

    /// The rows of `self` at the positions picked by `selector`:
    /// `out[i] = self[selector[i]]`.
    pub fn select_rows(&self, selector: &RowMap) -> RowMap {
        match selector.len() {
            0 => return RowMap::empty(),
            1 => return RowMap::single_row(self.get(selector.get(0))),
            _ => {}
        }
        // Picking a contiguous span out of a range stays a range.
        if let (Mode::Range(r), Mode::Range(s)) = (&self.mode, &selector.mode) {
            debug_assert!(s.end <= r.len());
            return RowMap::from_range(r.start + s.start, r.start + s.end);
        }
        RowMap::from_indices(selector.iter().map(|idx| self.get(idx)).collect())
    }
}
