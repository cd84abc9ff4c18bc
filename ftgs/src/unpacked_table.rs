//! The group-indexed accumulator: one `i64` row per group, laid out so
//! that a pair of columns sharing a packed lane also share an accumulator
//! lane, keeping the unpack step's write pattern simple to follow.

use crate::bit_tree::BitTree;
use crate::errors::{FtgsError, FtgsResult};
use crate::packed_table::PackedTable;

/// The part of an `UnpackedTable`'s shape that is fixed by a `PackedTable`
/// and doesn't change as the number of groups grows: how many `i64` slots
/// a row needs and which slot each column lands in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableLayout {
  n_cols: usize,
  n_boolean_cols: usize,
  col_offset: Vec<usize>,
  row_words: usize,
}

impl TableLayout {
  /// Derives the accumulator layout from a `PackedTable`'s column layout.
  /// Boolean column `j` gets slot `j`; each packed lane's integer columns
  /// get consecutive slots starting at a fresh even slot boundary, so a
  /// lane with an odd column count leaves one slot padded with zero.
  pub fn from_packed(packed: &PackedTable) -> Self {
    let n_cols = packed.n_cols();
    let n_boolean_cols = packed.n_boolean_cols();
    let mut col_offset = vec![0usize; n_cols];
    for j in 0..n_boolean_cols {
      col_offset[j] = j;
    }
    let mut slot = 2 * n_boolean_cols.div_ceil(2);
    for lane in packed.lane_columns() {
      let base = slot;
      for (i, &col) in lane.iter().enumerate() {
        col_offset[col] = base + i;
      }
      slot = base + 2 * lane.len().div_ceil(2);
    }
    Self {
      n_cols,
      n_boolean_cols,
      col_offset,
      row_words: slot,
    }
  }

  pub fn n_cols(&self) -> usize {
    self.n_cols
  }

  pub fn n_boolean_cols(&self) -> usize {
    self.n_boolean_cols
  }

  pub fn col_offset(&self, col: usize) -> usize {
    self.col_offset[col]
  }

  pub fn row_words(&self) -> usize {
    self.row_words
  }
}

#[derive(Clone, Debug)]
pub struct UnpackedTable {
  layout: TableLayout,
  n_groups: usize,
  data: Vec<i64>,
  non_zero_rows: BitTree,
}

impl UnpackedTable {
  pub fn create(layout: TableLayout, n_groups: usize) -> Self {
    let row_words = layout.row_words();
    Self {
      layout,
      n_groups,
      data: vec![0i64; n_groups * row_words],
      non_zero_rows: BitTree::new(n_groups),
    }
  }

  /// Builds a fresh accumulator sharing this one's layout but sized for
  /// `n_groups` groups, e.g. when starting a new pass over a differently
  /// sized group space with the same packed columns.
  pub fn copy_layout(&self, n_groups: usize) -> Self {
    Self::create(self.layout.clone(), n_groups)
  }

  pub fn layout(&self) -> &TableLayout {
    &self.layout
  }

  pub fn n_groups(&self) -> usize {
    self.n_groups
  }

  pub fn row_words(&self) -> usize {
    self.layout.row_words()
  }

  fn check_group(&self, group: usize) -> FtgsResult<()> {
    if group >= self.n_groups {
      return Err(FtgsError::out_of_range(format!(
        "group {} out of range ({} groups)",
        group, self.n_groups
      )));
    }
    Ok(())
  }

  pub fn row(&self, group: usize) -> FtgsResult<&[i64]> {
    self.check_group(group)?;
    Ok(self.row_unchecked(group))
  }

  #[inline]
  pub(crate) fn row_unchecked(&self, group: usize) -> &[i64] {
    let words = self.row_words();
    let start = group * words;
    &self.data[start..start + words]
  }

  #[inline]
  fn row_mut_unchecked(&mut self, group: usize) -> &mut [i64] {
    let words = self.row_words();
    let start = group * words;
    &mut self.data[start..start + words]
  }

  pub fn get(&self, group: usize, col: usize) -> FtgsResult<i64> {
    self.check_group(group)?;
    if col >= self.layout.n_cols() {
      return Err(FtgsError::out_of_range(format!(
        "column {} out of range ({} columns)",
        col,
        self.layout.n_cols()
      )));
    }
    Ok(self.row_unchecked(group)[self.layout.col_offset(col)])
  }

  /// Adds a staged row's `i64` contributions into `group`'s accumulator
  /// row, one slot at a time, and marks the group touched.
  pub fn add_row(&mut self, group: usize, staged: &[i64]) -> FtgsResult<()> {
    self.check_group(group)?;
    self.add_row_unchecked(group, staged);
    Ok(())
  }

  #[inline]
  pub(crate) fn add_row_unchecked(&mut self, group: usize, staged: &[i64]) {
    let row = self.row_mut_unchecked(group);
    for (slot, delta) in row.iter_mut().zip(staged.iter()) {
      *slot += delta;
    }
    self.non_zero_rows.mark(group);
  }

  /// Zeroes every accumulator row and clears the touched-group bitmap,
  /// without changing the group count or layout.
  pub fn reset(&mut self) {
    self.data.iter_mut().for_each(|v| *v = 0);
    self.non_zero_rows.clear();
  }

  /// Grows the accumulator to cover at least `n_groups` groups, zeroing
  /// the newly added rows and preserving the existing ones. Shrinking is
  /// not supported.
  pub fn ensure_groups(&mut self, n_groups: usize) {
    if n_groups <= self.n_groups {
      return;
    }
    let words = self.row_words();
    self.data.resize(n_groups * words, 0);
    self.non_zero_rows.grow(n_groups);
    self.n_groups = n_groups;
  }

  /// Group ids touched by at least one `add_row` call since the last
  /// `reset`, in ascending order.
  pub fn touched_groups(&self) -> impl Iterator<Item = usize> + '_ {
    self.non_zero_rows.iter_marked()
  }
}
