//! The bit-packed, lane-aligned row store. Each row is a run of 16-byte
//! lanes: lane 0 carries a 32-bit header (a 28-bit group id plus up to 4
//! packed boolean fields) in its first 4 bytes, and every declared column
//! occupies a byte range somewhere after that, never straddling a lane
//! boundary.

use crate::bits::{bytes_for_range, collapses_to_boolean};
use crate::constants::{GROUP_ID_BITS, GROUP_ID_MASK, LANE_BYTES, MAX_BOOLEAN_FIELDS};
use crate::errors::{FtgsError, FtgsResult};
use crate::lane::{prefetch_row, GatherMask, Lane, ZERO_LANE};

/// A column's declared `[min, max]` range, the only input the layout
/// algorithm needs to decide whether it collapses into a boolean bit or
/// gets its own byte range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
  pub min: i64,
  pub max: i64,
}

impl ColumnSpec {
  pub fn new(min: i64, max: i64) -> FtgsResult<Self> {
    if max < min {
      return Err(FtgsError::invalid_argument(format!(
        "column max {} is less than min {}",
        max, min
      )));
    }
    Ok(Self { min, max })
  }

  fn range(&self) -> u64 {
    (self.max - self.min) as u64
  }
}

impl std::fmt::Display for ColumnSpec {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.min, self.max)
  }
}

#[derive(Clone, Debug)]
pub struct PackedTable {
  n_rows: usize,
  n_lanes_per_row: usize,
  n_boolean_cols: usize,
  col_min: Vec<i64>,
  col_max: Vec<i64>,
  // None for boolean columns, which live in the header instead.
  gather_masks: Vec<Option<GatherMask>>,
  // lane index -> integer column indices assigned to that lane, ascending.
  lane_columns: Vec<Vec<usize>>,
  data: Vec<Lane>,
}

impl PackedTable {
  /// Derives a layout from column ranges and allocates a zeroed table.
  ///
  /// Columns are assumed to list any boolean-eligible columns first: once
  /// a column's range needs more than 1 bit, every later column is laid
  /// out as an integer column regardless of its own range, and at most
  /// [`MAX_BOOLEAN_FIELDS`] columns can collapse into the header.
  pub fn new(n_rows: usize, columns: &[ColumnSpec]) -> FtgsResult<Self> {
    let n_cols = columns.len();
    let mut n_boolean_cols = 0usize;
    while n_boolean_cols < n_cols
      && n_boolean_cols < MAX_BOOLEAN_FIELDS
      && collapses_to_boolean(columns[n_boolean_cols].range())
    {
      n_boolean_cols += 1;
    }

    let mut gather_masks = vec![None; n_cols];
    let mut lane_columns: Vec<Vec<usize>> = vec![vec![]];
    let mut lane = 0usize;
    let mut offset = 4usize; // lane 0's first 4 bytes are the header
    for (col, spec) in columns.iter().enumerate().skip(n_boolean_cols) {
      let size = bytes_for_range(spec.range());
      if offset + size > LANE_BYTES {
        lane += 1;
        offset = 0;
        lane_columns.push(vec![]);
      }
      gather_masks[col] = Some(GatherMask {
        lane_idx: lane,
        byte_offset: offset,
        size,
      });
      lane_columns[lane].push(col);
      offset += size;
    }
    let n_lanes_per_row = lane + 1;

    let col_min = columns.iter().map(|c| c.min).collect();
    let col_max = columns.iter().map(|c| c.max).collect();

    Ok(Self {
      n_rows,
      n_lanes_per_row,
      n_boolean_cols,
      col_min,
      col_max,
      gather_masks,
      lane_columns,
      data: vec![ZERO_LANE; n_rows * n_lanes_per_row],
    })
  }

  pub fn n_rows(&self) -> usize {
    self.n_rows
  }

  pub fn n_cols(&self) -> usize {
    self.col_min.len()
  }

  pub fn n_boolean_cols(&self) -> usize {
    self.n_boolean_cols
  }

  pub fn n_lanes_per_row(&self) -> usize {
    self.n_lanes_per_row
  }

  pub fn col_min(&self, col: usize) -> i64 {
    self.col_min[col]
  }

  pub fn col_max(&self, col: usize) -> i64 {
    self.col_max[col]
  }

  /// Integer column indices laid out in each lane, ascending, used by the
  /// unpack pipeline to walk a row lane-by-lane instead of column-by-column.
  pub fn lane_columns(&self) -> &[Vec<usize>] {
    &self.lane_columns
  }

  fn check_row(&self, row: usize) -> FtgsResult<()> {
    if row >= self.n_rows {
      return Err(FtgsError::out_of_range(format!(
        "row {} out of range (table has {} rows)",
        row, self.n_rows
      )));
    }
    Ok(())
  }

  fn check_col(&self, col: usize) -> FtgsResult<()> {
    if col >= self.n_cols() {
      return Err(FtgsError::out_of_range(format!(
        "column {} out of range (table has {} columns)",
        col,
        self.n_cols()
      )));
    }
    Ok(())
  }

  #[inline]
  pub fn row_lanes(&self, row: usize) -> &[Lane] {
    let start = row * self.n_lanes_per_row;
    &self.data[start..start + self.n_lanes_per_row]
  }

  #[inline]
  fn row_lanes_mut(&mut self, row: usize) -> &mut [Lane] {
    let start = row * self.n_lanes_per_row;
    &mut self.data[start..start + self.n_lanes_per_row]
  }

  #[inline]
  fn header(&self, row: usize) -> u32 {
    u32::from_le_bytes(self.row_lanes(row)[0][0..4].try_into().unwrap())
  }

  #[inline]
  fn set_header(&mut self, row: usize, header: u32) {
    self.row_lanes_mut(row)[0][0..4].copy_from_slice(&header.to_le_bytes());
  }

  pub fn get_group(&self, row: usize) -> FtgsResult<u32> {
    self.check_row(row)?;
    Ok(self.header(row) & GROUP_ID_MASK)
  }

  pub fn set_group(&mut self, row: usize, group: u32) -> FtgsResult<()> {
    self.check_row(row)?;
    if group > GROUP_ID_MASK {
      return Err(FtgsError::invalid_argument(format!(
        "group id {} does not fit in {} bits",
        group, GROUP_ID_BITS
      )));
    }
    let header = (self.header(row) & !GROUP_ID_MASK) | group;
    self.set_header(row, header);
    Ok(())
  }

  /// Sets every row's group id to the same value. Grounded in the original
  /// engine's bulk-regroup helper, used when a whole shard is reassigned
  /// to a single group in one step rather than one remap call per doc.
  pub fn set_all_groups(&mut self, group: u32) -> FtgsResult<()> {
    if group > GROUP_ID_MASK {
      return Err(FtgsError::invalid_argument(format!(
        "group id {} does not fit in {} bits",
        group, GROUP_ID_BITS
      )));
    }
    for row in 0..self.n_rows {
      let header = (self.header(row) & !GROUP_ID_MASK) | group;
      self.set_header(row, header);
    }
    Ok(())
  }

  fn boolean_bit(&self, row: usize, col: usize) -> bool {
    (self.header(row) >> (GROUP_ID_BITS + col as u32)) & 1 == 1
  }

  fn set_boolean_bit(&mut self, row: usize, col: usize, bit: bool) {
    let shift = GROUP_ID_BITS + col as u32;
    let mut header = self.header(row);
    if bit {
      header |= 1 << shift;
    } else {
      header &= !(1 << shift);
    }
    self.set_header(row, header);
  }

  pub fn get_cell(&self, row: usize, col: usize) -> FtgsResult<i64> {
    self.check_row(row)?;
    self.check_col(col)?;
    Ok(self.get_cell_unchecked(row, col))
  }

  #[inline]
  pub(crate) fn get_cell_unchecked(&self, row: usize, col: usize) -> i64 {
    let min = self.col_min[col];
    if col < self.n_boolean_cols {
      min + self.boolean_bit(row, col) as i64
    } else {
      let mask = self.gather_masks[col].unwrap();
      min + mask.gather(self.row_lanes(row)) as i64
    }
  }

  pub fn set_cell(&mut self, row: usize, col: usize, value: i64) -> FtgsResult<()> {
    self.check_row(row)?;
    self.check_col(col)?;
    let (min, max) = (self.col_min[col], self.col_max[col]);
    if value < min || value > max {
      return Err(FtgsError::out_of_range(format!(
        "value {} out of column range [{}, {}]",
        value, min, max
      )));
    }
    let biased = (value - min) as u64;
    if col < self.n_boolean_cols {
      self.set_boolean_bit(row, col, biased != 0);
    } else {
      let mask = self.gather_masks[col].unwrap();
      mask.scatter(self.row_lanes_mut(row), biased);
    }
    Ok(())
  }

  /// Issues a best-effort software prefetch for `row`'s lanes.
  pub fn prefetch(&self, row: usize) {
    if row < self.n_rows {
      prefetch_row(self.row_lanes(row));
    }
  }

  /// Reads column `col` for every row in `rows`, writing the results into
  /// the same positions of `dst`. A straightforward loop over
  /// [`get_cell`][Self::get_cell]; `rows` and `dst` may be any two
  /// disjoint slices since each iteration only touches its own index.
  pub fn batch_col_lookup(&self, rows: &[usize], col: usize, dst: &mut [i64]) -> FtgsResult<()> {
    if rows.len() != dst.len() {
      return Err(FtgsError::invalid_argument(format!(
        "batch_col_lookup: {} rows but {} destination slots",
        rows.len(),
        dst.len()
      )));
    }
    for (i, &row) in rows.iter().enumerate() {
      dst[i] = self.get_cell(row, col)?;
    }
    Ok(())
  }

  /// Writes column `col` for every row in `rows` from the matching
  /// position of `values`. A straightforward loop over
  /// [`set_cell`][Self::set_cell].
  pub fn batch_set_col(&mut self, rows: &[usize], col: usize, values: &[i64]) -> FtgsResult<()> {
    if rows.len() != values.len() {
      return Err(FtgsError::invalid_argument(format!(
        "batch_set_col: {} rows but {} values",
        rows.len(),
        values.len()
      )));
    }
    for (&row, &value) in rows.iter().zip(values.iter()) {
      self.set_cell(row, col, value)?;
    }
    Ok(())
  }

  /// Reads the group id of every row in `rows`, writing the results into
  /// the same positions of `dst`.
  pub fn batch_group_lookup(&self, rows: &[usize], dst: &mut [u32]) -> FtgsResult<()> {
    if rows.len() != dst.len() {
      return Err(FtgsError::invalid_argument(format!(
        "batch_group_lookup: {} rows but {} destination slots",
        rows.len(),
        dst.len()
      )));
    }
    for (i, &row) in rows.iter().enumerate() {
      dst[i] = self.get_group(row)?;
    }
    Ok(())
  }

  /// Writes the group id of every row in `rows` from the matching
  /// position of `groups`.
  pub fn batch_set_group(&mut self, rows: &[usize], groups: &[u32]) -> FtgsResult<()> {
    if rows.len() != groups.len() {
      return Err(FtgsError::invalid_argument(format!(
        "batch_set_group: {} rows but {} groups",
        rows.len(),
        groups.len()
      )));
    }
    for (&row, &group) in rows.iter().zip(groups.iter()) {
      self.set_group(row, group)?;
    }
    Ok(())
  }

  /// Writes column `col` for the contiguous row range `[start, start +
  /// values.len())` from `values`, in order. The range variant of
  /// [`batch_set_col`][Self::batch_set_col] for callers that already have
  /// their rows laid out contiguously and don't need to build an index
  /// array.
  pub fn set_col_range(&mut self, start: usize, col: usize, values: &[i64]) -> FtgsResult<()> {
    for (i, &value) in values.iter().enumerate() {
      self.set_cell(start + i, col, value)?;
    }
    Ok(())
  }

  /// Writes the group id for the contiguous row range `[start, start +
  /// groups.len())` from `groups`, in order.
  pub fn set_group_range(&mut self, start: usize, groups: &[u32]) -> FtgsResult<()> {
    for (i, &group) in groups.iter().enumerate() {
      self.set_group(start + i, group)?;
    }
    Ok(())
  }

  /// For every row whose group currently equals `target`, replaces it with
  /// `pos` if `bits[row]` is set, otherwise `neg`. Rows not currently in
  /// `target` are left untouched. Grounded in the original engine's
  /// bit-vector regroup helper, used to split one group into two based on
  /// an externally computed per-doc predicate (e.g. a filter query run
  /// just for this regroup) without a remap table.
  pub fn bit_set_regroup(
    &mut self,
    bits: &[bool],
    target: u32,
    neg: u32,
    pos: u32,
  ) -> FtgsResult<()> {
    if bits.len() != self.n_rows {
      return Err(FtgsError::invalid_argument(format!(
        "bit_set_regroup: {} bits but table has {} rows",
        bits.len(),
        self.n_rows
      )));
    }
    for row in 0..self.n_rows {
      if self.get_group(row)? == target {
        let new_group = if bits[row] { pos } else { neg };
        self.set_group(row, new_group)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spec(min: i64, max: i64) -> ColumnSpec {
    ColumnSpec::new(min, max).unwrap()
  }

  #[test]
  fn test_column_spec_display_round_trips_through_parse() {
    let s = spec(-5, 10);
    assert_eq!(s.to_string(), "-5:10");
  }

  #[test]
  fn test_boolean_collapse_prefix() {
    // first two collapse to booleans, third does not (range 13), fourth
    // would collapse but comes after a non-boolean column so stays an
    // integer column per the prefix rule.
    let table = PackedTable::new(4, &[spec(0, 1), spec(0, 1), spec(0, 13), spec(0, 1)]).unwrap();
    assert_eq!(table.n_boolean_cols(), 2);
    assert_eq!(table.n_cols(), 4);
  }

  #[test]
  fn test_get_set_cell_roundtrip() {
    let mut table = PackedTable::new(8, &[spec(0, 1), spec(-5, 1000), spec(0, 255)]).unwrap();
    for row in 0..8 {
      table.set_cell(row, 0, (row % 2) as i64).unwrap();
      table.set_cell(row, 1, -5 + row as i64).unwrap();
      table.set_cell(row, 2, (row * 17) as i64 % 256).unwrap();
    }
    for row in 0..8 {
      assert_eq!(table.get_cell(row, 0).unwrap(), (row % 2) as i64);
      assert_eq!(table.get_cell(row, 1).unwrap(), -5 + row as i64);
      assert_eq!(table.get_cell(row, 2).unwrap(), (row * 17) as i64 % 256);
    }
  }

  #[test]
  fn test_group_roundtrip() {
    let mut table = PackedTable::new(4, &[spec(0, 1)]).unwrap();
    table.set_group(2, 12345).unwrap();
    assert_eq!(table.get_group(2).unwrap(), 12345);
    // other rows remain 0
    assert_eq!(table.get_group(0).unwrap(), 0);
  }

  #[test]
  fn test_set_group_rejects_oversized_id() {
    let mut table = PackedTable::new(1, &[]).unwrap();
    assert!(table.set_group(0, GROUP_ID_MASK + 1).is_err());
  }

  #[test]
  fn test_set_all_groups() {
    let mut table = PackedTable::new(5, &[spec(0, 1)]).unwrap();
    table.set_all_groups(7).unwrap();
    for row in 0..5 {
      assert_eq!(table.get_group(row).unwrap(), 7);
    }
  }

  #[test]
  fn test_wide_column_spans_multiple_lanes() {
    // four 8-byte columns: first fits in lane 0's remaining 12 bytes (1 col,
    // 4 bytes left over), the rest spill into subsequent lanes.
    let table = PackedTable::new(2, &[spec(0, u32::MAX as i64 * 2), spec(0, i64::MAX)]).unwrap();
    assert!(table.n_lanes_per_row() >= 2);
    let mut t = table;
    t.set_cell(1, 1, 123_456_789_012).unwrap();
    assert_eq!(t.get_cell(1, 1).unwrap(), 123_456_789_012);
  }

  #[test]
  fn test_out_of_range_value_rejected() {
    let mut table = PackedTable::new(1, &[spec(0, 10)]).unwrap();
    assert!(table.set_cell(0, 0, 11).is_err());
    assert!(table.set_cell(0, 0, -1).is_err());
  }

  #[test]
  fn test_negative_min_bias() {
    let mut table = PackedTable::new(1, &[spec(-100, -50)]).unwrap();
    table.set_cell(0, 0, -75).unwrap();
    assert_eq!(table.get_cell(0, 0).unwrap(), -75);
  }

  #[test]
  fn test_batch_col_lookup_and_set() {
    let mut table = PackedTable::new(5, &[spec(0, 1000)]).unwrap();
    table.batch_set_col(&[0, 1, 2, 3, 4], 0, &[10, 20, 30, 40, 50]).unwrap();
    let mut dst = vec![0i64; 5];
    table.batch_col_lookup(&[4, 3, 2, 1, 0], 0, &mut dst).unwrap();
    assert_eq!(dst, vec![50, 40, 30, 20, 10]);
  }

  #[test]
  fn test_batch_group_lookup_and_set() {
    let mut table = PackedTable::new(4, &[]).unwrap();
    table.batch_set_group(&[0, 1, 2, 3], &[7, 8, 9, 10]).unwrap();
    let mut dst = vec![0u32; 4];
    table.batch_group_lookup(&[0, 1, 2, 3], &mut dst).unwrap();
    assert_eq!(dst, vec![7, 8, 9, 10]);
  }

  #[test]
  fn test_batch_length_mismatch_rejected() {
    let mut table = PackedTable::new(4, &[spec(0, 10)]).unwrap();
    assert!(table.batch_set_col(&[0, 1], 0, &[1]).is_err());
    let mut dst = vec![0i64; 1];
    assert!(table.batch_col_lookup(&[0, 1], 0, &mut dst).is_err());
  }

  #[test]
  fn test_col_and_group_range_setters() {
    let mut table = PackedTable::new(5, &[spec(0, 1000)]).unwrap();
    table.set_col_range(1, 0, &[100, 200, 300]).unwrap();
    table.set_group_range(1, &[1, 2, 3]).unwrap();
    assert_eq!(table.get_cell(1, 0).unwrap(), 100);
    assert_eq!(table.get_cell(2, 0).unwrap(), 200);
    assert_eq!(table.get_cell(3, 0).unwrap(), 300);
    assert_eq!(table.get_group(1).unwrap(), 1);
    assert_eq!(table.get_group(2).unwrap(), 2);
    assert_eq!(table.get_group(3).unwrap(), 3);
  }

  #[test]
  fn test_bit_set_regroup() {
    let mut table = PackedTable::new(4, &[spec(0, 1)]).unwrap();
    table.set_all_groups(5).unwrap();
    table.set_group(2, 9).unwrap(); // not in target, should stay put
    let bits = vec![true, false, true, false];
    table.bit_set_regroup(&bits, 5, 100, 200).unwrap();
    assert_eq!(table.get_group(0).unwrap(), 200);
    assert_eq!(table.get_group(1).unwrap(), 100);
    assert_eq!(table.get_group(2).unwrap(), 9);
    assert_eq!(table.get_group(3).unwrap(), 100);
  }
}
