//! The streaming unpack/accumulate sweep that turns a chunk of doc ids
//! into contributions against an `UnpackedTable`. Unpacking and
//! accumulating are split into two passes over the same chunk connected
//! by a [`StagingBuffer`] ring, so the accumulate sweep's dependent reads
//! never wait on an unpack that hasn't had time to prefetch yet.

use crate::config::BoundsMode;
use crate::constants::PREFETCH_LANE_BATCH;
use crate::errors::{FtgsError, FtgsResult};
use crate::packed_table::PackedTable;
use crate::staging::StagingBuffer;
use crate::unpacked_table::{TableLayout, UnpackedTable};

/// Unpacks one packed row's columns into `dest` (a staging row, or any
/// `i64` buffer following `layout`). Boolean columns are read straight out
/// of the header; integer columns are walked lane by lane, issuing a
/// prefetch for `prefetch_row` every [`PREFETCH_LANE_BATCH`] lanes so the
/// load stays ahead of the dependent byte extraction. Every column is
/// written at `layout.col_offset(col)`, not at its raw column index, since
/// boolean and per-lane padding can shift a column's accumulator slot.
pub fn unpack_row(
  packed: &PackedTable,
  src_row: usize,
  prefetch_row: usize,
  dest: &mut [i64],
  layout: &TableLayout,
) {
  for col in 0..packed.n_boolean_cols() {
    dest[layout.col_offset(col)] = packed.get_cell_unchecked(src_row, col);
  }

  if packed.n_cols() == packed.n_boolean_cols() {
    packed.prefetch(prefetch_row);
    return;
  }

  let lane_columns = packed.lane_columns();
  let n_lanes = lane_columns.len();
  let mut lane_idx = 0;
  while lane_idx + PREFETCH_LANE_BATCH <= n_lanes {
    for lane in &lane_columns[lane_idx..lane_idx + PREFETCH_LANE_BATCH] {
      for &col in lane {
        dest[layout.col_offset(col)] = packed.get_cell_unchecked(src_row, col);
      }
    }
    packed.prefetch(prefetch_row);
    lane_idx += PREFETCH_LANE_BATCH;
  }
  if lane_idx < n_lanes {
    packed.prefetch(prefetch_row);
  }
  for lane in &lane_columns[lane_idx..n_lanes] {
    for &col in lane {
      dest[layout.col_offset(col)] = packed.get_cell_unchecked(src_row, col);
    }
  }
}

/// Runs one TGS pass over a chunk of doc ids already decoded into `doc_ids`.
///
/// `doc_ids` is processed in windows no larger than `staging`'s ring
/// capacity: each window unpacks its rows into the ring (prefetching the
/// row `rows_prefetch / 2` ahead) and then sweeps again adding each staged
/// row into its group's accumulator row, before the next window reuses any
/// ring slot. A single window never writes a slot twice, so no staged row
/// is overwritten before it has been accumulated — this is what lets
/// `doc_ids` be arbitrarily longer than the ring itself.
///
/// `doc_ids` must all be valid row ids in `packed`; under
/// [`BoundsMode::Checked`] (the default) this is verified up front and an
/// out-of-range id fails the whole call before any row is touched.
pub fn run_tgs_pass(
  packed: &PackedTable,
  accum: &mut UnpackedTable,
  doc_ids: &[u32],
  staging: &mut StagingBuffer,
  bounds_mode: BoundsMode,
) -> FtgsResult<()> {
  if doc_ids.is_empty() {
    return Ok(());
  }
  if bounds_mode.checks_enabled() {
    for &doc_id in doc_ids {
      if doc_id as usize >= packed.n_rows() {
        return Err(FtgsError::out_of_range(format!(
          "doc id {} out of range ({} rows)",
          doc_id,
          packed.n_rows()
        )));
      }
    }
  }

  let layout = accum.layout().clone();
  let window_size = staging.capacity().max(1);

  for window in doc_ids.chunks(window_size) {
    run_tgs_window(packed, accum, window, staging, &layout, bounds_mode)?;
  }

  Ok(())
}

/// Unpacks and accumulates one window of doc ids, at most `staging`'s ring
/// capacity long, so every slot in `staging` is written by this window at
/// most once before being drained by the accumulate sweep below.
fn run_tgs_window(
  packed: &PackedTable,
  accum: &mut UnpackedTable,
  doc_ids: &[u32],
  staging: &mut StagingBuffer,
  layout: &TableLayout,
  bounds_mode: BoundsMode,
) -> FtgsResult<()> {
  let count = doc_ids.len();
  let half_prefetch = staging.capacity() / 2;
  let mut groups = vec![0u32; count];

  for i in 0..count {
    let row = doc_ids[i] as usize;
    let prefetch_i = (i + half_prefetch).min(count - 1);
    let prefetch_row = doc_ids[prefetch_i] as usize;
    let slot = staging.slot_for(i);
    unpack_row(packed, row, prefetch_row, staging.slot_mut(slot), layout);
    groups[i] = packed.get_group(row).unwrap_or(0);
  }

  if bounds_mode.checks_enabled() {
    for &group in &groups {
      if group as usize >= accum.n_groups() {
        return Err(FtgsError::out_of_range(format!(
          "group {} out of range ({} groups)",
          group,
          accum.n_groups()
        )));
      }
    }
  }

  for i in 0..count {
    let slot = staging.slot_for(i);
    let group = groups[i] as usize;
    let staged = staging.slot(slot);
    accum.add_row_unchecked(group, staged);
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::packed_table::ColumnSpec;
  use crate::unpacked_table::TableLayout;

  fn spec(min: i64, max: i64) -> ColumnSpec {
    ColumnSpec::new(min, max).unwrap()
  }

  #[test]
  fn test_unpack_row_reads_booleans_and_ints() {
    let mut packed = PackedTable::new(2, &[spec(0, 1), spec(10, 20), spec(0, 300)]).unwrap();
    packed.set_cell(0, 0, 1).unwrap();
    packed.set_cell(0, 1, 15).unwrap();
    packed.set_cell(0, 2, 290).unwrap();

    let layout = TableLayout::from_packed(&packed);
    let mut dest = vec![0i64; layout.row_words()];
    unpack_row(&packed, 0, 1, &mut dest, &layout);
    assert_eq!(dest[layout.col_offset(0)], 1);
    assert_eq!(dest[layout.col_offset(1)], 15);
    assert_eq!(dest[layout.col_offset(2)], 290);
  }

  /// A single boolean column means `col_offset(1) == 2`, not `1`: the raw
  /// column index and the accumulator slot diverge, so a row store that
  /// wrote at the raw index would silently zero every integer sum.
  #[test]
  fn test_unpack_row_odd_boolean_count_uses_col_offset_not_raw_index() {
    let mut packed = PackedTable::new(1, &[spec(0, 1), spec(10, 20)]).unwrap();
    packed.set_cell(0, 0, 1).unwrap();
    packed.set_cell(0, 1, 17).unwrap();

    let layout = TableLayout::from_packed(&packed);
    assert_ne!(layout.col_offset(1), 1, "test setup must exercise col_offset != col");

    let mut dest = vec![0i64; layout.row_words()];
    unpack_row(&packed, 0, 0, &mut dest, &layout);
    assert_eq!(dest[layout.col_offset(0)], 1);
    assert_eq!(dest[layout.col_offset(1)], 17);
  }

  #[test]
  fn test_run_tgs_pass_sums_by_group() {
    let n_docs = 32;
    let mut packed = PackedTable::new(n_docs, &[spec(0, 13)]).unwrap();
    for doc in 0..n_docs {
      packed.set_group(doc, (doc % 4) as u32).unwrap();
      packed.set_cell(doc, 0, 13).unwrap();
    }
    let layout = TableLayout::from_packed(&packed);
    let mut accum = UnpackedTable::create(layout.clone(), 4);
    let mut staging = StagingBuffer::new(&layout, 32).unwrap();
    let doc_ids: Vec<u32> = (0..n_docs as u32).collect();

    run_tgs_pass(&packed, &mut accum, &doc_ids, &mut staging, BoundsMode::Checked).unwrap();

    for group in 0..4 {
      // 32 docs split evenly across 4 groups, 8 docs each, value 13 each.
      assert_eq!(accum.get(group, 0).unwrap(), 8 * 13);
    }
    assert_eq!(accum.touched_groups().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
  }

  #[test]
  fn test_run_tgs_pass_respects_nonzero_min() {
    let n_docs = 4;
    let mut packed = PackedTable::new(n_docs, &[spec(100, 110)]).unwrap();
    for doc in 0..n_docs {
      packed.set_group(doc, 0).unwrap();
      packed.set_cell(doc, 0, 105).unwrap();
    }
    let layout = TableLayout::from_packed(&packed);
    let mut accum = UnpackedTable::create(layout.clone(), 1);
    let mut staging = StagingBuffer::new(&layout, 8).unwrap();
    let doc_ids: Vec<u32> = (0..n_docs as u32).collect();
    run_tgs_pass(&packed, &mut accum, &doc_ids, &mut staging, BoundsMode::Checked).unwrap();
    // real-value sum, not biased: 4 docs * 105, not 4 * (105 - 100).
    assert_eq!(accum.get(0, 0).unwrap(), 420);
  }

  #[test]
  fn test_run_tgs_pass_rejects_out_of_range_doc_id() {
    let packed = PackedTable::new(2, &[spec(0, 10)]).unwrap();
    let layout = TableLayout::from_packed(&packed);
    let mut accum = UnpackedTable::create(layout.clone(), 1);
    let mut staging = StagingBuffer::new(&layout, 8).unwrap();
    let doc_ids = vec![0u32, 5u32];
    let result = run_tgs_pass(&packed, &mut accum, &doc_ids, &mut staging, BoundsMode::Checked);
    assert!(result.is_err());
  }
}
