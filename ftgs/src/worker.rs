//! A `Worker` owns the group-stats accumulator and staging ring for one
//! thread of TGS passes. Workers don't share sessions, shards, or
//! accumulators with each other; running multiple workers in parallel is
//! the caller's job (spawn one worker per thread, give each its own
//! shard subset), and nothing in this crate takes a lock to make that
//! safe, since a worker's data is never touched by another.

use crate::config::WorkerConfig;
use crate::errors::{FtgsError, FtgsResult};
use crate::packed_table::PackedTable;
use crate::pass::PassDescriptor;
use crate::pipeline;
use crate::session::Session;
use crate::staging::StagingBuffer;
use crate::unpacked_table::{TableLayout, UnpackedTable};
use crate::varint;

pub struct Worker {
  config: WorkerConfig,
  accum: Option<UnpackedTable>,
  staging: Option<StagingBuffer>,
}

impl Worker {
  pub fn new(config: WorkerConfig) -> Self {
    Self {
      config,
      accum: None,
      staging: None,
    }
  }

  /// The worker's accumulator, if a pass has allocated one yet.
  pub fn accumulator(&self) -> Option<&UnpackedTable> {
    self.accum.as_ref()
  }

  /// Zeroes the accumulator and clears its touched-group bitmap without
  /// freeing it, ready for the next term. The accumulator is never reset
  /// automatically between slices or terms; callers own that decision.
  pub fn reset_accumulator(&mut self) {
    if let Some(accum) = self.accum.as_mut() {
      accum.reset();
    }
  }

  fn budget_check(&self, n_groups: usize, row_words: usize) -> FtgsResult<()> {
    let needed_bytes = n_groups
      .saturating_mul(row_words)
      .saturating_mul(std::mem::size_of::<i64>());
    if needed_bytes > self.config.max_accumulator_bytes {
      return Err(FtgsError::invalid_argument(format!(
        "accumulator for {} groups would need {} bytes, exceeding the worker's budget of {}",
        n_groups, needed_bytes, self.config.max_accumulator_bytes
      )));
    }
    Ok(())
  }

  /// Ensures the worker has an accumulator (and matching staging ring)
  /// compatible with `packed`'s layout and covering at least `n_groups`
  /// groups. Allocates fresh on first use; on later calls, a layout that
  /// disagrees with the existing accumulator is a `LayoutMismatch` (every
  /// slice of one pass must share a layout), while a larger `n_groups`
  /// just grows the existing accumulator in place.
  fn ensure_accumulator(
    &mut self,
    packed: &PackedTable,
    n_groups: usize,
    rows_prefetch: usize,
  ) -> FtgsResult<()> {
    let layout = TableLayout::from_packed(packed);
    match &mut self.accum {
      None => {
        self.budget_check(n_groups, layout.row_words())?;
        self.staging = Some(StagingBuffer::new(&layout, rows_prefetch)?);
        self.accum = Some(UnpackedTable::create(layout, n_groups));
      }
      Some(accum) => {
        if accum.layout() != &layout {
          return Err(FtgsError::layout_mismatch(
            "slice's packed layout does not match this worker's accumulator layout",
          ));
        }
        if n_groups > accum.n_groups() {
          self.budget_check(n_groups, accum.row_words())?;
          accum.ensure_groups(n_groups);
        }
      }
    }
    Ok(())
  }

  /// Runs one TGS pass over an already-decoded doc-id chunk against a
  /// single shard, allocating the accumulator on first use. A thin
  /// single-slice convenience over [`execute_pass`][Self::execute_pass]
  /// for callers that already have doc ids in hand (e.g. tests, or a
  /// host that decodes varints itself).
  pub fn run_tgs_pass(
    &mut self,
    session: &Session,
    shard_idx: usize,
    doc_ids: &[u32],
    n_groups: usize,
  ) -> FtgsResult<()> {
    let shard = session.shard(shard_idx)?;
    self.ensure_accumulator(shard.packed(), n_groups, session.config().rows_prefetch)?;
    let accum = self.accum.as_mut().expect("just allocated above");
    let staging = self.staging.as_mut().expect("just allocated above");
    pipeline::run_tgs_pass(
      shard.packed(),
      accum,
      doc_ids,
      staging,
      session.config().bounds_mode,
    )
  }

  /// Runs a full TGS pass over every slice of `desc`: decodes each
  /// slice's delta-varint doc-id stream in chunks of up to
  /// `session.config().tgs_buffer_size`, seeding each chunk's decode with
  /// the previous chunk's last absolute id, and accumulates every chunk
  /// into this worker's accumulator before moving to the next slice.
  ///
  /// Fails with `EmptyTerm` if `desc` has no slices. The accumulator is
  /// not reset between slices of this pass, nor between calls for
  /// different terms — see [`reset_accumulator`][Self::reset_accumulator].
  pub fn execute_pass(&mut self, session: &Session, desc: &PassDescriptor) -> FtgsResult<()> {
    if desc.slices.is_empty() {
      return Err(FtgsError::empty_term(
        "execute_pass called with zero slices",
      ));
    }

    let buffer_size = session.config().tgs_buffer_size;
    let mut chunk = vec![0u32; buffer_size];

    for slice in &desc.slices {
      let shard = session.shard(slice.shard_idx)?;
      self.ensure_accumulator(shard.packed(), desc.n_groups, session.config().rows_prefetch)?;

      let mut last_value = 0u64;
      let mut offset = 0usize;
      while offset < slice.doc_id_bytes.len() {
        let decoded = varint::decode_chunk(&slice.doc_id_bytes[offset..], last_value, &mut chunk)?;
        if decoded.written == 0 {
          break;
        }
        offset += decoded.bytes_consumed;
        last_value = decoded.last_value;

        let accum = self.accum.as_mut().expect("ensured above");
        let staging = self.staging.as_mut().expect("ensured above");
        pipeline::run_tgs_pass(
          shard.packed(),
          accum,
          &chunk[..decoded.written],
          staging,
          session.config().bounds_mode,
        )?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::SessionConfig;
  use crate::packed_table::ColumnSpec;

  fn session_with_shard(n_docs: usize, col_max: i64, group_mod: u32) -> (Session, usize) {
    let mut session = Session::new(SessionConfig::default());
    let mut packed = PackedTable::new(n_docs, &[ColumnSpec::new(0, col_max).unwrap()]).unwrap();
    for doc in 0..n_docs {
      packed.set_group(doc, (doc as u32) % group_mod).unwrap();
      packed.set_cell(doc, 0, 10).unwrap();
    }
    let shard_idx = session.register_shard(packed).unwrap();
    (session, shard_idx)
  }

  #[test]
  fn test_run_tgs_pass_allocates_and_accumulates() {
    let (session, shard_idx) = session_with_shard(4, 100, 2);
    let mut worker = Worker::new(WorkerConfig::default());
    worker
      .run_tgs_pass(&session, shard_idx, &[0, 1, 2, 3], 2)
      .unwrap();
    let accum = worker.accumulator().unwrap();
    assert_eq!(accum.get(0, 0).unwrap(), 20);
    assert_eq!(accum.get(1, 0).unwrap(), 20);
  }

  #[test]
  fn test_reset_accumulator_reuses_allocation() {
    let (session, shard_idx) = session_with_shard(2, 10, 1);
    let mut worker = Worker::new(WorkerConfig::default());
    worker.run_tgs_pass(&session, shard_idx, &[0, 1], 1).unwrap();
    assert_eq!(worker.accumulator().unwrap().get(0, 0).unwrap(), 20);
    worker.reset_accumulator();
    assert_eq!(worker.accumulator().unwrap().get(0, 0).unwrap(), 0);
  }

  #[test]
  fn test_ensure_accumulator_rejects_over_budget() {
    let (session, shard_idx) = session_with_shard(4, 10, 2);
    let config = WorkerConfig::default().with_max_accumulator_bytes(8);
    let mut worker = Worker::new(config);
    assert!(worker
      .run_tgs_pass(&session, shard_idx, &[0, 1, 2, 3], 100)
      .is_err());
  }

  #[test]
  fn test_execute_pass_empty_term_fails() {
    let (session, _shard_idx) = session_with_shard(1, 10, 1);
    let mut worker = Worker::new(WorkerConfig::default());
    let desc = PassDescriptor::new(1, vec![]);
    let err = worker.execute_pass(&session, &desc).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::EmptyTerm);
    assert!(worker.accumulator().is_none());
  }

  #[test]
  fn test_execute_pass_decodes_and_accumulates_single_slice() {
    let (session, shard_idx) = session_with_shard(6, 100, 3);
    let mut worker = Worker::new(WorkerConfig::default());
    let doc_ids: Vec<u32> = (0..6).collect();
    let bytes = varint::encode(&doc_ids);
    let desc = PassDescriptor::new(3, vec![crate::pass::TermSlice::new(shard_idx, bytes)]);
    worker.execute_pass(&session, &desc).unwrap();
    let accum = worker.accumulator().unwrap();
    for group in 0..3 {
      assert_eq!(accum.get(group, 0).unwrap(), 20);
    }
  }

  #[test]
  fn test_execute_pass_chunks_at_small_buffer_size() {
    let mut session = Session::new(SessionConfig::default().with_tgs_buffer_size(2));
    let mut packed = PackedTable::new(5, &[ColumnSpec::new(0, 10).unwrap()]).unwrap();
    for doc in 0..5 {
      packed.set_group(doc, 0).unwrap();
      packed.set_cell(doc, 0, 3).unwrap();
    }
    let shard_idx = session.register_shard(packed).unwrap();
    let mut worker = Worker::new(WorkerConfig::default());
    let doc_ids: Vec<u32> = (0..5).collect();
    let bytes = varint::encode(&doc_ids);
    let desc = PassDescriptor::new(1, vec![crate::pass::TermSlice::new(shard_idx, bytes)]);
    worker.execute_pass(&session, &desc).unwrap();
    assert_eq!(worker.accumulator().unwrap().get(0, 0).unwrap(), 15);
  }

  #[test]
  fn test_execute_pass_combines_multiple_shard_slices_into_one_accumulator() {
    let (mut session, shard_a) = session_with_shard(3, 100, 2);
    let mut packed_b = PackedTable::new(3, &[ColumnSpec::new(0, 100).unwrap()]).unwrap();
    for doc in 0..3 {
      packed_b.set_group(doc, (doc as u32) % 2).unwrap();
      packed_b.set_cell(doc, 0, 10).unwrap();
    }
    let shard_b = session.register_shard(packed_b).unwrap();

    let mut worker = Worker::new(WorkerConfig::default());
    let doc_ids: Vec<u32> = (0..3).collect();
    let bytes = varint::encode(&doc_ids);
    let desc = PassDescriptor::new(
      2,
      vec![
        crate::pass::TermSlice::new(shard_a, bytes.clone()),
        crate::pass::TermSlice::new(shard_b, bytes),
      ],
    );
    worker.execute_pass(&session, &desc).unwrap();
    let accum = worker.accumulator().unwrap();
    // group 0 gets doc 0 and doc 2 from each shard = 2 shards * 2 docs * 10
    assert_eq!(accum.get(0, 0).unwrap(), 40);
    // group 1 gets doc 1 from each shard = 2 shards * 1 doc * 10
    assert_eq!(accum.get(1, 0).unwrap(), 20);
  }

  #[test]
  fn test_execute_pass_layout_mismatch_between_slices() {
    let (mut session, shard_a) = session_with_shard(2, 100, 1);
    let mut packed_b = PackedTable::new(2, &[ColumnSpec::new(0, 1).unwrap()]).unwrap();
    packed_b.set_cell(0, 0, 1).unwrap();
    let shard_b = session.register_shard(packed_b).unwrap();

    let mut worker = Worker::new(WorkerConfig::default());
    let bytes = varint::encode(&[0u32, 1u32]);
    let desc = PassDescriptor::new(
      1,
      vec![
        crate::pass::TermSlice::new(shard_a, bytes.clone()),
        crate::pass::TermSlice::new(shard_b, bytes),
      ],
    );
    let err = worker.execute_pass(&session, &desc).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::LayoutMismatch);
  }
}
