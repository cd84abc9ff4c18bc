use crate::constants::{N_ROWS_PREFETCH, TGS_BUFFER_SIZE};

/// Controls whether row/group/column ids are bounds-checked at the hot-path
/// call sites (`unpack_row`, `add_row`, `remap_docs_in_target_groups`).
///
/// `Checked` is the default everywhere. `Unchecked` is only honored when
/// the crate is built with the `unchecked-release` feature; otherwise it
/// is silently treated as `Checked`, so turning this on can never be the
/// difference between a safe and an unsafe build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundsMode {
  #[default]
  Checked,
  /// Elide bounds checks in `unchecked-release` builds. Debug builds still
  /// assert, so a misuse is caught in testing before it reaches a release
  /// binary that would otherwise read out of bounds.
  Unchecked,
}

impl BoundsMode {
  pub(crate) fn checks_enabled(self) -> bool {
    match self {
      BoundsMode::Checked => true,
      BoundsMode::Unchecked => !cfg!(feature = "unchecked-release"),
    }
  }
}

/// Configuration shared by every worker in a session: how doc-id chunks are
/// staged and how aggressively the unpack phase prefetches ahead of the
/// accumulate phase.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct SessionConfig {
  /// Number of decoded doc ids handled per `run_tgs_pass` batch
  /// (default: 1024).
  pub tgs_buffer_size: usize,
  /// Number of staging rows kept in the unpack/accumulate ring buffer;
  /// must be a power of two (default: 32).
  pub rows_prefetch: usize,
  /// Whether row/group ids are bounds-checked on the hot path
  /// (default: `Checked`).
  pub bounds_mode: BoundsMode,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      tgs_buffer_size: TGS_BUFFER_SIZE,
      rows_prefetch: N_ROWS_PREFETCH,
      bounds_mode: BoundsMode::Checked,
    }
  }
}

impl SessionConfig {
  /// Sets [`tgs_buffer_size`][SessionConfig::tgs_buffer_size].
  pub fn with_tgs_buffer_size(mut self, size: usize) -> Self {
    self.tgs_buffer_size = size;
    self
  }

  /// Sets [`rows_prefetch`][SessionConfig::rows_prefetch].
  pub fn with_rows_prefetch(mut self, rows: usize) -> Self {
    self.rows_prefetch = rows;
    self
  }

  /// Sets [`bounds_mode`][SessionConfig::bounds_mode].
  pub fn with_bounds_mode(mut self, mode: BoundsMode) -> Self {
    self.bounds_mode = mode;
    self
  }
}

/// Per-worker configuration: how large an accumulator a worker is willing
/// to allocate for a single shard before giving up.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct WorkerConfig {
  /// Upper bound, in bytes, on the `UnpackedTable` a single worker will
  /// allocate for one shard (default: 2048 * row_words * 8, loosely
  /// mirroring the original engine's static `gs_size` cap, but expressed
  /// as a byte budget instead of a fixed row count so it scales with the
  /// number of metric columns).
  pub max_accumulator_bytes: usize,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      max_accumulator_bytes: 2048 * 64,
    }
  }
}

impl WorkerConfig {
  /// Sets [`max_accumulator_bytes`][WorkerConfig::max_accumulator_bytes].
  pub fn with_max_accumulator_bytes(mut self, bytes: usize) -> Self {
    self.max_accumulator_bytes = bytes;
    self
  }
}
