//! A `Session` owns the shards scanned by a query: one `PackedTable` per
//! shard, plus the config shared by every pass run against them. Shards
//! are read-only once registered except through their own set/batch
//! accessors; a session never allocates an accumulator itself, since that
//! belongs to whichever `Worker` runs passes against it.

use crate::config::SessionConfig;
use crate::errors::{FtgsError, FtgsResult};
use crate::packed_table::PackedTable;

/// One packed column store. Allocated once per shard at the start of a
/// query and destroyed at query end; mutated by set/batch calls during
/// setup, read-only during a TGS pass.
pub struct Shard {
  packed: PackedTable,
}

impl Shard {
  fn new(packed: PackedTable) -> Self {
    Self { packed }
  }

  pub fn packed(&self) -> &PackedTable {
    &self.packed
  }

  pub fn packed_mut(&mut self) -> &mut PackedTable {
    &mut self.packed
  }
}

pub struct Session {
  config: SessionConfig,
  shards: Vec<Shard>,
}

impl Session {
  pub fn new(config: SessionConfig) -> Self {
    Self {
      config,
      shards: Vec::new(),
    }
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn n_shards(&self) -> usize {
    self.shards.len()
  }

  /// Registers a shard's packed table, returning a handle used by later
  /// calls (`shard`, `shard_mut`, and a pass descriptor's `shard_idx`).
  pub fn register_shard(&mut self, packed: PackedTable) -> FtgsResult<usize> {
    self.shards.push(Shard::new(packed));
    Ok(self.shards.len() - 1)
  }

  fn check_shard(&self, shard_idx: usize) -> FtgsResult<()> {
    if shard_idx >= self.shards.len() {
      return Err(FtgsError::out_of_range(format!(
        "shard {} out of range ({} shards)",
        shard_idx,
        self.shards.len()
      )));
    }
    Ok(())
  }

  pub fn shard(&self, shard_idx: usize) -> FtgsResult<&Shard> {
    self.check_shard(shard_idx)?;
    Ok(&self.shards[shard_idx])
  }

  pub fn shard_mut(&mut self, shard_idx: usize) -> FtgsResult<&mut Shard> {
    self.check_shard(shard_idx)?;
    Ok(&mut self.shards[shard_idx])
  }
}
