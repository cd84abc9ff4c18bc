//! A small power-of-two ring buffer of unpacked rows, sitting between the
//! unpack sweep and the accumulate sweep of a TGS pass. Decoupling the two
//! lets the unpack sweep run far enough ahead that its prefetches have
//! landed by the time the accumulate sweep reads the same slot.

use crate::errors::{FtgsError, FtgsResult};
use crate::unpacked_table::TableLayout;

#[derive(Clone, Debug)]
pub struct StagingBuffer {
  row_words: usize,
  mask: usize,
  data: Vec<i64>,
}

impl StagingBuffer {
  pub fn new(layout: &TableLayout, capacity: usize) -> FtgsResult<Self> {
    if !capacity.is_power_of_two() {
      return Err(FtgsError::invalid_argument(format!(
        "staging buffer capacity must be a power of two, got {}",
        capacity
      )));
    }
    let row_words = layout.row_words();
    Ok(Self {
      row_words,
      mask: capacity - 1,
      data: vec![0i64; capacity * row_words],
    })
  }

  pub fn capacity(&self) -> usize {
    self.mask + 1
  }

  pub fn row_words(&self) -> usize {
    self.row_words
  }

  #[inline]
  pub fn slot_for(&self, i: usize) -> usize {
    i & self.mask
  }

  #[inline]
  pub fn slot(&self, slot: usize) -> &[i64] {
    let start = slot * self.row_words;
    &self.data[start..start + self.row_words]
  }

  #[inline]
  pub fn slot_mut(&mut self, slot: usize) -> &mut [i64] {
    let start = slot * self.row_words;
    &mut self.data[start..start + self.row_words]
  }
}
