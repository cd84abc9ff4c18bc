use crate::constants::MAX_COLUMN_BYTES;

/// Number of bytes needed to store `range` distinct values (0..=range),
/// i.e. the values `0..=max-min` for a column with bounds `[min, max]`.
///
/// A `range` of 0 (a constant column) still needs 1 byte, matching the
/// original width rule's integer-truncation behavior for that edge case.
pub fn bytes_for_range(range: u64) -> usize {
  let bits = bits_for_range(range);
  if bits == 0 {
    1
  } else {
    ((bits - 1) / 8 + 1) as usize
  }
}

/// Number of bits needed to store `range` distinct values. Returns 0 for a
/// range of 0 (a constant column, which still collapses to a single bit
/// field or a 1-byte column depending on how many boolean slots remain).
pub fn bits_for_range(range: u64) -> u32 {
  if range == 0 {
    0
  } else {
    64 - range.leading_zeros()
  }
}

/// Whether a column with this [min, max] range can collapse into a single
/// packed boolean bit rather than occupying a lane byte range.
pub fn collapses_to_boolean(range: u64) -> bool {
  bits_for_range(range) <= 1
}

pub fn checked_bytes_for_range(range: u64) -> usize {
  let bytes = bytes_for_range(range);
  debug_assert!(
    bytes <= MAX_COLUMN_BYTES,
    "column range too wide for i64 accumulation"
  );
  bytes
}
