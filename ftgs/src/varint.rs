//! Reference decoder for delta-varint-encoded doc-id chunks. No external
//! decoder is supplied to this crate, so this is the decoder the pipeline
//! uses by default; it is intentionally swappable (`decode_chunk` takes a
//! plain byte slice and writes to a plain `u32` buffer, so a host free to
//! substitute a faster decoder can do so without touching the rest of the
//! pipeline). Matches the external contract `decode(bytes, last) -> (ids[],
//! bytes_consumed)`: doc ids are reconstructed as a prefix sum of deltas
//! seeded by the last id decoded from the previous chunk.

use crate::errors::{FtgsError, FtgsResult};

/// The result of decoding one chunk: how many ids were written, how many
/// input bytes were consumed doing it, and the last absolute id decoded
/// (the seed for the next chunk's `last_value`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedChunk {
  pub written: usize,
  pub bytes_consumed: usize,
  pub last_value: u64,
}

/// Decodes up to `dst.len()` doc ids from `bytes`, starting the delta
/// prefix sum at `last_value` (pass `0` for the first chunk of a stream).
/// A delta of 0 between two ids is legal; repeated doc ids are not
/// rejected at this layer.
pub fn decode_chunk(bytes: &[u8], last_value: u64, dst: &mut [u32]) -> FtgsResult<DecodedChunk> {
  let mut prev = last_value;
  let mut consumed = 0usize;
  let mut written = 0usize;
  while written < dst.len() && consumed < bytes.len() {
    let (delta, next_consumed) = read_varint(&bytes[consumed..])?;
    consumed += next_consumed;
    prev += delta;
    dst[written] = u32::try_from(prev).map_err(|_| {
      FtgsError::invalid_argument(format!("decoded doc id {} does not fit in u32", prev))
    })?;
    written += 1;
  }
  Ok(DecodedChunk {
    written,
    bytes_consumed: consumed,
    last_value: prev,
  })
}

/// Convenience wrapper over [`decode_chunk`] for callers decoding a whole
/// self-contained stream (`last_value` seeded at 0) in one call.
pub fn decode_into(bytes: &[u8], dst: &mut [u32]) -> FtgsResult<usize> {
  Ok(decode_chunk(bytes, 0, dst)?.written)
}

fn read_varint(bytes: &[u8]) -> FtgsResult<(u64, usize)> {
  let mut value: u64 = 0;
  let mut shift = 0u32;
  for (i, &byte) in bytes.iter().enumerate() {
    value |= u64::from(byte & 0x7f) << shift;
    if byte & 0x80 == 0 {
      return Ok((value, i + 1));
    }
    shift += 7;
    if shift >= 64 {
      return Err(FtgsError::invalid_argument(
        "varint is too long to fit in a u64",
      ));
    }
  }
  Err(FtgsError::invalid_argument(
    "truncated varint: ran out of bytes before a terminating byte",
  ))
}

/// Encodes absolute doc ids (which must be non-decreasing) as a delta
/// varint stream. Mainly used by tests and the CLI's demo data generator.
pub fn encode(doc_ids: &[u32]) -> Vec<u8> {
  let mut out = Vec::new();
  let mut prev: u64 = 0;
  for &id in doc_ids {
    let id = u64::from(id);
    write_varint(id - prev, &mut out);
    prev = id;
  }
  out
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
  loop {
    let byte = (value & 0x7f) as u8;
    value >>= 7;
    if value == 0 {
      out.push(byte);
      break;
    } else {
      out.push(byte | 0x80);
    }
  }
}
