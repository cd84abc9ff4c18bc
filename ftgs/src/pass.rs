//! The descriptor a caller builds to ask a `Worker` to run one TGS pass
//! over a term: one slice per shard that has a posting list for the term,
//! each slice carrying its own delta-varint-encoded doc-id stream.

/// One shard's contribution to a TGS pass: which shard to read rows from,
/// and the compressed doc-id stream matching that shard's posting list
/// for the term being scanned.
#[derive(Clone, Debug)]
pub struct TermSlice {
  pub shard_idx: usize,
  pub doc_id_bytes: Vec<u8>,
}

impl TermSlice {
  pub fn new(shard_idx: usize, doc_id_bytes: Vec<u8>) -> Self {
    Self {
      shard_idx,
      doc_id_bytes,
    }
  }
}

/// Describes one full TGS pass: every shard slice for the term, and how
/// many groups the accumulator needs to cover if it has to be allocated
/// fresh.
#[derive(Clone, Debug)]
pub struct PassDescriptor {
  pub n_groups: usize,
  pub slices: Vec<TermSlice>,
}

impl PassDescriptor {
  pub fn new(n_groups: usize, slices: Vec<TermSlice>) -> Self {
    Self { n_groups, slices }
  }
}
