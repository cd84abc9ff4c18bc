use anyhow::Result;
use clap::Args;
use rand::Rng;

use ftgs::{PackedTable, PassDescriptor, Session, SessionConfig, TermSlice, Worker, WorkerConfig};

use crate::parse::parse_column_spec;

#[derive(Args)]
pub struct RunOpt {
  /// Number of synthetic docs to generate.
  #[arg(long, default_value_t = 1_000)]
  n_docs: usize,

  /// Number of groups to scatter docs across.
  #[arg(long, default_value_t = 8)]
  n_groups: usize,

  /// One or more MIN:MAX column specs, e.g. `0:1 0:255 -100:100`.
  #[arg(long = "column", value_parser = parse_column_spec, num_args = 1.., default_values_t = [ftgs::ColumnSpec::new(0, 255).unwrap()])]
  columns: Vec<ftgs::ColumnSpec>,

  /// Seeds the synthetic data generator for reproducible runs.
  #[arg(long, default_value_t = 0)]
  seed: u64,
}

pub fn run(opt: RunOpt) -> Result<()> {
  use rand::SeedableRng;
  let mut rng = rand::rngs::StdRng::seed_from_u64(opt.seed);

  let mut packed = PackedTable::new(opt.n_docs, &opt.columns)?;
  let doc_ids: Vec<u32> = (0..opt.n_docs as u32).collect();
  for &doc in &doc_ids {
    let doc = doc as usize;
    packed.set_group(doc, (doc % opt.n_groups) as u32)?;
    for (col, spec) in opt.columns.iter().enumerate() {
      let value = rng.gen_range(spec.min..=spec.max);
      packed.set_cell(doc, col, value)?;
    }
  }

  let mut session = Session::new(SessionConfig::default());
  let shard_idx = session.register_shard(packed)?;

  // Exercise the real wire path: encode the doc-id stream as delta
  // varints and run it through `execute_pass`, the same entry point a
  // host driving the compressed posting list would use.
  let doc_id_bytes = ftgs::varint::encode(&doc_ids);
  let desc = PassDescriptor::new(opt.n_groups, vec![TermSlice::new(shard_idx, doc_id_bytes)]);

  let mut worker = Worker::new(WorkerConfig::default());
  worker.execute_pass(&session, &desc)?;

  let accum = worker.accumulator().expect("execute_pass allocated one");
  for group in accum.touched_groups() {
    let sums: Vec<i64> = (0..opt.columns.len())
      .map(|col| accum.get(group, col).unwrap())
      .collect();
    println!("group {}: {:?}", group, sums);
  }

  Ok(())
}
