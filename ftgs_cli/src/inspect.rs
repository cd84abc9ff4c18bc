use anyhow::Result;
use clap::Args;

use ftgs::{PackedTable, TableLayout};

use crate::parse::parse_column_spec;

#[derive(Args)]
pub struct InspectOpt {
  /// Number of rows the table would hold (layout doesn't depend on data,
  /// but a `PackedTable` still needs a row count to construct).
  #[arg(long, default_value_t = 1)]
  n_docs: usize,

  /// One or more MIN:MAX column specs, e.g. `0:1 0:255 -100:100`.
  #[arg(long = "column", value_parser = parse_column_spec, num_args = 1.., default_values_t = [ftgs::ColumnSpec::new(0, 255).unwrap()])]
  columns: Vec<ftgs::ColumnSpec>,
}

/// Prints the layout a `PackedTable` would derive from the given column
/// ranges: lane count, which columns collapsed into header booleans, each
/// integer column's `(lane, byte_offset, size)`, and the matching
/// `UnpackedTable` accumulator slot for each column. Mirrors the debug
/// dump a host would reach for to sanity-check a shard's layout before
/// running a real pass over it.
pub fn inspect(opt: InspectOpt) -> Result<()> {
  let packed = PackedTable::new(opt.n_docs.max(1), &opt.columns)?;
  let layout = TableLayout::from_packed(&packed);

  println!("columns: {}", packed.n_cols());
  println!("boolean columns: {}", packed.n_boolean_cols());
  println!("lanes per row: {}", packed.n_lanes_per_row());
  println!("accumulator row words: {}", layout.row_words());
  println!();

  for col in 0..packed.n_cols() {
    let kind = if col < packed.n_boolean_cols() {
      "boolean (row header)".to_string()
    } else {
      "integer".to_string()
    };
    println!(
      "col {:>3}: [{:>12}, {:>12}] {:<22} accumulator slot {}",
      col,
      packed.col_min(col),
      packed.col_max(col),
      kind,
      layout.col_offset(col),
    );
  }

  println!();
  for (lane_idx, cols) in packed.lane_columns().iter().enumerate() {
    println!("lane {}: integer columns {:?}", lane_idx, cols);
  }

  Ok(())
}
