use anyhow::{anyhow, Result};
use ftgs::ColumnSpec;

/// Parses a `min:max` column spec, e.g. `0:255` or `-100:100`.
pub fn parse_column_spec(s: &str) -> Result<ColumnSpec> {
  let (min_str, max_str) = s
    .split_once(':')
    .ok_or_else(|| anyhow!("column spec `{}` must look like MIN:MAX", s))?;
  let min: i64 = min_str
    .parse()
    .map_err(|_| anyhow!("invalid column min `{}`", min_str))?;
  let max: i64 = max_str
    .parse()
    .map_err(|_| anyhow!("invalid column max `{}`", max_str))?;
  ColumnSpec::new(min, max).map_err(|e| anyhow!("{}", e))
}
