//! Multi-remap: rewrites each doc's recorded group id according to a
//! per-old-group remap table, with an optional placeholder sentinel for
//! detecting a doc that gets remapped twice in the same batch.

use crate::errors::{FtgsError, FtgsResult};
use crate::packed_table::PackedTable;

/// For every doc id in `doc_ids`, looks up its current group in
/// `doc_id_group`, skips it if that group is the reserved "no group" (0),
/// and otherwise folds `remappings[old_group]` into `results[doc_id]`.
///
/// `results` is taken to start every doc at `0`, meaning "not yet
/// remapped in this generation"; the first write for a doc is a plain
/// assignment, and subsequent writes for the same doc take the smaller of
/// the two candidate groups. If `placeholder > 0`, `results` is instead
/// taken to start every doc intended for remapping at `placeholder`, and
/// any doc whose current value is neither `placeholder` nor still `0`
/// (not intended for remapping this batch) trips a conflict instead of
/// silently resolving with `min`.
pub fn remap_docs_in_target_groups(
  doc_id_group: &PackedTable,
  doc_ids: &[u32],
  remappings: &[i64],
  placeholder: i64,
  results: &mut [i64],
) -> FtgsResult<()> {
  for &doc_id in doc_ids {
    let doc_id = doc_id as usize;
    if doc_id >= results.len() {
      return Err(FtgsError::out_of_range(format!(
        "doc id {} out of range ({} results slots)",
        doc_id,
        results.len()
      )));
    }
    let old_group = doc_id_group.get_group(doc_id)?;
    if old_group == 0 {
      continue;
    }
    let old_group = old_group as usize;
    if old_group >= remappings.len() {
      return Err(FtgsError::out_of_range(format!(
        "group {} has no entry in the remap table ({} entries)",
        old_group,
        remappings.len()
      )));
    }
    let new_group = remappings[old_group];
    let current = results[doc_id];

    if placeholder > 0 {
      if current != placeholder {
        return Err(FtgsError::remap_conflict(format!(
          "doc {} was already remapped to {} in this batch",
          doc_id, current
        )));
      }
      results[doc_id] = new_group;
    } else if current == 0 {
      results[doc_id] = new_group;
    } else {
      results[doc_id] = current.min(new_group);
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::packed_table::ColumnSpec;

  fn groups_table(groups: &[u32]) -> PackedTable {
    let mut table = PackedTable::new(groups.len(), &[ColumnSpec::new(0, 1).unwrap()]).unwrap();
    for (doc, &g) in groups.iter().enumerate() {
      table.set_group(doc, g).unwrap();
    }
    table
  }

  #[test]
  fn test_basic_remap_no_placeholder() {
    let table = groups_table(&[0, 1, 2, 3, 1, 2]);
    let remappings = vec![0, 10, 20, 30];
    let doc_ids: Vec<u32> = (0..6).collect();
    let mut results = vec![0i64; 6];
    remap_docs_in_target_groups(&table, &doc_ids, &remappings, 0, &mut results).unwrap();
    assert_eq!(results, vec![0, 10, 20, 30, 10, 20]);
  }

  #[test]
  fn test_second_call_takes_min() {
    let table = groups_table(&[0, 1, 2, 3, 1, 2]);
    let doc_ids: Vec<u32> = (0..6).collect();
    let mut results = vec![0i64; 6];
    remap_docs_in_target_groups(&table, &doc_ids, &[0, 10, 20, 30], 0, &mut results).unwrap();
    remap_docs_in_target_groups(&table, &doc_ids, &[0, 5, 25, 35], 0, &mut results).unwrap();
    assert_eq!(results, vec![0, 5, 20, 30, 5, 20]);
  }

  #[test]
  fn test_placeholder_detects_conflict() {
    let table = groups_table(&[0, 1, 2, 3, 1, 2]);
    let doc_ids: Vec<u32> = (0..6).collect();
    let placeholder = 99;
    let mut results = vec![placeholder; 6];
    results[1] = 10; // doc 1 already written by someone else this batch
    let err = remap_docs_in_target_groups(&table, &doc_ids, &[0, 10, 20, 30], placeholder, &mut results);
    assert!(err.is_err());
  }

  #[test]
  fn test_placeholder_happy_path() {
    let table = groups_table(&[0, 1, 2]);
    let doc_ids: Vec<u32> = (0..3).collect();
    let placeholder = 99;
    let mut results = vec![placeholder; 3];
    remap_docs_in_target_groups(&table, &doc_ids, &[0, 10, 20], placeholder, &mut results).unwrap();
    assert_eq!(results, vec![placeholder, 10, 20]);
  }

  #[test]
  fn test_group_zero_is_skipped() {
    let table = groups_table(&[0, 0, 0]);
    let doc_ids: Vec<u32> = (0..3).collect();
    let mut results = vec![7i64; 3];
    remap_docs_in_target_groups(&table, &doc_ids, &[0, 10], 0, &mut results).unwrap();
    assert_eq!(results, vec![7, 7, 7]);
  }
}
