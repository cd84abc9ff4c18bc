#![allow(clippy::missing_safety_doc)]

use libc::{c_void, size_t};

use ftgs::errors::ErrorKind;
use ftgs::{ColumnSpec, PackedTable, PassDescriptor, Session, SessionConfig, TermSlice, Worker, WorkerConfig};

#[repr(C)]
pub enum FtgsFfiError {
  Success,
  InvalidArgument,
  OutOfRange,
  LayoutMismatch,
  RemapConflict,
  EmptyTerm,
  NullPointer,
}

fn kind_to_ffi(kind: ErrorKind) -> FtgsFfiError {
  match kind {
    ErrorKind::InvalidArgument => FtgsFfiError::InvalidArgument,
    ErrorKind::OutOfRange => FtgsFfiError::OutOfRange,
    ErrorKind::LayoutMismatch => FtgsFfiError::LayoutMismatch,
    ErrorKind::RemapConflict => FtgsFfiError::RemapConflict,
    ErrorKind::EmptyTerm => FtgsFfiError::EmptyTerm,
    _ => FtgsFfiError::InvalidArgument,
  }
}

macro_rules! require_non_null {
  ($ptr:expr) => {
    if $ptr.is_null() {
      return FtgsFfiError::NullPointer;
    }
  };
}

macro_rules! try_ffi {
  ($result:expr) => {
    match $result {
      Ok(v) => v,
      Err(e) => return kind_to_ffi(e.kind),
    }
  };
}

// ---- PackedTable --------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_create(
  n_rows: size_t,
  col_mins: *const i64,
  col_maxs: *const i64,
  n_cols: size_t,
  out: *mut *mut c_void,
) -> FtgsFfiError {
  require_non_null!(out);
  if n_cols > 0 {
    require_non_null!(col_mins);
    require_non_null!(col_maxs);
  }
  let mins: &[i64] = if n_cols == 0 {
    &[]
  } else {
    unsafe { std::slice::from_raw_parts(col_mins, n_cols) }
  };
  let maxs: &[i64] = if n_cols == 0 {
    &[]
  } else {
    unsafe { std::slice::from_raw_parts(col_maxs, n_cols) }
  };
  let mut columns = Vec::with_capacity(n_cols);
  for i in 0..n_cols {
    columns.push(try_ffi!(ColumnSpec::new(mins[i], maxs[i])));
  }
  let table = try_ffi!(PackedTable::new(n_rows, &columns));
  unsafe { *out = Box::into_raw(Box::new(table)) as *mut c_void };
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_destroy(table: *mut c_void) {
  if !table.is_null() {
    unsafe { drop(Box::from_raw(table as *mut PackedTable)) };
  }
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_get_cell(
  table: *const c_void,
  row: size_t,
  col: size_t,
  out: *mut i64,
) -> FtgsFfiError {
  require_non_null!(table);
  require_non_null!(out);
  let table = unsafe { &*(table as *const PackedTable) };
  let value = try_ffi!(table.get_cell(row, col));
  unsafe { *out = value };
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_set_cell(
  table: *mut c_void,
  row: size_t,
  col: size_t,
  value: i64,
) -> FtgsFfiError {
  require_non_null!(table);
  let table = unsafe { &mut *(table as *mut PackedTable) };
  try_ffi!(table.set_cell(row, col, value));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_get_group(
  table: *const c_void,
  row: size_t,
  out: *mut u32,
) -> FtgsFfiError {
  require_non_null!(table);
  require_non_null!(out);
  let table = unsafe { &*(table as *const PackedTable) };
  let value = try_ffi!(table.get_group(row));
  unsafe { *out = value };
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_set_group(
  table: *mut c_void,
  row: size_t,
  group: u32,
) -> FtgsFfiError {
  require_non_null!(table);
  let table = unsafe { &mut *(table as *mut PackedTable) };
  try_ffi!(table.set_group(row, group));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_set_all_groups(
  table: *mut c_void,
  group: u32,
) -> FtgsFfiError {
  require_non_null!(table);
  let table = unsafe { &mut *(table as *mut PackedTable) };
  try_ffi!(table.set_all_groups(group));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_batch_col_lookup(
  table: *const c_void,
  rows: *const size_t,
  n: size_t,
  col: size_t,
  dst: *mut i64,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(rows);
    require_non_null!(dst);
  }
  let table = unsafe { &*(table as *const PackedTable) };
  let rows = unsafe { std::slice::from_raw_parts(rows, n) };
  let dst = unsafe { std::slice::from_raw_parts_mut(dst, n) };
  try_ffi!(table.batch_col_lookup(rows, col, dst));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_batch_set_col(
  table: *mut c_void,
  rows: *const size_t,
  n: size_t,
  col: size_t,
  values: *const i64,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(rows);
    require_non_null!(values);
  }
  let table = unsafe { &mut *(table as *mut PackedTable) };
  let rows = unsafe { std::slice::from_raw_parts(rows, n) };
  let values = unsafe { std::slice::from_raw_parts(values, n) };
  try_ffi!(table.batch_set_col(rows, col, values));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_batch_group_lookup(
  table: *const c_void,
  rows: *const size_t,
  n: size_t,
  dst: *mut u32,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(rows);
    require_non_null!(dst);
  }
  let table = unsafe { &*(table as *const PackedTable) };
  let rows = unsafe { std::slice::from_raw_parts(rows, n) };
  let dst = unsafe { std::slice::from_raw_parts_mut(dst, n) };
  try_ffi!(table.batch_group_lookup(rows, dst));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_batch_set_group(
  table: *mut c_void,
  rows: *const size_t,
  n: size_t,
  groups: *const u32,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(rows);
    require_non_null!(groups);
  }
  let table = unsafe { &mut *(table as *mut PackedTable) };
  let rows = unsafe { std::slice::from_raw_parts(rows, n) };
  let groups = unsafe { std::slice::from_raw_parts(groups, n) };
  try_ffi!(table.batch_set_group(rows, groups));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_set_col_range(
  table: *mut c_void,
  start: size_t,
  col: size_t,
  values: *const i64,
  n: size_t,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(values);
  }
  let table = unsafe { &mut *(table as *mut PackedTable) };
  let values = unsafe { std::slice::from_raw_parts(values, n) };
  try_ffi!(table.set_col_range(start, col, values));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_set_group_range(
  table: *mut c_void,
  start: size_t,
  groups: *const u32,
  n: size_t,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(groups);
  }
  let table = unsafe { &mut *(table as *mut PackedTable) };
  let groups = unsafe { std::slice::from_raw_parts(groups, n) };
  try_ffi!(table.set_group_range(start, groups));
  FtgsFfiError::Success
}

/// `bits` is a byte array, one entry per row, nonzero meaning "true".
#[no_mangle]
pub unsafe extern "C" fn ftgs_packed_table_bit_set_regroup(
  table: *mut c_void,
  bits: *const u8,
  n: size_t,
  target: u32,
  neg: u32,
  pos: u32,
) -> FtgsFfiError {
  require_non_null!(table);
  if n > 0 {
    require_non_null!(bits);
  }
  let table = unsafe { &mut *(table as *mut PackedTable) };
  let bits = unsafe { std::slice::from_raw_parts(bits, n) };
  let bits: Vec<bool> = bits.iter().map(|&b| b != 0).collect();
  try_ffi!(table.bit_set_regroup(&bits, target, neg, pos));
  FtgsFfiError::Success
}

// ---- Remap ---------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn ftgs_remap_docs_in_target_groups(
  doc_id_group: *const c_void,
  doc_ids: *const u32,
  n_doc_ids: size_t,
  remappings: *const i64,
  n_remappings: size_t,
  placeholder: i64,
  results: *mut i64,
  n_results: size_t,
) -> FtgsFfiError {
  require_non_null!(doc_id_group);
  if n_doc_ids > 0 {
    require_non_null!(doc_ids);
  }
  if n_remappings > 0 {
    require_non_null!(remappings);
  }
  require_non_null!(results);

  let table = unsafe { &*(doc_id_group as *const PackedTable) };
  let doc_ids = unsafe { std::slice::from_raw_parts(doc_ids, n_doc_ids) };
  let remappings = unsafe { std::slice::from_raw_parts(remappings, n_remappings) };
  let results = unsafe { std::slice::from_raw_parts_mut(results, n_results) };

  try_ffi!(ftgs::remap_docs_in_target_groups(
    table,
    doc_ids,
    remappings,
    placeholder,
    results,
  ));
  FtgsFfiError::Success
}

// ---- Session --------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn ftgs_session_create(out: *mut *mut c_void) -> FtgsFfiError {
  require_non_null!(out);
  let session = Session::new(SessionConfig::default());
  unsafe { *out = Box::into_raw(Box::new(session)) as *mut c_void };
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_session_destroy(session: *mut c_void) {
  if !session.is_null() {
    unsafe { drop(Box::from_raw(session as *mut Session)) };
  }
}

/// Registers a shard, taking ownership of `table` (the session now owns
/// and frees it; the caller must not call `ftgs_packed_table_destroy` on
/// it afterward).
#[no_mangle]
pub unsafe extern "C" fn ftgs_session_register_shard(
  session: *mut c_void,
  table: *mut c_void,
  out_shard_idx: *mut size_t,
) -> FtgsFfiError {
  require_non_null!(session);
  require_non_null!(table);
  require_non_null!(out_shard_idx);
  let session = unsafe { &mut *(session as *mut Session) };
  let table = unsafe { *Box::from_raw(table as *mut PackedTable) };
  let shard_idx = try_ffi!(session.register_shard(table));
  unsafe { *out_shard_idx = shard_idx };
  FtgsFfiError::Success
}

// ---- Worker -----------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn ftgs_worker_create(out: *mut *mut c_void) -> FtgsFfiError {
  require_non_null!(out);
  let worker = Worker::new(WorkerConfig::default());
  unsafe { *out = Box::into_raw(Box::new(worker)) as *mut c_void };
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_worker_destroy(worker: *mut c_void) {
  if !worker.is_null() {
    unsafe { drop(Box::from_raw(worker as *mut Worker)) };
  }
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_worker_reset_accumulator(worker: *mut c_void) -> FtgsFfiError {
  require_non_null!(worker);
  let worker = unsafe { &mut *(worker as *mut Worker) };
  worker.reset_accumulator();
  FtgsFfiError::Success
}

/// Runs one TGS pass over an already-decoded chunk of doc ids against a
/// single shard, allocating the worker's accumulator on first use.
#[no_mangle]
pub unsafe extern "C" fn ftgs_worker_run_tgs_pass(
  worker: *mut c_void,
  session: *const c_void,
  shard_idx: size_t,
  doc_ids: *const u32,
  n_doc_ids: size_t,
  n_groups: size_t,
) -> FtgsFfiError {
  require_non_null!(worker);
  require_non_null!(session);
  if n_doc_ids > 0 {
    require_non_null!(doc_ids);
  }
  let worker = unsafe { &mut *(worker as *mut Worker) };
  let session = unsafe { &*(session as *const Session) };
  let doc_ids = unsafe { std::slice::from_raw_parts(doc_ids, n_doc_ids) };
  try_ffi!(worker.run_tgs_pass(session, shard_idx, doc_ids, n_groups));
  FtgsFfiError::Success
}

/// Runs a full TGS pass over `n_slices` shard slices, each a
/// delta-varint-encoded doc-id byte stream: `slice_shard_idxs[i]` names
/// the shard, `slice_bytes[i]`/`slice_byte_lens[i]` the compressed doc-id
/// stream for that slice. Mirrors `execute_pass` in the core library.
#[no_mangle]
pub unsafe extern "C" fn ftgs_worker_execute_pass(
  worker: *mut c_void,
  session: *const c_void,
  n_groups: size_t,
  slice_shard_idxs: *const size_t,
  slice_bytes: *const *const u8,
  slice_byte_lens: *const size_t,
  n_slices: size_t,
) -> FtgsFfiError {
  require_non_null!(worker);
  require_non_null!(session);
  if n_slices > 0 {
    require_non_null!(slice_shard_idxs);
    require_non_null!(slice_bytes);
    require_non_null!(slice_byte_lens);
  }
  let worker = unsafe { &mut *(worker as *mut Worker) };
  let session = unsafe { &*(session as *const Session) };
  let shard_idxs = unsafe { std::slice::from_raw_parts(slice_shard_idxs, n_slices) };
  let byte_ptrs = unsafe { std::slice::from_raw_parts(slice_bytes, n_slices) };
  let byte_lens = unsafe { std::slice::from_raw_parts(slice_byte_lens, n_slices) };

  let mut slices = Vec::with_capacity(n_slices);
  for i in 0..n_slices {
    let ptr = byte_ptrs[i];
    let len = byte_lens[i];
    let bytes: Vec<u8> = if len == 0 {
      Vec::new()
    } else {
      if ptr.is_null() {
        return FtgsFfiError::NullPointer;
      }
      unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
    };
    slices.push(TermSlice::new(shard_idxs[i], bytes));
  }

  let desc = PassDescriptor::new(n_groups, slices);
  try_ffi!(worker.execute_pass(session, &desc));
  FtgsFfiError::Success
}

#[no_mangle]
pub unsafe extern "C" fn ftgs_worker_get_stat(
  worker: *const c_void,
  group: size_t,
  col: size_t,
  out: *mut i64,
) -> FtgsFfiError {
  require_non_null!(worker);
  require_non_null!(out);
  let worker = unsafe { &*(worker as *const Worker) };
  let accum = match worker.accumulator() {
    Some(accum) => accum,
    None => return FtgsFfiError::OutOfRange,
  };
  let value = try_ffi!(accum.get(group, col));
  unsafe { *out = value };
  FtgsFfiError::Success
}
