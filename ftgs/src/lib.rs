//! `ftgs` implements the field/term/group/stats inner loop: a bit-packed
//! columnar row store (`PackedTable`), a group-indexed accumulator
//! (`UnpackedTable`), and the streaming pass that unpacks doc rows and
//! sums their columns into per-group totals.
//!
//! # API notes
//!
//! * Cell accessors (`get_cell`/`set_cell`/`get_group`/`set_group`) always
//! bounds-check and return a [`FtgsResult`]. The hot pass
//! ([`pipeline::run_tgs_pass`], [`remap::remap_docs_in_target_groups`])
//! checks doc/group ids up front and fails the whole call before
//! touching any row, unless [`config::BoundsMode::Unchecked`] is
//! configured and the crate is built with the `unchecked-release`
//! feature.
//! * Integer columns accumulate in real (unbiased) units: a column
//! declared `[min, max]` stores `value - min` on the wire, but
//! `get_cell` and the unpack step both add `min` back before the value
//! is read or summed, so `UnpackedTable::get(group, col)` is always a
//! true sum of the column across that group's docs.

#![deny(clippy::unused_unit)]
#![deny(dead_code)]

pub use config::{BoundsMode, SessionConfig, WorkerConfig};
pub use errors::{ErrorKind, FtgsError, FtgsResult};
pub use packed_table::{ColumnSpec, PackedTable};
pub use pass::{PassDescriptor, TermSlice};
pub use pipeline::{run_tgs_pass, unpack_row};
pub use remap::remap_docs_in_target_groups;
pub use session::{Session, Shard};
pub use unpacked_table::{TableLayout, UnpackedTable};
pub use worker::Worker;

mod bit_tree;
mod bits;
mod config;
pub mod constants;
pub mod errors;
mod lane;
mod packed_table;
mod pass;
mod pipeline;
mod remap;
mod session;
mod staging;
mod unpacked_table;
pub mod varint;
mod worker;

#[cfg(test)]
mod tests;
