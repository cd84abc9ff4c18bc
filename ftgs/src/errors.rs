use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fmt;

/// The different kinds of errors the library can return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
  /// `InvalidArgument` errors occur when constructing a table, session, or
  /// worker with parameters that can never be made to work: an empty column
  /// range, a row count of 0, a layout whose offsets disagree with its
  /// sizes, and so on.
  InvalidArgument,
  /// `OutOfRange` errors occur when a row id, group id, or column id passed
  /// at call time falls outside the bounds fixed at construction time. In
  /// `unchecked-release` builds these checks are skipped (see
  /// [`crate::config::BoundsMode`]) and this kind is only ever seen in
  /// debug assertions.
  OutOfRange,
  /// `LayoutMismatch` errors occur when two tables that are expected to
  /// share a row layout (for instance a `PackedTable` and the
  /// `UnpackedTable` accumulating its columns) turn out not to.
  LayoutMismatch,
  /// `RemapConflict` errors occur when `remap_docs_in_target_groups` is
  /// called with a placeholder sentinel and finds a doc whose current
  /// result has already been overwritten by something other than the
  /// placeholder.
  RemapConflict,
  /// `EmptyTerm` errors occur when `execute_pass` is asked to run a TGS
  /// pass with zero slices. Reported, not fatal; the accumulator is left
  /// untouched.
  EmptyTerm,
}

/// The error type used in results for all `ftgs` functionality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtgsError {
  pub kind: ErrorKind,
  pub message: String,
}

impl FtgsError {
  pub(crate) fn new<S: AsRef<str>>(kind: ErrorKind, message: S) -> Self {
    FtgsError {
      kind,
      message: message.as_ref().to_string(),
    }
  }

  pub(crate) fn invalid_argument<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::InvalidArgument, message)
  }

  pub(crate) fn out_of_range<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::OutOfRange, message)
  }

  pub(crate) fn layout_mismatch<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::LayoutMismatch, message)
  }

  pub(crate) fn remap_conflict<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::RemapConflict, message)
  }

  pub(crate) fn empty_term<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::EmptyTerm, message)
  }
}

impl Display for FtgsError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "ftgs {:?} error: {}", self.kind, &self.message)
  }
}

impl Error for FtgsError {}

pub type FtgsResult<T> = Result<T, FtgsError>;
