use std::io;

use thiserror::Error;

/// Errors reported by the allocator and its heap extenders.
///
/// The pointer-returning operations collapse every variant into a null
/// pointer; the `try_*` operations hand the variant back to the caller.
#[derive(Error, Debug)]
pub enum AllocError {
  /// A zero-byte request, or a zero count or element size.
  #[error("zero-sized allocation request")]
  ZeroSize,

  /// `count * elem_size` does not fit in `usize`.
  #[error("allocation size overflow: {count} elements of {elem_size} bytes")]
  Overflow {
    /// Number of elements requested.
    count: usize,
    /// Size of one element.
    elem_size: usize,
  },

  /// The heap could not be grown by the requested amount.
  #[error("out of memory: heap cannot grow by {requested} bytes")]
  OutOfMemory {
    /// Bytes that were requested from the extender.
    requested: usize,
  },

  /// A requested alignment that is not a power of two.
  #[error("alignment {align} is not a power of two")]
  InvalidAlignment {
    /// Requested alignment.
    align: usize,
  },

  /// A shrink asked to release more than the extender has handed out.
  #[error("cannot release {requested} bytes, only {available} in use")]
  ShrinkUnderflow {
    /// Bytes the caller tried to release.
    requested: usize,
    /// Bytes currently grown.
    available: usize,
  },

  /// The operating system refused to move the program break back.
  #[error("failed to return {bytes} bytes to the operating system")]
  ShrinkFailed {
    /// Bytes the caller tried to release.
    bytes: usize,
    /// Underlying OS error.
    #[source]
    source: io::Error,
  },

  /// Address space for a [`Region`](crate::Region) could not be reserved.
  #[error("failed to reserve {bytes} bytes of address space")]
  Reserve {
    /// Size of the attempted reservation.
    bytes: usize,
    /// Underlying OS error.
    #[source]
    source: io::Error,
  },

  /// The block list violates one of its structural invariants.
  #[error("free list corrupted: {0}")]
  Corrupted(&'static str),
}

/// Coarse classification of an [`AllocError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Rejected before touching the heap: zero sizes, overflow, bad alignment.
  InvalidArgument,
  /// The heap could not grow.
  OutOfMemory,
  /// The backing platform primitive failed for another reason.
  Platform,
  /// Internal structures are inconsistent, usually after caller misuse.
  Corrupted,
}

impl AllocError {
  /// Returns the class this error belongs to.
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::ZeroSize | Self::Overflow { .. } | Self::InvalidAlignment { .. } => {
        ErrorClass::InvalidArgument
      }
      Self::OutOfMemory { .. } => ErrorClass::OutOfMemory,
      Self::ShrinkUnderflow { .. } | Self::ShrinkFailed { .. } | Self::Reserve { .. } => {
        ErrorClass::Platform
      }
      Self::Corrupted(_) => ErrorClass::Corrupted,
    }
  }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AllocError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classes() {
    assert_eq!(AllocError::ZeroSize.class(), ErrorClass::InvalidArgument);
    assert_eq!(
      AllocError::Overflow { count: 2, elem_size: usize::MAX }.class(),
      ErrorClass::InvalidArgument
    );
    assert_eq!(AllocError::OutOfMemory { requested: 64 }.class(), ErrorClass::OutOfMemory);
    assert_eq!(AllocError::Corrupted("cycle").class(), ErrorClass::Corrupted);
  }

  #[test]
  fn test_messages() {
    assert_eq!(
      AllocError::OutOfMemory { requested: 48 }.to_string(),
      "out of memory: heap cannot grow by 48 bytes"
    );
    assert_eq!(
      AllocError::InvalidAlignment { align: 24 }.to_string(),
      "alignment 24 is not a power of two"
    );
  }
}
