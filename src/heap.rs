use std::ptr::NonNull;

use crate::error::Result;

/// Source of contiguous heap memory.
///
/// An extender behaves like a program break: [`grow`](Self::grow) hands out
/// the bytes immediately after the previous end of heap, and
/// [`shrink`](Self::shrink) takes back the bytes at the very end.
///
/// Implementations are not reentrant. [`Allocator`](crate::Allocator) only
/// calls them while holding its lock.
pub trait HeapExtender {
  /// Extends the heap by exactly `bytes` and returns the start of the new
  /// region. Either the whole request succeeds or nothing changes.
  ///
  /// # Safety
  ///
  /// Callers must serialize all calls on this extender.
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>>;

  /// Releases the last `bytes` of the heap.
  ///
  /// # Safety
  ///
  /// Callers must serialize all calls on this extender and guarantee that
  /// nothing still references the released bytes.
  unsafe fn shrink(
    &mut self,
    bytes: usize,
  ) -> Result<()>;

  /// Current end of the heap.
  fn current_break(&self) -> *mut u8;
}

/// Running totals kept by [`Counting`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtenderCounters {
  pub grows: usize,
  pub failed_grows: usize,
  pub shrinks: usize,
  pub grown_bytes: usize,
  pub shrunk_bytes: usize,
  pub last_grow: Option<usize>,
  pub last_shrink: Option<usize>,
}

impl ExtenderCounters {
  const ZERO: Self = Self {
    grows: 0,
    failed_grows: 0,
    shrinks: 0,
    grown_bytes: 0,
    shrunk_bytes: 0,
    last_grow: None,
    last_shrink: None,
  };
}

/// Wraps an extender and records every call that reaches it.
pub struct Counting<H> {
  inner: H,
  counters: ExtenderCounters,
}

impl<H> Counting<H> {
  pub const fn new(inner: H) -> Self {
    Self {
      inner,
      counters: ExtenderCounters::ZERO,
    }
  }

  pub fn counters(&self) -> ExtenderCounters {
    self.counters
  }

  pub fn inner(&self) -> &H {
    &self.inner
  }
}

impl<H: HeapExtender> HeapExtender for Counting<H> {
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    match unsafe { self.inner.grow(bytes) } {
      Ok(address) => {
        self.counters.grows += 1;
        self.counters.grown_bytes += bytes;
        self.counters.last_grow = Some(bytes);
        Ok(address)
      }
      Err(err) => {
        self.counters.failed_grows += 1;
        Err(err)
      }
    }
  }

  unsafe fn shrink(
    &mut self,
    bytes: usize,
  ) -> Result<()> {
    unsafe { self.inner.shrink(bytes) }?;
    self.counters.shrinks += 1;
    self.counters.shrunk_bytes += bytes;
    self.counters.last_shrink = Some(bytes);
    Ok(())
  }

  fn current_break(&self) -> *mut u8 {
    self.inner.current_break()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{AllocError, Region};

  #[test]
  fn test_counting_records_calls() {
    let mut heap = Counting::new(Region::new(4096).unwrap());

    unsafe {
      let first = heap.grow(64).unwrap();
      let second = heap.grow(32).unwrap();
      assert_eq!(second.as_ptr(), first.as_ptr().add(64));

      heap.shrink(32).unwrap();
      assert_eq!(heap.current_break(), second.as_ptr());

      assert!(matches!(heap.grow(8192), Err(AllocError::OutOfMemory { requested: 8192 })));
    }

    let counters = heap.counters();
    assert_eq!(counters.grows, 2);
    assert_eq!(counters.failed_grows, 1);
    assert_eq!(counters.grown_bytes, 96);
    assert_eq!(counters.shrinks, 1);
    assert_eq!(counters.last_grow, Some(32));
    assert_eq!(counters.last_shrink, Some(32));
    assert_eq!(heap.inner().used(), 64);
  }
}
