use std::{io, ptr::NonNull};

use libc::{
  MADV_DONTNEED, MAP_ANONYMOUS, MAP_FAILED, MAP_NORESERVE, MAP_PRIVATE, PROT_READ, PROT_WRITE,
  _SC_PAGESIZE, c_void, madvise, mmap, munmap, sysconf,
};

use crate::{
  align_to,
  error::{AllocError, Result},
  heap::HeapExtender,
};

/// Heap extender over a private, fixed-size `mmap` reservation.
///
/// A `Region` keeps its own break cursor instead of touching the process
/// break, so several allocators can live side by side and running out of
/// memory is deterministic. Pages above the cursor are handed back to the
/// kernel on shrink; the reservation itself is unmapped on drop, which
/// invalidates every pointer still served from it.
///
/// ```text
///   base                      base + brk                  base + capacity
///   ┌──────────────────────────┬────────────────────────────┐
///   │      grown blocks        │        reserved            │
///   └──────────────────────────┴────────────────────────────┘
/// ```
#[derive(Debug)]
pub struct Region {
  base: NonNull<u8>,
  capacity: usize,
  mapped: usize,
  brk: usize,
}

// SAFETY: the mapping is owned exclusively by this value.
unsafe impl Send for Region {}

fn page_size() -> usize {
  match unsafe { sysconf(_SC_PAGESIZE) } {
    size if size > 0 => size as usize,
    _ => 4096,
  }
}

impl Region {
  /// Reserves `capacity` bytes of address space.
  pub fn new(capacity: usize) -> Result<Self> {
    let page = page_size();
    let mapped = capacity
      .checked_add(page - 1)
      .map(|padded| padded & !(page - 1))
      .filter(|&mapped| mapped > 0)
      .ok_or_else(|| AllocError::Reserve {
        bytes: capacity,
        source: io::Error::from(io::ErrorKind::InvalidInput),
      })?;

    let address = unsafe {
      mmap(
        std::ptr::null_mut(),
        mapped,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(AllocError::Reserve {
        bytes: capacity,
        source: io::Error::last_os_error(),
      });
    }

    let base = NonNull::new(address.cast::<u8>()).ok_or_else(|| AllocError::Reserve {
      bytes: capacity,
      source: io::Error::from(io::ErrorKind::AddrNotAvailable),
    })?;

    Ok(Self {
      base,
      capacity,
      mapped,
      brk: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes currently grown.
  pub fn used(&self) -> usize {
    self.brk
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }
}

impl HeapExtender for Region {
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    if bytes > self.capacity - self.brk {
      return Err(AllocError::OutOfMemory { requested: bytes });
    }

    let address = unsafe { self.base.add(self.brk) };
    self.brk += bytes;

    Ok(address)
  }

  unsafe fn shrink(
    &mut self,
    bytes: usize,
  ) -> Result<()> {
    if bytes > self.brk {
      return Err(AllocError::ShrinkUnderflow {
        requested: bytes,
        available: self.brk,
      });
    }

    let old_end = align_to!(self.brk, page_size());
    self.brk -= bytes;
    let first_free_page = align_to!(self.brk, page_size());

    if first_free_page < old_end {
      // Dropping the pages is advisory; the cursor has already moved.
      unsafe {
        madvise(
          self.base.as_ptr().add(first_free_page).cast::<c_void>(),
          old_end - first_free_page,
          MADV_DONTNEED,
        );
      }
    }

    Ok(())
  }

  fn current_break(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.brk)
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe {
      munmap(self.base.as_ptr().cast::<c_void>(), self.mapped);
    }
  }
}
