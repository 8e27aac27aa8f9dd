use std::{io, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align,
  error::{AllocError, Result},
  heap::HeapExtender,
};

/// Heap extender that moves the process's program break with `sbrk(2)`.
///
/// Other code in the process may move the break too (the C library's own
/// `malloc` does). Blocks therefore only count as "at the end of the heap"
/// when their end matches the break observed under the allocator's lock.
#[derive(Debug, Default)]
pub struct Sbrk {
  _private: (),
}

impl Sbrk {
  pub const fn new() -> Self {
    Self { _private: () }
  }
}

fn failed(address: *mut c_void) -> bool {
  address == usize::MAX as *mut c_void
}

impl HeapExtender for Sbrk {
  unsafe fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    let out_of_memory = || AllocError::OutOfMemory { requested: bytes };

    unsafe {
      // Someone else may have left the break misaligned. The padding goes
      // into the same call so a failure leaves the break untouched.
      let current = sbrk(0) as usize;
      let padding = align!(current) - current;
      let increment = bytes
        .checked_add(padding)
        .and_then(|total| intptr_t::try_from(total).ok())
        .ok_or_else(out_of_memory)?;

      let address = sbrk(increment);

      if failed(address) {
        return Err(out_of_memory());
      }

      NonNull::new(address.cast::<u8>().add(padding)).ok_or_else(out_of_memory)
    }
  }

  unsafe fn shrink(
    &mut self,
    bytes: usize,
  ) -> Result<()> {
    let decrement = intptr_t::try_from(bytes).map_err(|_| AllocError::ShrinkFailed {
      bytes,
      source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;

    if failed(unsafe { sbrk(-decrement) }) {
      return Err(AllocError::ShrinkFailed {
        bytes,
        source: io::Error::last_os_error(),
      });
    }

    Ok(())
  }

  fn current_break(&self) -> *mut u8 {
    unsafe { sbrk(0).cast::<u8>() }
  }
}
