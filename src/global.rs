use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use crate::{allocator::Allocator, heap::HeapExtender, sbrk::Sbrk};

/// The process-wide heap. Starts empty, is never torn down; blocks still
/// linked at exit are simply abandoned.
static PROCESS_HEAP: Allocator<Sbrk> = Allocator::new(Sbrk::new());

/// Returns the allocator that owns the process's program break.
///
/// ```rust,no_run
/// let heap = brkalloc::process_heap();
///
/// let ptr = heap.allocate(64);
/// assert!(!ptr.is_null());
/// unsafe { heap.free(ptr) };
/// ```
pub fn process_heap() -> &'static Allocator<Sbrk> {
  &PROCESS_HEAP
}

/// Lets any [`Allocator`] back Rust's `alloc` APIs, including as
/// `#[global_allocator]`.
unsafe impl<H: HeapExtender + Send> GlobalAlloc for Allocator<H> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    self
      .try_allocate_aligned(layout.size(), layout.align())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    match self.try_allocate_aligned(layout.size(), layout.align()) {
      Ok(payload) => {
        unsafe { ptr::write_bytes(payload.as_ptr(), 0, layout.size()) };
        payload.as_ptr()
      }
      Err(_) => ptr::null_mut(),
    }
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.free(ptr) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { self.try_resize_aligned(ptr, new_size, layout.align()) }
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}
