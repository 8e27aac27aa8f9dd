//! C allocation entry points backed by [`process_heap`].
//!
//! Built with the `malloc-interpose` feature, the `cdylib` exports the
//! standard allocation symbols and can replace the C library's allocator:
//!
//! ```text
//! cargo build --release --features malloc-interpose
//! LD_PRELOAD=target/release/libbrkalloc.so ./program
//! ```
//!
//! Payloads are aligned to [`MAX_ALIGN`](crate::align::MAX_ALIGN), which
//! covers every scalar type the C ABI asks `malloc` to support.

use std::{mem, ptr};

use libc::{c_int, c_void, size_t};

use crate::{error::AllocError, global::process_heap};

#[unsafe(no_mangle)]
pub extern "C" fn malloc(size: size_t) -> *mut c_void {
  process_heap().allocate(size).cast()
}

#[unsafe(no_mangle)]
pub extern "C" fn calloc(
  count: size_t,
  elem_size: size_t,
) -> *mut c_void {
  process_heap().zero_allocate(count, elem_size).cast()
}

/// # Safety
///
/// `ptr` must be null or a live pointer returned by these functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: size_t,
) -> *mut c_void {
  unsafe { process_heap().resize(ptr.cast(), size).cast() }
}

/// # Safety
///
/// `ptr` must be null or a live pointer returned by these functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  unsafe { process_heap().free(ptr.cast()) }
}

/// # Safety
///
/// `memptr` must be valid for a pointer-sized write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_memalign(
  memptr: *mut *mut c_void,
  align: size_t,
  size: size_t,
) -> c_int {
  if align % mem::size_of::<*mut c_void>() != 0 {
    return libc::EINVAL;
  }

  let payload = match process_heap().try_allocate_aligned(size, align) {
    Ok(payload) => payload.as_ptr(),
    Err(AllocError::ZeroSize) => ptr::null_mut(),
    Err(AllocError::InvalidAlignment { .. }) => return libc::EINVAL,
    Err(_) => return libc::ENOMEM,
  };

  unsafe { *memptr = payload.cast() };
  0
}

#[unsafe(no_mangle)]
pub extern "C" fn aligned_alloc(
  align: size_t,
  size: size_t,
) -> *mut c_void {
  process_heap()
    .try_allocate_aligned(size, align)
    .map_or(ptr::null_mut(), |payload| payload.as_ptr().cast())
}

#[unsafe(no_mangle)]
pub extern "C" fn memalign(
  align: size_t,
  size: size_t,
) -> *mut c_void {
  aligned_alloc(align, size)
}

/// # Safety
///
/// `ptr` must be null or a live pointer returned by these functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> size_t {
  unsafe { process_heap().usable_size(ptr.cast_const().cast()) }
}
