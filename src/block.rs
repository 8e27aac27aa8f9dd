use std::{mem, ptr::NonNull};

use crate::{align, align::checked_align};

/// Word stamped into every header when the `debug-guard` feature is on.
#[cfg(feature = "debug-guard")]
pub(crate) const GUARD: usize = 0xB10C_4EAD_B10C_4EAD_u64 as usize;

/// Metadata placed immediately before every payload.
///
/// Headers double as the nodes of the allocator's block list: `next` links
/// blocks in creation order, which is also ascending address order because
/// the heap only ever grows at its end.
#[repr(C)]
pub(crate) struct Block {
  /// Usable payload size requested when the block was created.
  pub size: usize,
  pub is_free: bool,
  pub next: *mut Block,
  #[cfg(feature = "debug-guard")]
  pub guard: usize,
}

/// Size of a block header, padded so the payload after it is aligned to
/// [`MAX_ALIGN`](crate::align::MAX_ALIGN).
pub const HEADER_SIZE: usize = align!(mem::size_of::<Block>());

impl Block {
  pub fn new(
    size: usize,
    is_free: bool,
    next: *mut Block,
  ) -> Self {
    Self {
      size,
      is_free,
      next,
      #[cfg(feature = "debug-guard")]
      guard: GUARD,
    }
  }

  /// Bytes a block with a `size`-byte payload occupies on the heap, or
  /// `None` if that does not fit in `usize`.
  pub const fn extent_for(size: usize) -> Option<usize> {
    match checked_align(size) {
      Some(padded) => padded.checked_add(HEADER_SIZE),
      None => None,
    }
  }

  /// Bytes this block occupies on the heap, header included.
  pub fn extent(&self) -> usize {
    HEADER_SIZE + align!(self.size)
  }

  /// Writes a fresh in-use header at `at` and returns it.
  ///
  /// # Safety
  ///
  /// `at` must be aligned to `MAX_ALIGN` and valid for writes of at least
  /// `Block::extent_for(size)` bytes.
  pub unsafe fn write(
    at: NonNull<u8>,
    size: usize,
  ) -> NonNull<Block> {
    let block = at.cast::<Block>();
    unsafe { block.as_ptr().write(Block::new(size, false, std::ptr::null_mut())) };
    block
  }

  /// Address of the first payload byte of `block`.
  pub fn payload(block: NonNull<Block>) -> NonNull<u8> {
    // SAFETY: the payload lies inside the same heap allocation as its header.
    unsafe { block.cast::<u8>().add(HEADER_SIZE) }
  }

  /// Recovers the header of a payload pointer handed out by the allocator.
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`].
  pub unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Block> {
    unsafe { payload.sub(HEADER_SIZE).cast::<Block>() }
  }

  /// One past the last byte of `block`'s extent.
  ///
  /// # Safety
  ///
  /// `block` must point to a live header.
  pub unsafe fn end(block: NonNull<Block>) -> *mut u8 {
    unsafe {
      let extent = (*block.as_ptr()).extent();
      block.as_ptr().cast::<u8>().wrapping_add(extent)
    }
  }

  #[cfg(feature = "debug-guard")]
  pub fn is_intact(&self) -> bool {
    self.guard == GUARD
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::MAX_ALIGN;

  #[repr(C, align(16))]
  struct Arena([u8; 256]);

  #[test]
  fn test_header_size_is_aligned() {
    assert_eq!(HEADER_SIZE % MAX_ALIGN, 0);
    assert!(HEADER_SIZE >= mem::size_of::<Block>());
  }

  #[test]
  fn test_extent() {
    assert_eq!(Block::extent_for(1), Some(HEADER_SIZE + 16));
    assert_eq!(Block::extent_for(16), Some(HEADER_SIZE + 16));
    assert_eq!(Block::extent_for(17), Some(HEADER_SIZE + 32));
    assert_eq!(Block::extent_for(usize::MAX), None);
    assert_eq!(Block::extent_for(usize::MAX - HEADER_SIZE), None);

    let block = Block::new(40, false, std::ptr::null_mut());
    assert_eq!(block.extent(), HEADER_SIZE + 48);
  }

  #[test]
  fn test_payload_round_trip() {
    let mut arena = Arena([0; 256]);
    let at = NonNull::new(arena.0.as_mut_ptr()).unwrap();

    unsafe {
      let block = Block::write(at, 40);
      let payload = Block::payload(block);

      assert_eq!(payload.as_ptr() as usize - at.as_ptr() as usize, HEADER_SIZE);
      assert_eq!(payload.as_ptr() as usize % MAX_ALIGN, 0);
      assert_eq!(Block::from_payload(payload), block);
      assert_eq!(Block::end(block), at.as_ptr().add(HEADER_SIZE + 48));

      let header = &*block.as_ptr();
      assert_eq!(header.size, 40);
      assert!(!header.is_free);
      assert!(header.next.is_null());
    }
  }
}
