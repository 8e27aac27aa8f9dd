use std::{
  marker::PhantomData,
  ptr::{self, NonNull},
};

use crate::{
  block::Block,
  error::{AllocError, Result},
};

/// Totals gathered by walking the block list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Blocks linked in the list.
  pub blocks: usize,
  /// Blocks flagged free and waiting for reuse.
  pub free_blocks: usize,
  /// Payload bytes held by free blocks.
  pub free_bytes: usize,
  /// Payload bytes held by blocks handed out to callers.
  pub used_bytes: usize,
  /// Heap bytes covered by all blocks, headers and padding included.
  pub heap_bytes: usize,
}

/// Intrusive singly-linked list of every block the allocator has created.
///
/// Blocks are linked in creation order, which is ascending address order.
/// Only the tail may ever be unlinked. Finding its predecessor means walking
/// from `head`, so [`detach_tail`](Self::detach_tail) is O(n); there are no
/// back-pointers in the headers.
pub(crate) struct FreeList {
  head: *mut Block,
  tail: *mut Block,
}

// SAFETY: the list is only reached through the allocator's mutex.
unsafe impl Send for FreeList {}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
      tail: ptr::null_mut(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_null()
  }

  #[cfg(test)]
  pub fn head(&self) -> Option<NonNull<Block>> {
    NonNull::new(self.head)
  }

  #[cfg(test)]
  pub fn tail(&self) -> Option<NonNull<Block>> {
    NonNull::new(self.tail)
  }

  pub fn is_tail(
    &self,
    block: NonNull<Block>,
  ) -> bool {
    self.tail == block.as_ptr()
  }

  /// Walks the blocks from `head`.
  ///
  /// # Safety
  ///
  /// Every linked header must be live for as long as the iterator is used.
  pub unsafe fn iter(&self) -> Blocks<'_> {
    Blocks {
      current: self.head,
      _list: PhantomData,
    }
  }

  /// First-fit search: the first free block, in list order, whose payload is
  /// at least `min_size` bytes. Oversized blocks are returned whole.
  ///
  /// # Safety
  ///
  /// Every linked header must be live.
  pub unsafe fn find_reusable(
    &self,
    min_size: usize,
  ) -> Option<NonNull<Block>> {
    unsafe {
      self.iter().find(|block| {
        let header = &*block.as_ptr();
        header.is_free && header.size >= min_size
      })
    }
  }

  /// [`find_reusable`](Self::find_reusable), additionally requiring the
  /// payload to sit on an `align` boundary.
  ///
  /// # Safety
  ///
  /// Every linked header must be live.
  pub unsafe fn find_reusable_aligned(
    &self,
    min_size: usize,
    align: usize,
  ) -> Option<NonNull<Block>> {
    unsafe {
      self.iter().find(|&block| {
        let header = &*block.as_ptr();
        header.is_free
          && header.size >= min_size
          && Block::payload(block).as_ptr() as usize % align == 0
      })
    }
  }

  /// Links `block` as the new tail.
  ///
  /// # Safety
  ///
  /// `block` must be a live header that is not already linked, and must lie
  /// above every linked block.
  pub unsafe fn append(
    &mut self,
    block: NonNull<Block>,
  ) {
    unsafe {
      (*block.as_ptr()).next = ptr::null_mut();

      if self.head.is_null() {
        self.head = block.as_ptr();
      } else {
        (*self.tail).next = block.as_ptr();
      }
    }

    self.tail = block.as_ptr();
  }

  /// Unlinks and returns the tail. The detached header itself is never read,
  /// so its memory may already have been handed back.
  ///
  /// # Safety
  ///
  /// Every linked header other than the tail must be live.
  pub unsafe fn detach_tail(&mut self) -> Option<NonNull<Block>> {
    let tail = NonNull::new(self.tail)?;

    if self.head == self.tail {
      self.head = ptr::null_mut();
      self.tail = ptr::null_mut();
      return Some(tail);
    }

    unsafe {
      let mut current = self.head;
      while (*current).next != self.tail {
        current = (*current).next;
      }

      (*current).next = ptr::null_mut();
      self.tail = current;
    }

    Some(tail)
  }

  /// Checks the list's structural invariants and totals its blocks.
  ///
  /// Links must strictly ascend in address, which also rules out cycles. The
  /// walk must end at `tail`, and `head` and `tail` must be null together.
  /// Nothing is allocated, so this is safe to call from inside a global
  /// allocator.
  ///
  /// # Safety
  ///
  /// Every linked header must be live.
  pub unsafe fn survey(&self) -> Result<HeapStats> {
    let mut stats = HeapStats::default();

    match (self.head.is_null(), self.tail.is_null()) {
      (true, true) => return Ok(stats),
      (false, false) => {}
      _ => return Err(AllocError::Corrupted("head and tail disagree on emptiness")),
    }

    let mut previous: *mut Block = ptr::null_mut();
    let mut current = self.head;

    unsafe {
      while !current.is_null() {
        if !previous.is_null() && current <= previous {
          return Err(AllocError::Corrupted("link does not ascend in address"));
        }

        let header = &*current;

        #[cfg(feature = "debug-guard")]
        if !header.is_intact() {
          return Err(AllocError::Corrupted("header guard overwritten"));
        }

        stats.blocks += 1;
        stats.heap_bytes += header.extent();
        if header.is_free {
          stats.free_blocks += 1;
          stats.free_bytes += header.size;
        } else {
          stats.used_bytes += header.size;
        }

        previous = current;
        current = header.next;
      }
    }

    if previous != self.tail {
      return Err(AllocError::Corrupted("walk does not end at tail"));
    }

    Ok(stats)
  }
}

/// Iterator over the headers of a [`FreeList`].
pub(crate) struct Blocks<'a> {
  current: *mut Block,
  _list: PhantomData<&'a FreeList>,
}

impl Iterator for Blocks<'_> {
  type Item = NonNull<Block>;

  fn next(&mut self) -> Option<Self::Item> {
    let block = NonNull::new(self.current)?;
    // SAFETY: `FreeList::iter` requires every linked header to be live.
    self.current = unsafe { (*block.as_ptr()).next };
    Some(block)
  }
}
