use std::ptr::{self, NonNull};

use spin::Mutex;

use crate::{
  align,
  align::MAX_ALIGN,
  align_to,
  block::{Block, HEADER_SIZE},
  error::{AllocError, Result},
  free_list::{FreeList, HeapStats},
  heap::HeapExtender,
  logging::heap_log,
};

/// Everything the lock protects: the block list and the extender feeding it.
struct Heap<H> {
  blocks: FreeList,
  extender: H,
}

/// Where an allocation was placed.
enum Placement {
  Reused { block: NonNull<Block>, capacity: usize },
  Grown { block: NonNull<Block>, extent: usize },
}

impl Placement {
  fn block(&self) -> NonNull<Block> {
    match *self {
      Placement::Reused { block, .. } | Placement::Grown { block, .. } => block,
    }
  }
}

/// What happened to a released block.
enum Release {
  /// Flagged free in place.
  Marked,
  /// Unlinked and handed back to the extender.
  Returned(usize),
  /// The extender refused the shrink; the block was relinked as a free tail.
  Kept(AllocError),
}

/// Bytes to grow ahead of a header at `start` so that its payload lands on
/// an `align` boundary. Any non-zero lead must be able to hold a free filler
/// block of its own.
fn lead_for(
  start: usize,
  align: usize,
) -> usize {
  let mut lead = align_to!(start + HEADER_SIZE, align) - HEADER_SIZE - start;
  while lead != 0 && lead < HEADER_SIZE + MAX_ALIGN {
    lead += align;
  }
  lead
}

impl<H: HeapExtender> Heap<H> {
  /// Places a `size`-byte block whose payload is `align`-aligned, where
  /// `align` is a power of two no smaller than `MAX_ALIGN`.
  unsafe fn allocate(
    &mut self,
    size: usize,
    align: usize,
  ) -> Result<Placement> {
    unsafe {
      let reusable = if align <= MAX_ALIGN {
        self.blocks.find_reusable(size)
      } else {
        self.blocks.find_reusable_aligned(size, align)
      };

      if let Some(block) = reusable {
        (*block.as_ptr()).is_free = false;
        let capacity = (*block.as_ptr()).size;
        return Ok(Placement::Reused { block, capacity });
      }

      let extent = Block::extent_for(size).ok_or(AllocError::OutOfMemory { requested: size })?;

      if align > MAX_ALIGN {
        return self.grow_aligned(size, extent, align);
      }

      let address = self.extender.grow(extent)?;

      let block = Block::write(address, size);
      self.blocks.append(block);

      Ok(Placement::Grown { block, extent })
    }
  }

  /// Grows the heap by one request holding a free filler block followed by
  /// the aligned block, so the filler stays reusable and both are ordinary
  /// blocks for `free`.
  unsafe fn grow_aligned(
    &mut self,
    size: usize,
    extent: usize,
    align: usize,
  ) -> Result<Placement> {
    // A second attempt covers a break moved by someone else in between.
    for _ in 0..2 {
      let start = align!(self.extender.current_break() as usize);
      let lead = lead_for(start, align);
      let total = lead
        .checked_add(extent)
        .ok_or(AllocError::OutOfMemory { requested: size })?;

      unsafe {
        let address = self.extender.grow(total)?;

        if address.as_ptr() as usize != start {
          let filler = Block::write(address, total - HEADER_SIZE);
          (*filler.as_ptr()).is_free = true;
          self.blocks.append(filler);
          continue;
        }

        if lead > 0 {
          let filler = Block::write(address, lead - HEADER_SIZE);
          (*filler.as_ptr()).is_free = true;
          self.blocks.append(filler);
        }

        let block = Block::write(address.add(lead), size);
        self.blocks.append(block);

        return Ok(Placement::Grown {
          block,
          extent: total,
        });
      }
    }

    Err(AllocError::OutOfMemory { requested: size })
  }

  unsafe fn release(
    &mut self,
    block: NonNull<Block>,
  ) -> Release {
    unsafe {
      let at_boundary =
        self.blocks.is_tail(block) && Block::end(block) == self.extender.current_break();

      if !at_boundary {
        (*block.as_ptr()).is_free = true;
        return Release::Marked;
      }

      let extent = (*block.as_ptr()).extent();
      self.blocks.detach_tail();

      match self.extender.shrink(extent) {
        Ok(()) => Release::Returned(extent),
        Err(err) => {
          (*block.as_ptr()).is_free = true;
          self.blocks.append(block);
          Release::Kept(err)
        }
      }
    }
  }
}

/// Panics when `block` was not handed out by an allocator or is already free.
///
/// Runs before the lock is taken, since formatting the panic message may
/// allocate.
#[cfg(feature = "debug-guard")]
unsafe fn check_owned(block: NonNull<Block>) {
  let header = unsafe { &*block.as_ptr() };
  let payload = Block::payload(block);

  assert!(
    header.is_intact(),
    "brkalloc: pointer {payload:p} was not allocated by brkalloc"
  );
  assert!(!header.is_free, "brkalloc: pointer {payload:p} released twice");
}

/// First-fit allocator over a single heap grown by `H`.
///
/// All four operations run as one critical section under a single spin lock,
/// so the allocator is safe to share between threads but serializes them.
/// Waiting on the lock never allocates, which keeps it usable as the
/// process's global allocator.
///
/// Releasing or resizing a pointer this allocator did not hand out, releasing
/// it twice, or touching it after release is undefined behavior. The
/// `debug-guard` feature turns the first two into panics.
pub struct Allocator<H: HeapExtender> {
  heap: Mutex<Heap<H>>,
}

impl<H: HeapExtender> Allocator<H> {
  /// Creates an allocator with an empty block list. Nothing is requested
  /// from `extender` until the first allocation.
  pub const fn new(extender: H) -> Self {
    Self {
      heap: Mutex::new(Heap {
        blocks: FreeList::new(),
        extender,
      }),
    }
  }

  /// Allocates `size` bytes, reusing the first free block that is large
  /// enough before growing the heap.
  pub fn try_allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    self.allocate_in(size, MAX_ALIGN)
  }

  /// [`try_allocate`](Self::try_allocate) for a payload aligned to `align`,
  /// which must be a power of two. Alignments above
  /// [`MAX_ALIGN`](crate::align::MAX_ALIGN) only reuse free blocks that
  /// happen to be aligned, and otherwise grow the heap by a free filler block
  /// plus the new block.
  pub fn try_allocate_aligned(
    &self,
    size: usize,
    align: usize,
  ) -> Result<NonNull<u8>> {
    if !align.is_power_of_two() {
      return Err(AllocError::InvalidAlignment { align });
    }

    self.allocate_in(size, align.max(MAX_ALIGN))
  }

  fn allocate_in(
    &self,
    size: usize,
    align: usize,
  ) -> Result<NonNull<u8>> {
    if size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let placement = unsafe { self.heap.lock().allocate(size, align) };

    Self::placed(size, placement)
  }

  /// [`try_allocate`](Self::try_allocate), with every error reported as null.
  pub fn allocate(
    &self,
    size: usize,
  ) -> *mut u8 {
    self.try_allocate(size).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  /// Allocates `count * elem_size` zeroed bytes.
  pub fn try_zero_allocate(
    &self,
    count: usize,
    elem_size: usize,
  ) -> Result<NonNull<u8>> {
    if count == 0 || elem_size == 0 {
      return Err(AllocError::ZeroSize);
    }

    let size = count
      .checked_mul(elem_size)
      .ok_or(AllocError::Overflow { count, elem_size })?;

    let payload = self.try_allocate(size)?;
    // Reused blocks still hold their previous contents.
    unsafe { ptr::write_bytes(payload.as_ptr(), 0, size) };

    Ok(payload)
  }

  pub fn zero_allocate(
    &self,
    count: usize,
    elem_size: usize,
  ) -> *mut u8 {
    self
      .try_zero_allocate(count, elem_size)
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  /// Grows the allocation at `ptr` to at least `new_size` bytes.
  ///
  /// A null `ptr` or a zero `new_size` behaves like
  /// [`try_allocate`](Self::try_allocate). A block that is already large
  /// enough is returned unchanged. Otherwise the old contents move to a new
  /// block and the old block is released. On failure the old block is left
  /// untouched and still belongs to the caller.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn try_resize(
    &self,
    ptr: *mut u8,
    new_size: usize,
  ) -> Result<NonNull<u8>> {
    unsafe { self.resize_in(ptr, new_size, MAX_ALIGN) }
  }

  /// [`try_resize`](Self::try_resize) for an allocation made with
  /// [`try_allocate_aligned`](Self::try_allocate_aligned). A moved block
  /// keeps the alignment.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn try_resize_aligned(
    &self,
    ptr: *mut u8,
    new_size: usize,
    align: usize,
  ) -> Result<NonNull<u8>> {
    if !align.is_power_of_two() {
      return Err(AllocError::InvalidAlignment { align });
    }

    unsafe { self.resize_in(ptr, new_size, align.max(MAX_ALIGN)) }
  }

  unsafe fn resize_in(
    &self,
    ptr: *mut u8,
    new_size: usize,
    align: usize,
  ) -> Result<NonNull<u8>> {
    let Some(old) = NonNull::new(ptr) else {
      return self.allocate_in(new_size, align);
    };

    if new_size == 0 {
      return self.allocate_in(new_size, align);
    }

    let block = unsafe { Block::from_payload(old) };

    #[cfg(feature = "debug-guard")]
    unsafe {
      check_owned(block)
    };

    let old_size = unsafe { (*block.as_ptr()).size };
    if old_size >= new_size {
      return Ok(old);
    }

    let (placement, release) = {
      let mut heap = self.heap.lock();
      let placement = unsafe { heap.allocate(new_size, align) };

      let release = match &placement {
        Ok(placed) => unsafe {
          let new = Block::payload(placed.block());
          ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size);
          Some(heap.release(block))
        },
        Err(_) => None,
      };

      (placement, release)
    };

    if let Some(release) = release {
      Self::released(old, release);
    }

    Self::placed(new_size, placement)
  }

  /// [`try_resize`](Self::try_resize), with every error reported as null.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn resize(
    &self,
    ptr: *mut u8,
    new_size: usize,
  ) -> *mut u8 {
    unsafe { self.try_resize(ptr, new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  /// Releases the allocation at `ptr`. Null is ignored.
  ///
  /// A block that ends exactly at the heap's current break is handed back to
  /// the extender; any other block is flagged free for reuse.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator, and
  /// must not be used afterwards.
  pub unsafe fn free(
    &self,
    ptr: *mut u8,
  ) {
    let Some(payload) = NonNull::new(ptr) else {
      return;
    };

    let block = unsafe { Block::from_payload(payload) };

    #[cfg(feature = "debug-guard")]
    unsafe {
      check_owned(block)
    };

    let release = unsafe { self.heap.lock().release(block) };

    Self::released(payload, release);
  }

  /// Payload bytes recorded for the allocation at `ptr`, which may exceed
  /// what was asked for when a larger free block was reused. Null gives 0.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn usable_size(
    &self,
    ptr: *const u8,
  ) -> usize {
    match NonNull::new(ptr.cast_mut()) {
      Some(payload) => unsafe { (*Block::from_payload(payload).as_ptr()).size },
      None => 0,
    }
  }

  /// True when no block is linked, i.e. every block has been handed back.
  pub fn is_empty(&self) -> bool {
    self.heap.lock().blocks.is_empty()
  }

  /// Walks the block list under the lock, checking its invariants.
  pub fn validate(&self) -> Result<HeapStats> {
    let heap = self.heap.lock();
    unsafe { heap.blocks.survey() }
  }

  /// Runs `inspect` on the extender while holding the lock.
  ///
  /// `inspect` must not allocate through this same allocator.
  pub fn with_extender<R>(
    &self,
    inspect: impl FnOnce(&H) -> R,
  ) -> R {
    inspect(&self.heap.lock().extender)
  }

  fn placed(
    size: usize,
    placement: Result<Placement>,
  ) -> Result<NonNull<u8>> {
    match placement {
      Ok(Placement::Reused { block, capacity }) => {
        let payload = Block::payload(block);
        heap_log!(trace, "reused {payload:p} ({capacity} bytes) for {size} bytes");
        Ok(payload)
      }
      Ok(Placement::Grown { block, extent }) => {
        let payload = Block::payload(block);
        heap_log!(trace, "grew heap by {extent} bytes for {payload:p} ({size} bytes)");
        Ok(payload)
      }
      Err(err) => {
        heap_log!(warn, "allocation of {size} bytes failed: {err}");
        Err(err)
      }
    }
  }

  fn released(
    payload: NonNull<u8>,
    release: Release,
  ) {
    match release {
      Release::Marked => heap_log!(trace, "marked {payload:p} free"),
      Release::Returned(extent) => {
        heap_log!(debug, "returned {extent} bytes at {payload:p} to the system")
      }
      Release::Kept(err) => heap_log!(warn, "kept {payload:p} as a free tail: {err}"),
    }
  }
}
