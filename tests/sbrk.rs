//! Runs against the real program break. Kept to a single test so no other
//! test thread moves the break in between.

use brkalloc::{AllocError, Allocator, HEADER_SIZE, HeapExtender, Sbrk, align::MAX_ALIGN};

#[test]
fn test_program_break_follows_the_tail() {
  let allocator = Allocator::new(Sbrk::new());

  unsafe {
    // Leave the break 8 bytes past a 16-byte boundary.
    let current = libc::sbrk(0) as usize;
    let skew = (MAX_ALIGN + 8 - current % MAX_ALIGN) % MAX_ALIGN;
    assert_ne!(libc::sbrk(skew as libc::intptr_t) as usize, usize::MAX);
    let misaligned = libc::sbrk(0);
    assert_eq!(misaligned as usize % MAX_ALIGN, 8);

    // A growth the system refuses must not move the break, padding included.
    assert!(matches!(
      allocator.try_allocate(isize::MAX as usize / 2),
      Err(AllocError::OutOfMemory { .. })
    ));
    assert_eq!(allocator.with_extender(|sbrk| sbrk.current_break()), misaligned.cast::<u8>());
    assert!(allocator.is_empty());

    let first = allocator.allocate(64);
    assert!(!first.is_null());
    assert_eq!(first as usize % MAX_ALIGN, 0);
    assert_eq!(allocator.with_extender(|sbrk| sbrk.current_break()), first.add(64));

    first.write_bytes(0x11, 64);

    let second = allocator.allocate(100);
    assert_eq!(second, first.add(64 + HEADER_SIZE));
    let end = second.add(112);
    assert_eq!(allocator.with_extender(|sbrk| sbrk.current_break()), end);

    // Not the tail: stays in the list.
    allocator.free(first);
    assert_eq!(allocator.with_extender(|sbrk| sbrk.current_break()), end);
    assert_eq!(allocator.allocate(32), first);

    // The tail moves the break back to where it started.
    allocator.free(second);
    assert_eq!(allocator.with_extender(|sbrk| sbrk.current_break()), first.add(64));

    allocator.free(first);
    assert_eq!(
      allocator.with_extender(|sbrk| sbrk.current_break()),
      first.sub(HEADER_SIZE)
    );
  }

  assert!(allocator.is_empty());
  assert_eq!(allocator.validate().unwrap().blocks, 0);
}
