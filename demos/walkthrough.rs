use std::{env, io::Read, ptr};

use brkalloc::{Allocator, HEADER_SIZE, Sbrk};

/// Waits until the user presses ENTER when `BRKALLOC_STEP` is set.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `gdb`, or just visually track how allocations move the program break.
fn step() {
  if env::var_os("BRKALLOC_STEP").is_none() {
    return;
  }
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { libc::sbrk(0) },
  );
}

fn print_alloc(
  label: &str,
  size: usize,
  addr: *mut u8,
) {
  println!(
    "{} {} bytes, address = {:?}, program break = {:?}",
    label,
    size,
    addr,
    unsafe { libc::sbrk(0) }
  );
}

fn main() {
  env_logger::init();

  // This allocator shares the program break with the C library's malloc,
  // so blocks only shrink the heap when nothing else grew it after them.
  let allocator = Allocator::new(Sbrk::new());

  print_program_break("start");
  println!("header size = {HEADER_SIZE} bytes");
  step();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Allocate space for a u32 and write to it.
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(4);
    print_alloc("\n[1] Allocated", 4, first_block);

    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
    step();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes and a 16 x u16 array behind it.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    print_alloc("\n[2] Allocated", 12, second_block);
    ptr::write_bytes(second_block, 0xAB, 12);

    let third_block = allocator.allocate(32);
    print_alloc("[2] Allocated", 32, third_block);
    for i in 0..16 {
      (third_block as *mut u16).add(i).write(i as u16);
    }
    println!(
      "[2] Address = {:#X}, addr % 16 = {}",
      third_block as usize,
      third_block as usize % 16
    );
    step();

    // --------------------------------------------------------------------
    // 3) Release the first block. It is not the last one on the heap, so it
    //    stays in the list flagged free.
    // --------------------------------------------------------------------
    allocator.free(first_block);
    println!("\n[3] Released first_block at {:?}", first_block);
    println!("[3] {:?}", allocator.validate());
    step();

    // --------------------------------------------------------------------
    // 4) Allocate 2 bytes: first fit hands back the released block.
    // --------------------------------------------------------------------
    let fourth_block = allocator.allocate(2);
    print_alloc("\n[4] Allocated", 2, fourth_block);
    println!(
      "[4] fourth_block == first_block? {}",
      if fourth_block == first_block {
        "Yes, it reused the released block"
      } else {
        "No, it allocated somewhere else"
      }
    );
    step();

    // --------------------------------------------------------------------
    // 5) Grow the 12-byte block to 64 KiB. Its contents move to a new block
    //    at the end of the heap.
    // --------------------------------------------------------------------
    print_program_break("before resize");
    let big_block = allocator.resize(second_block, 64 * 1024);
    print_alloc("\n[5] Resized to", 64 * 1024, big_block);
    println!("[5] First byte after move = 0x{:X}", *big_block);
    step();

    // --------------------------------------------------------------------
    // 6) Zeroed allocation of 8 x u64.
    // --------------------------------------------------------------------
    let zeroed = allocator.zero_allocate(8, 8);
    print_alloc("\n[6] Zero-allocated", 64, zeroed);
    println!("[6] All zero? {}", (0..64).all(|i| *zeroed.add(i) == 0));
    step();

    // --------------------------------------------------------------------
    // 7) Release the last block: the break moves back.
    // --------------------------------------------------------------------
    print_program_break("before releasing tail");
    allocator.free(zeroed);
    print_program_break("after releasing tail");
    println!("[7] {:?}", allocator.validate());
    step();
  }

  println!("\n[8] End of example. Process will exit and the OS will reclaim all memory.");
}
