//! # brkalloc - A First-Fit Free-List Allocator
//!
//! This crate provides a small general-purpose allocator that serves every
//! request from a single heap grown at its end, the way `sbrk(2)` grows a
//! process's data segment. It offers the four classic operations (allocate,
//! zero-allocate, resize, release) and can stand in for `malloc` or back
//! Rust's `#[global_allocator]`.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬──────┬─────┬─────┬──────────┐                              │
//!   │   │ A1  │  A2  │ A3  │ A4  │    A5    │   (not yet requested)        │
//!   │   │used │ free │used │free │   used   │                              │
//!   │   └─────┴──────┴─────┴─────┴──────────┘                              │
//!   │   ▲                                   ▲                              │
//!   │   │                                   │                              │
//!   │  head                            Program Break                       │
//!   │   └──next──► A2 ──► A3 ──► A4 ──► A5 (tail)                          │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Every block ever created stays linked in creation (= address) order.
//!   Allocation takes the FIRST free block that is large enough (A2 or A4),
//!   and only grows the heap when none fits.
//!   Releasing the tail (A5) moves the break back; any other release just
//!   flags the block free.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - MAX_ALIGN and the align!/align_to! macros
//!   ├── block      - Block header record and payload conversion (internal)
//!   ├── heap       - HeapExtender trait and the Counting observer
//!   ├── sbrk       - Program-break extender
//!   ├── region     - mmap-backed extender with a private break
//!   ├── free_list  - Block list: first-fit search, append, tail detach
//!   ├── allocator  - Allocator facade under one global lock
//!   ├── global     - GlobalAlloc adapter and the process-wide heap
//!   ├── error      - AllocError and its coarse ErrorClass
//!   ├── logging    - re-entrancy-safe `log` events (target "brkalloc")
//!   └── ffi        - C allocation symbols (feature "malloc-interpose")
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brkalloc::{Allocator, Region};
//!
//! let allocator = Allocator::new(Region::new(1 << 20).unwrap());
//!
//! let ptr = allocator.allocate(8) as *mut u64;
//! unsafe {
//!     *ptr = 42;
//!     println!("Value: {}", *ptr);
//!     allocator.free(ptr as *mut u8);
//! }
//! ```
//!
//! As the program's allocator:
//!
//! ```rust,ignore
//! use brkalloc::{Allocator, Sbrk};
//!
//! #[global_allocator]
//! static HEAP: Allocator<Sbrk> = Allocator::new(Sbrk::new());
//! ```
//!
//! ## How It Works
//!
//! Each block is a header followed by its payload:
//!
//! ```text
//!   Single Allocation:
//!   ┌───────────────────────┬────────────────────────────────┬─────────┐
//!   │    Block Header       │         User Data              │ padding │
//!   │  ┌─────────────────┐  │                                │ to 16   │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │         │
//!   │  │ is_free: false  │  │  │                          │  │         │
//!   │  │ next: null/ptr  │  │  │     N bytes usable       │  │         │
//!   │  └─────────────────┘  │  │                          │  │         │
//!   │   HEADER_SIZE bytes   │  └──────────────────────────┘  │         │
//!   └───────────────────────┴────────────────────────────────┴─────────┘
//!                           ▲
//!                           └── Pointer returned to user (16-byte aligned)
//! ```
//!
//! - Reused blocks are never split. A 100-byte free block serves a 10-byte
//!   request whole.
//! - Resizing to a size the block already holds returns the same pointer.
//!   Growing it copies the old contents into a new block.
//! - Only the block at the very end of the heap is ever given back to the
//!   system. Unlinking it walks the list from the head, because the headers
//!   carry no back-pointers.
//! - Alignments above 16 first look for a free block whose payload already
//!   sits on the boundary. Failing that, the heap grows by a free filler
//!   block followed by the new block, so the payload lands aligned.
//!
//! ## Limitations
//!
//! - **One lock**: every operation on an [`Allocator`] is serialized.
//! - **No coalescing or splitting**: freed space is only reused whole.
//! - **Unix-only**: requires `libc` for `sbrk` and `mmap`.
//!
//! ## Safety
//!
//! Passing `free` or `resize` a pointer this allocator did not return,
//! releasing it twice, or using it after release is undefined behavior. The
//! `debug-guard` feature stamps headers so the first two panic instead.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod align;
mod allocator;
mod block;
mod error;
#[cfg(feature = "malloc-interpose")]
pub mod ffi;
mod free_list;
mod global;
mod heap;
mod logging;
mod region;
mod sbrk;

pub use allocator::Allocator;
pub use block::HEADER_SIZE;
pub use error::{AllocError, ErrorClass, Result};
pub use free_list::HeapStats;
pub use global::process_heap;
pub use heap::{Counting, ExtenderCounters, HeapExtender};
pub use region::Region;
pub use sbrk::Sbrk;
