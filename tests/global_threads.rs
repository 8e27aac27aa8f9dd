//! Several threads contending for the global heap with no logger installed,
//! so every allocation in the process, thread bookkeeping included, goes
//! through the allocator's lock.

use std::{sync::Barrier, thread};

use brkalloc::{Allocator, Sbrk};

#[global_allocator]
static HEAP: Allocator<Sbrk> = Allocator::new(Sbrk::new());

const THREADS: usize = 4;
const STRINGS: usize = 2_000;

#[test]
fn test_contended_global_heap() {
  let start = Barrier::new(THREADS);

  let lengths: Vec<usize> = thread::scope(|scope| {
    let workers: Vec<_> = (0..THREADS)
      .map(|worker| {
        let start = &start;

        scope.spawn(move || {
          start.wait();

          let mut strings = Vec::new();
          for i in 0..STRINGS {
            strings.push(format!("worker {worker} string {i}"));
          }
          strings.retain(|line| line.len() % 2 == 0);
          strings.shrink_to_fit();

          strings.iter().map(String::len).sum()
        })
      })
      .collect();

    workers
      .into_iter()
      .map(|worker| worker.join().unwrap())
      .collect()
  });

  assert_eq!(lengths.len(), THREADS);
  assert!(lengths.iter().all(|&total| total > 0));
  HEAP.validate().unwrap();
}
