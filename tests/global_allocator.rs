//! Everything in this test binary allocates through brkalloc, including the
//! logger below, which formats every record onto the heap.

use std::{
  collections::HashMap,
  sync::atomic::{AtomicUsize, Ordering},
  thread,
};

use brkalloc::{Allocator, Sbrk};
use log::{LevelFilter, Log, Metadata, Record};

#[global_allocator]
static HEAP: Allocator<Sbrk> = Allocator::new(Sbrk::new());

static EVENTS: AtomicUsize = AtomicUsize::new(0);

struct AllocatingLogger;

impl Log for AllocatingLogger {
  fn enabled(
    &self,
    metadata: &Metadata,
  ) -> bool {
    metadata.target() == "brkalloc"
  }

  fn log(
    &self,
    record: &Record,
  ) {
    if self.enabled(record.metadata()) {
      let line = format!("{}: {}", record.level(), record.args());
      assert!(!line.is_empty());
      EVENTS.fetch_add(1, Ordering::Relaxed);
    }
  }

  fn flush(&self) {}
}

static LOGGER: AllocatingLogger = AllocatingLogger;

#[test]
fn test_collections_and_logging_through_the_global_heap() {
  log::set_logger(&LOGGER).unwrap();
  log::set_max_level(LevelFilter::Trace);

  let handles: Vec<_> = (0..4)
    .map(|worker| {
      thread::spawn(move || {
        let mut words: HashMap<String, usize> = HashMap::new();
        for i in 0..2_000 {
          *words.entry(format!("w{}-{}", worker, i % 97)).or_default() += 1;
        }

        let mut numbers: Vec<u64> = Vec::new();
        for i in 0..10_000 {
          numbers.push(i);
        }
        numbers.shrink_to_fit();

        (words.len(), numbers.iter().sum::<u64>())
      })
    })
    .collect();

  for handle in handles {
    let (distinct, sum) = handle.join().unwrap();
    assert_eq!(distinct, 97);
    assert_eq!(sum, 10_000 * 9_999 / 2);
  }

  assert!(EVENTS.load(Ordering::Relaxed) > 0);
  HEAP.validate().unwrap();
}
