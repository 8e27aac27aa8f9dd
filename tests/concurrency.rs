use std::{
  sync::atomic::{AtomicUsize, Ordering},
  thread,
};

use brkalloc::{Allocator, Region};
use rand::{Rng, SeedableRng, rngs::StdRng};

const THREADS: usize = 8;
const CYCLES: usize = 400;
const MAX_SIZE: usize = 512;

struct Live {
  addr: usize,
  size: usize,
  usable: usize,
  fill: u8,
}

unsafe fn assert_filled(live: &Live) {
  let bytes = unsafe { std::slice::from_raw_parts(live.addr as *const u8, live.size) };
  assert!(
    bytes.iter().all(|&byte| byte == live.fill),
    "block {:#x} was overwritten",
    live.addr
  );
}

#[test]
fn test_concurrent_allocate_and_free() {
  let allocator = Allocator::new(Region::new(64 << 20).unwrap());
  let releases = AtomicUsize::new(0);

  let survivors: Vec<Live> = thread::scope(|scope| {
    let workers: Vec<_> = (0..THREADS)
      .map(|worker| {
        let allocator = &allocator;
        let releases = &releases;

        scope.spawn(move || {
          let mut rng = StdRng::seed_from_u64(worker as u64);
          let mut live: Vec<Live> = Vec::new();

          for cycle in 0..CYCLES {
            let size = rng.gen_range(1..=MAX_SIZE);
            let ptr = allocator.allocate(size);
            assert!(!ptr.is_null());

            let fill = (worker * CYCLES + cycle) as u8;
            unsafe { ptr.write_bytes(fill, size) };

            let usable = unsafe { allocator.usable_size(ptr) };
            assert!(usable >= size);

            live.push(Live {
              addr: ptr as usize,
              size,
              usable,
              fill,
            });

            if rng.gen_bool(0.5) {
              let victim = live.swap_remove(rng.gen_range(0..live.len()));
              unsafe {
                assert_filled(&victim);
                assert_eq!(allocator.usable_size(victim.addr as *const u8), victim.usable);
                allocator.free(victim.addr as *mut u8);
              }
              releases.fetch_add(1, Ordering::Relaxed);
            }
          }

          live
        })
      })
      .collect();

    workers
      .into_iter()
      .flat_map(|worker| worker.join().unwrap())
      .collect()
  });

  assert_eq!(
    releases.load(Ordering::Relaxed),
    THREADS * CYCLES - survivors.len()
  );

  let stats = allocator.validate().unwrap();
  assert_eq!(stats.blocks - stats.free_blocks, survivors.len());
  assert_eq!(
    stats.used_bytes,
    survivors.iter().map(|live| live.usable).sum::<usize>()
  );

  for live in &survivors {
    unsafe {
      assert_filled(live);
      assert_eq!(allocator.usable_size(live.addr as *const u8), live.usable);
      allocator.free(live.addr as *mut u8);
    }
  }

  let stats = allocator.validate().unwrap();
  assert_eq!(stats.free_blocks, stats.blocks);
  assert_eq!(stats.used_bytes, 0);
}

#[test]
fn test_concurrent_zero_allocate_and_resize() {
  let allocator = Allocator::new(Region::new(16 << 20).unwrap());

  thread::scope(|scope| {
    for worker in 0..THREADS {
      let allocator = &allocator;

      scope.spawn(move || {
        let mut rng = StdRng::seed_from_u64(1000 + worker as u64);

        for _ in 0..100 {
          let count = rng.gen_range(1..=16);
          let ptr = allocator.zero_allocate(count, 8);
          assert!(!ptr.is_null());

          unsafe {
            assert!((0..count * 8).all(|i| *ptr.add(i) == 0));
            ptr.write_bytes(worker as u8, count * 8);

            let grown = allocator.resize(ptr, count * 8 + rng.gen_range(1..=256));
            assert!(!grown.is_null());
            assert!((0..count * 8).all(|i| *grown.add(i) == worker as u8));

            allocator.free(grown);
          }
        }
      });
    }
  });

  let stats = allocator.validate().unwrap();
  assert_eq!(stats.used_bytes, 0);
}
