//! `log` emission that is safe to use from inside an allocator.
//!
//! A logger may allocate while formatting. When that allocation is served by
//! this crate, it would log again and recurse. Each thread therefore tracks
//! whether it is already inside a logging call, and nested events on that
//! thread are dropped.

use std::cell::Cell;

thread_local! {
  static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// Clears the emitting flag when dropped, even if the logger panicked.
struct Emitting<'a>(&'a Cell<bool>);

impl Drop for Emitting<'_> {
  fn drop(&mut self) {
    self.0.set(false);
  }
}

/// Runs `emit` unless this thread is already emitting.
pub(crate) fn guarded(emit: impl FnOnce()) {
  let _ = EMITTING.try_with(|emitting| {
    if emitting.replace(true) {
      return;
    }
    let _reset = Emitting(emitting);
    emit();
  });
}

/// Like the `log` macros, routed through [`guarded`].
macro_rules! heap_log {
  ($level:ident, $($arg:tt)+) => {
    $crate::logging::guarded(|| ::log::$level!(target: "brkalloc", $($arg)+))
  };
}

pub(crate) use heap_log;
