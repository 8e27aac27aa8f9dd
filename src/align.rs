/// Maximum scalar alignment guaranteed for every payload.
///
/// Headers are padded to a multiple of this value and every block extent is
/// rounded up to it, so a heap that starts aligned stays aligned.
pub const MAX_ALIGN: usize = 16;

/// Rounds `$value` up to the next multiple of `$align`, which must be a power
/// of two.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Rounds `$value` up to [`MAX_ALIGN`](crate::align::MAX_ALIGN).
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(1), 16);
/// assert_eq!(align!(24), 32);
/// assert_eq!(align!(32), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::MAX_ALIGN)
  };
}

/// Overflow-checked form of [`align!`]. Returns `None` when rounding up would
/// wrap around `usize`.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(MAX_ALIGN - 1) {
    Some(padded) => Some(padded & !(MAX_ALIGN - 1)),
    None => None,
  }
}
