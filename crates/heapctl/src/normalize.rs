//! Correction of allocator counters into `u64`.
//!
//! glibc < 2.33 only offers `mallinfo()`, whose fields are `int`. Once a counter
//! passes `INT_MAX` it comes back negative. `mallinfo2()` uses `size_t` and
//! needs no correction. Which one is linked is a build-time choice (see the
//! `legacy-mallinfo` feature), so the correction is selected by the field type
//! rather than by a runtime check.

/// A raw counter as found in one of the `mallinfo` struct layouts.
pub trait RawCounter: Copy {
    fn normalize(self) -> u64;
}

impl RawCounter for i32 {
    /// Negative values are reinterpreted as `INT_MAX - raw`, never sign-extended.
    // NOTE: kept compatible with the historical wraparound convention of the
    // old layout. A true two's complement reinterpretation would be
    // `raw as u32 as u64`, which differs by one for every negative input.
    #[inline]
    fn normalize(self) -> u64 {
        if self < 0 {
            (i32::MAX as i64 - self as i64) as u64
        } else {
            self as u64
        }
    }
}

impl RawCounter for usize {
    #[inline]
    fn normalize(self) -> u64 {
        self as u64
    }
}

#[inline]
pub fn normalize<T: RawCounter>(raw: T) -> u64 {
    raw.normalize()
}
