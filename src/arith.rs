//! Saturating helpers for motion deltas.
//!
//! Motion never wraps: a runaway sensor pins at the `i16` limits instead of
//! flipping direction.

/// Add two `i16` values, clipping at `i16::MIN`/`i16::MAX`.
#[inline]
#[must_use]
pub const fn add16(a: i16, b: i16) -> i16 {
    a.saturating_add(b)
}

/// Divide `*v` by `div`, return the quotient and leave the remainder in `*v`.
///
/// Truncates toward zero, so the remainder carries the sign of the
/// dividend. `div` must be non-zero.
#[inline]
pub fn divmod16(v: &mut i16, div: i16) -> i16 {
    let q = *v / div;
    *v -= q * div;
    q
}

/// Clamp to the symmetric HID range `-127..=127`.
#[inline]
#[must_use]
pub const fn clip_to_i8(v: i16) -> i8 {
    if v < -127 {
        -127
    } else if v > 127 {
        127
    } else {
        v as i8
    }
}
