//! Per-half motion accumulators.
//!
//! Both axes live in one 32-bit atomic (x in the high half, y in the low
//! half) so a sensor interrupt or task can add to an accumulator while the
//! polling loop drains it, without ever observing a torn pair.

use crate::arith::{add16, divmod16};
use portable_atomic::{AtomicU32, Ordering};

/// A signed 2D motion delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Motion {
    pub x: i16,
    pub y: i16,
}

impl Motion {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    #[must_use]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl From<reex_proto::MotionDelta> for Motion {
    fn from(d: reex_proto::MotionDelta) -> Self {
        Self::new(d.x, d.y)
    }
}

impl From<Motion> for reex_proto::MotionDelta {
    fn from(m: Motion) -> Self {
        Self::new(m.x, m.y)
    }
}

/// Which half an accumulator belongs to, seen from the local half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    /// The half this firmware runs on.
    This,
    /// The peer half across the split link.
    That,
}

#[inline]
const fn pack(m: Motion) -> u32 {
    ((m.x as u16 as u32) << 16) | (m.y as u16 as u32)
}

#[inline]
const fn unpack(raw: u32) -> Motion {
    Motion {
        x: (raw >> 16) as u16 as i16,
        y: raw as u16 as i16,
    }
}

/// Saturating motion accumulator for one half.
pub struct MotionAccumulator {
    raw: AtomicU32,
}

impl MotionAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: AtomicU32::new(0),
        }
    }

    /// Add a delta, clamping each axis at the `i16` limits.
    pub fn accumulate(&self, dx: i16, dy: i16) {
        // The closure always returns Some, so the update cannot fail.
        let _ = self
            .raw
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let m = unpack(raw);
                Some(pack(Motion::new(add16(m.x, dx), add16(m.y, dy))))
            });
    }

    /// Current total without consuming it.
    #[must_use]
    pub fn peek(&self) -> Motion {
        unpack(self.raw.load(Ordering::Acquire))
    }

    /// Take the whole total and reset to zero.
    pub fn drain_as_vector(&self) -> Motion {
        unpack(self.raw.swap(0, Ordering::AcqRel))
    }

    /// Take whole multiples of `divisor` from each axis, leaving the
    /// remainder accumulated for the next drain.
    ///
    /// `divisor` must be non-zero.
    pub fn drain_as_scroll(&self, divisor: i16) -> Motion {
        let mut ticks = Motion::ZERO;
        let _ = self
            .raw
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let mut m = unpack(raw);
                ticks = Motion::new(divmod16(&mut m.x, divisor), divmod16(&mut m.y, divisor));
                Some(pack(m))
            });
        ticks
    }

    /// Discard anything accumulated.
    pub fn clear(&self) {
        self.raw.store(0, Ordering::Release);
    }
}

impl Default for MotionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
