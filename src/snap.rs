//! Scroll snapping: keeps a vertical scroll from drifting sideways.

use crate::config::ScrollSnapStrategy;
use crate::report::MouseReport;

/// Axis lock used by [`ScrollSnapStrategy::Lock`]. Persisted as 2 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScrollSnapMode {
    /// Drop horizontal ticks.
    #[default]
    Vertical = 0,
    /// Drop vertical ticks.
    Horizontal = 1,
    /// Pass both axes.
    Free = 2,
}

impl ScrollSnapMode {
    /// Decode a stored value; anything past `Free` is treated as `Free`.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Vertical,
            1 => Self::Horizontal,
            _ => Self::Free,
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Project a scroll report onto the allowed axes.
    pub fn project(self, report: &mut MouseReport) {
        match self {
            Self::Vertical => report.h = 0,
            Self::Horizontal => report.v = 0,
            Self::Free => {}
        }
    }
}

/// Applies the configured [`ScrollSnapStrategy`] to scroll reports.
#[derive(Debug, Clone)]
pub struct ScrollSnapFilter {
    strategy: ScrollSnapStrategy,
    mode: ScrollSnapMode,
    tension: i8,
    last_scroll: u32,
}

impl ScrollSnapFilter {
    /// Create a new filter in `Vertical` mode with no tension.
    #[must_use]
    pub const fn new(strategy: ScrollSnapStrategy) -> Self {
        Self {
            strategy,
            mode: ScrollSnapMode::Vertical,
            tension: 0,
            last_scroll: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn strategy(&self) -> ScrollSnapStrategy {
        self.strategy
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> ScrollSnapMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ScrollSnapMode) {
        self.mode = mode;
    }

    #[inline]
    #[must_use]
    pub const fn tension(&self) -> i8 {
        self.tension
    }

    /// Filter a freshly mapped scroll report at time `now` (ms).
    pub fn apply(&mut self, report: &mut MouseReport, now: u32) {
        match self.strategy {
            ScrollSnapStrategy::Lock => self.mode.project(report),
            ScrollSnapStrategy::Tension {
                threshold,
                reset_ms,
            } => {
                if report.has_scroll() {
                    self.last_scroll = now;
                } else if now.wrapping_sub(self.last_scroll) >= reset_ms {
                    self.tension = 0;
                }
                if self.tension.unsigned_abs() < threshold {
                    self.tension = self.tension.saturating_add(report.h);
                    report.h = 0;
                }
            }
        }
    }
}
