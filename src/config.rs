//! Build capability matrix and tunable defaults.
//!
//! A [`ReexConfig`] is resolved once at startup (usually as a `const` chosen
//! by Cargo features in the firmware) and handed to [`crate::Reex::new`].

/// Default CPI in units of 100 (500 CPI).
pub const CPI_DEFAULT: u8 = 5;

/// Largest accepted CPI value (PMW3360 register maximum + 1).
pub const CPI_MAX: u8 = 120;

/// Default scroll divider exponent (`1 << (4 - 1)` = 1/8).
pub const SCROLL_DIV_DEFAULT: u8 = 4;

/// Largest accepted scroll divider exponent.
pub const SCROLL_DIV_MAX: u8 = 7;

/// Mouse report throttle, 125 Hz.
pub const REPORT_INTERVAL_MS: u32 = 8;

/// Motion discarded for this long after a scroll mode change.
pub const SCROLL_INHIBIT_MS: u32 = 50;

pub const SCROLL_SNAP_RESET_MS: u32 = 100;
pub const SCROLL_SNAP_TENSION_THRESHOLD: u8 = 12;

pub const GETINFO_INTERVAL_MS: u32 = 500;
pub const GETINFO_MAX_ATTEMPTS: u8 = 10;
pub const GETMOTION_INTERVAL_MS: u32 = 4;

pub const AUTO_MOUSE_TIMEOUT_DEFAULT_MS: u16 = 650;
pub const AUTO_MOUSE_TIMEOUT_MIN_MS: u16 = 100;
pub const AUTO_MOUSE_TIMEOUT_MAX_MS: u16 = 1000;
/// Step used both by the `AML_I50`/`AML_D50` keys and by the persisted field.
pub const AUTO_MOUSE_TIMEOUT_QUANTUM_MS: u16 = 50;

/// Number of layers with a saved lighting word.
pub const LAYER_COUNT: u8 = 4;

/// How unintended cross-axis scroll is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScrollSnapStrategy {
    /// Horizontal ticks are swallowed until enough of them build up.
    Tension { threshold: u8, reset_ms: u32 },
    /// User-selected axis lock ([`crate::ScrollSnapMode`]).
    Lock,
}

impl ScrollSnapStrategy {
    pub const TENSION: Self = Self::Tension {
        threshold: SCROLL_SNAP_TENSION_THRESHOLD,
        reset_ms: SCROLL_SNAP_RESET_MS,
    };
}

impl Default for ScrollSnapStrategy {
    fn default() -> Self {
        Self::TENSION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReexConfig {
    /// Used whenever the stored CPI is 0.
    pub cpi_default: u8,
    pub cpi_max: u8,
    /// Used whenever the stored scroll divider is 0. Must be `1..=SCROLL_DIV_MAX`.
    pub scroll_div_default: u8,
    /// 0 disables throttling.
    pub report_interval_ms: u32,
    /// 0 disables the inhibitor.
    pub scroll_inhibit_ms: u32,
    pub scroll_snap: ScrollSnapStrategy,
    /// Whether the host firmware has an auto-mouse layer.
    pub auto_mouse: bool,
    pub auto_mouse_timeout_ms: u16,
    pub getinfo_interval_ms: u32,
    pub getinfo_max_attempts: u8,
    pub getmotion_interval_ms: u32,
    pub layer_count: u8,
}

impl ReexConfig {
    /// Create the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cpi_default: CPI_DEFAULT,
            cpi_max: CPI_MAX,
            scroll_div_default: SCROLL_DIV_DEFAULT,
            report_interval_ms: REPORT_INTERVAL_MS,
            scroll_inhibit_ms: SCROLL_INHIBIT_MS,
            scroll_snap: ScrollSnapStrategy::TENSION,
            auto_mouse: false,
            auto_mouse_timeout_ms: AUTO_MOUSE_TIMEOUT_DEFAULT_MS,
            getinfo_interval_ms: GETINFO_INTERVAL_MS,
            getinfo_max_attempts: GETINFO_MAX_ATTEMPTS,
            getmotion_interval_ms: GETMOTION_INTERVAL_MS,
            layer_count: LAYER_COUNT,
        }
    }

    #[must_use]
    pub const fn with_scroll_snap(mut self, scroll_snap: ScrollSnapStrategy) -> Self {
        self.scroll_snap = scroll_snap;
        self
    }

    #[must_use]
    pub const fn with_auto_mouse(mut self, enabled: bool) -> Self {
        self.auto_mouse = enabled;
        self
    }

    #[must_use]
    pub const fn with_report_interval(mut self, ms: u32) -> Self {
        self.report_interval_ms = ms;
        self
    }

    #[must_use]
    pub const fn with_scroll_inhibit(mut self, ms: u32) -> Self {
        self.scroll_inhibit_ms = ms;
        self
    }

    #[inline]
    #[must_use]
    pub const fn scroll_snap_lock(&self) -> bool {
        matches!(self.scroll_snap, ScrollSnapStrategy::Lock)
    }
}

impl Default for ReexConfig {
    fn default() -> Self {
        Self::new()
    }
}
