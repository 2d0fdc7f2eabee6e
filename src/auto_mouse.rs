//! Auto mouse layer settings mirrored from the host firmware.

use crate::config::{
    AUTO_MOUSE_TIMEOUT_MAX_MS, AUTO_MOUSE_TIMEOUT_MIN_MS, AUTO_MOUSE_TIMEOUT_QUANTUM_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutoMouse {
    enabled: bool,
    timeout_ms: u16,
    default_timeout_ms: u16,
}

impl AutoMouse {
    /// Create a new, disabled auto mouse with the given default timeout.
    #[must_use]
    pub const fn new(default_timeout_ms: u16) -> Self {
        Self {
            enabled: false,
            timeout_ms: default_timeout_ms,
            default_timeout_ms,
        }
    }

    #[inline]
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    #[must_use]
    pub const fn timeout_ms(&self) -> u16 {
        self.timeout_ms
    }

    /// Set the timeout, clamped to 100..=1000 ms.
    pub fn set_timeout_ms(&mut self, ms: u16) {
        self.timeout_ms = ms.clamp(AUTO_MOUSE_TIMEOUT_MIN_MS, AUTO_MOUSE_TIMEOUT_MAX_MS);
    }

    /// Step the timeout by one quantum (50 ms) up or down.
    pub fn step_timeout(&mut self, up: bool) {
        let ms = if up {
            self.timeout_ms.saturating_add(AUTO_MOUSE_TIMEOUT_QUANTUM_MS)
        } else {
            self.timeout_ms.saturating_sub(AUTO_MOUSE_TIMEOUT_QUANTUM_MS)
        };
        self.set_timeout_ms(ms);
    }

    /// Disable and restore the default timeout.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.timeout_ms = self.default_timeout_ms;
    }

    /// Timeout in its persisted 5-bit form.
    #[must_use]
    pub const fn timeout_quantized(&self) -> u8 {
        (self.timeout_ms / AUTO_MOUSE_TIMEOUT_QUANTUM_MS).saturating_sub(1) as u8
    }

    /// Apply a persisted timeout; 0 selects the default.
    pub fn set_timeout_quantized(&mut self, q: u8) {
        if q == 0 {
            self.timeout_ms = self.default_timeout_ms;
        } else {
            self.set_timeout_ms((u16::from(q) + 1) * AUTO_MOUSE_TIMEOUT_QUANTUM_MS);
        }
    }
}
