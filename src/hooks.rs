//! Keyboard-specific policy injected into [`crate::Reex`].

use crate::arith::clip_to_i8;
use crate::keycode::KeyEvent;
use crate::motion::Motion;
use crate::report::MouseReport;

/// Why [`ReexHooks::on_adjust_layout`] is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutAdjust {
    /// At boot, before the halves have talked.
    Pending,
    /// On the primary, once negotiation has finished.
    Primary,
    /// On the secondary, every time it answers `GET_INFO`.
    Secondary,
}

/// Overridable behaviour. Every method has a default, so keyboards only
/// implement what they change.
pub trait ReexHooks {
    fn on_adjust_layout(&mut self, _adjust: LayoutAdjust) {}

    /// Write a drained movement vector into the report.
    ///
    /// `is_left` tells which physical half the motion came from.
    fn map_move(&mut self, motion: Motion, report: &mut MouseReport, _is_left: bool) {
        report.x = clip_to_i8(motion.x).saturating_neg();
        report.y = clip_to_i8(motion.y);
    }

    /// Write whole scroll ticks into the report. Scroll snapping runs after
    /// this.
    fn map_scroll(&mut self, ticks: Motion, report: &mut MouseReport, _is_left: bool) {
        report.h = clip_to_i8(ticks.x).saturating_neg();
        report.v = clip_to_i8(ticks.y).saturating_neg();
    }

    /// Runs before the custom keycodes; return `false` to stop processing.
    fn on_process_record(&mut self, _event: &KeyEvent) -> bool {
        true
    }

    /// Extra keycodes that keep the auto mouse layer active.
    fn is_mouse_record(&self, _keycode: u16) -> bool {
        false
    }
}

/// Hooks with every default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ReexHooks for DefaultHooks {}
