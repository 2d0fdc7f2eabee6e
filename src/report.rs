/// HID mouse report as seen by this crate.
///
/// Only `x`/`y` (move) and `h`/`v` (scroll) are written; `buttons` belongs to
/// the host firmware and passes through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub v: i8,
    pub h: i8,
}

impl MouseReport {
    #[inline]
    #[must_use]
    pub const fn has_motion(&self) -> bool {
        self.x != 0 || self.y != 0 || self.v != 0 || self.h != 0
    }

    #[inline]
    #[must_use]
    pub const fn has_scroll(&self) -> bool {
        self.h != 0 || self.v != 0
    }

    /// Fold `next` into this report, axis by axis, as far as `i8` allows.
    ///
    /// What does not fit stays in `next`. Buttons follow `next`.
    pub fn coalesce(&mut self, next: &mut MouseReport) {
        fn fold(acc: &mut i8, add: &mut i8) {
            let kept = acc.saturating_add(*add);
            // Lies in -128..=127 whenever both inputs are i8.
            let rest = i16::from(*acc) + i16::from(*add) - i16::from(kept);
            *acc = kept;
            *add = rest as i8;
        }
        fold(&mut self.x, &mut next.x);
        fold(&mut self.y, &mut next.y);
        fold(&mut self.v, &mut next.v);
        fold(&mut self.h, &mut next.h);
        self.buttons = next.buttons;
    }
}
