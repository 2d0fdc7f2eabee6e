//! Best-effort list of currently held keys for the OLED key line.

/// Font code for an empty slot.
pub const BLANK: u8 = 0xB0;

pub const PRESSING_SLOTS: usize = 6;

const FIRST_KEYCODE: u16 = 4;
const KEYCODE_NAMES: &[u8; 53] = b"abcdefghijklmnopqrstuvwxyz1234567890REBT_-=[]\\#;'`,./";

/// Glyph for a basic keycode, if it has one (`KC_A`..`KC_SLASH`).
#[must_use]
pub fn keycode_glyph(keycode: u16) -> Option<u8> {
    let idx = keycode.checked_sub(FIRST_KEYCODE)?;
    KEYCODE_NAMES.get(usize::from(idx)).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressingKeys {
    slots: [u8; PRESSING_SLOTS],
}

impl PressingKeys {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [BLANK; PRESSING_SLOTS],
        }
    }

    /// Track a press or release. Keys without a glyph are ignored, as are
    /// presses once every slot is taken.
    pub fn update(&mut self, keycode: u16, pressed: bool) {
        let Some(glyph) = keycode_glyph(keycode) else {
            return;
        };
        let (from, to) = if pressed { (BLANK, glyph) } else { (glyph, BLANK) };
        if let Some(slot) = self.slots.iter_mut().find(|s| **s == from) {
            *slot = to;
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PRESSING_SLOTS] {
        &self.slots
    }
}

impl Default for PressingKeys {
    fn default() -> Self {
        Self::new()
    }
}
