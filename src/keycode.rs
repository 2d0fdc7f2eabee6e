//! Custom keycodes and key events.

/// First keyboard-level keycode (`QK_KB_0`).
pub const QK_KB: u16 = 0x7E00;

/// First keycode free for user keymaps.
pub const REEX_SAFE_RANGE: u16 = 0x7E40;

/// Modifier-wrapped basic keycodes (`QK_MODS..=QK_MODS_MAX`).
pub const QK_MODS: u16 = 0x0100;
pub const QK_MODS_MAX: u16 = 0x1FFF;

/// Matrix position of a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyPos {
    pub row: u8,
    pub col: u8,
}

/// One key transition as delivered by the matrix scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub keycode: u16,
    pub pos: KeyPos,
    pub pressed: bool,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(keycode: u16, row: u8, col: u8, pressed: bool) -> Self {
        Self {
            keycode,
            pos: KeyPos { row, col },
            pressed,
        }
    }
}

/// Keycodes handled by [`crate::Reex::process_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ReexKeycode {
    /// Reset settings to defaults.
    RecRst = QK_KB,
    /// Save settings.
    RecSave = QK_KB + 1,
    CpiI100 = QK_KB + 2,
    CpiD100 = QK_KB + 3,
    CpiI1k = QK_KB + 4,
    CpiD1k = QK_KB + 5,
    /// Toggle scroll mode.
    ScrlTo = QK_KB + 6,
    /// Scroll mode while held.
    ScrlMo = QK_KB + 7,
    ScrlDvi = QK_KB + 8,
    ScrlDvd = QK_KB + 9,
    /// Toggle the auto mouse layer.
    AmlTo = QK_KB + 10,
    AmlI50 = QK_KB + 11,
    AmlD50 = QK_KB + 12,
    SsnpVrt = QK_KB + 13,
    SsnpHor = QK_KB + 14,
    SsnpFre = QK_KB + 15,
}

impl ReexKeycode {
    /// Look up a keycode, stripping modifier bits first.
    #[must_use]
    pub const fn from_keycode(keycode: u16) -> Option<Self> {
        let code = strip_mods(keycode);
        if code < QK_KB {
            return None;
        }
        Some(match code - QK_KB {
            0 => Self::RecRst,
            1 => Self::RecSave,
            2 => Self::CpiI100,
            3 => Self::CpiD100,
            4 => Self::CpiI1k,
            5 => Self::CpiD1k,
            6 => Self::ScrlTo,
            7 => Self::ScrlMo,
            8 => Self::ScrlDvi,
            9 => Self::ScrlDvd,
            10 => Self::AmlTo,
            11 => Self::AmlI50,
            12 => Self::AmlD50,
            13 => Self::SsnpVrt,
            14 => Self::SsnpHor,
            15 => Self::SsnpFre,
            _ => return None,
        })
    }

    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Reduce a modifier-wrapped keycode to its basic keycode.
#[inline]
#[must_use]
pub const fn strip_mods(keycode: u16) -> u16 {
    if keycode >= QK_MODS && keycode <= QK_MODS_MAX {
        keycode & 0xFF
    } else {
        keycode
    }
}

/// Whether a keycode should keep the auto mouse layer alive.
#[must_use]
pub const fn is_mouse_record(keycode: u16) -> bool {
    keycode == ReexKeycode::ScrlMo.code()
}
