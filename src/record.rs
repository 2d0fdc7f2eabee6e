//! Bit-packed configuration word kept in the keyboard's user storage slot.
//!
//! ```text
//!  bit  0..7   cpi         (0 = default)
//!  bit  7..10  scroll_div  (0 = default)
//!  bit 10      auto mouse enabled
//!  bit 11..16  auto mouse timeout, timeout / 50 - 1 (0 = default)
//!  bit 16..18  scroll snap mode
//! ```
//!
//! Fields are stored raw. Clamping happens in the setters that consume them.

#[derive(Clone, Copy)]
struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    const fn mask(self) -> u32 {
        (1 << self.width) - 1
    }

    const fn get(self, raw: u32) -> u8 {
        ((raw >> self.shift) & self.mask()) as u8
    }

    const fn put(self, raw: u32, value: u8) -> u32 {
        (raw & !(self.mask() << self.shift)) | ((value as u32 & self.mask()) << self.shift)
    }
}

const CPI: Field = Field::new(0, 7);
const SCROLL_DIV: Field = Field::new(7, 3);
const AUTO_MOUSE_ENABLED: Field = Field::new(10, 1);
const AUTO_MOUSE_TIMEOUT: Field = Field::new(11, 5);
const SCROLL_SNAP: Field = Field::new(16, 2);

/// Unpacked view of the persisted word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigRecord {
    pub cpi: u8,
    pub scroll_div: u8,
    pub auto_mouse_enabled: bool,
    /// Quantized: `timeout_ms / 50 - 1`, 0 meaning "use the default".
    pub auto_mouse_timeout: u8,
    pub scroll_snap: u8,
}

impl ConfigRecord {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            cpi: CPI.get(raw),
            scroll_div: SCROLL_DIV.get(raw),
            auto_mouse_enabled: AUTO_MOUSE_ENABLED.get(raw) != 0,
            auto_mouse_timeout: AUTO_MOUSE_TIMEOUT.get(raw),
            scroll_snap: SCROLL_SNAP.get(raw),
        }
    }

    /// Pack into a word. Out-of-width values are truncated to their field.
    #[must_use]
    pub const fn to_raw(&self) -> u32 {
        let mut raw = 0;
        raw = CPI.put(raw, self.cpi);
        raw = SCROLL_DIV.put(raw, self.scroll_div);
        raw = AUTO_MOUSE_ENABLED.put(raw, self.auto_mouse_enabled as u8);
        raw = AUTO_MOUSE_TIMEOUT.put(raw, self.auto_mouse_timeout);
        SCROLL_SNAP.put(raw, self.scroll_snap)
    }
}

impl From<u32> for ConfigRecord {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ConfigRecord> for u32 {
    fn from(record: ConfigRecord) -> Self {
        record.to_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_positions() {
        let rec = ConfigRecord {
            cpi: 0x7F,
            scroll_div: 0,
            auto_mouse_enabled: false,
            auto_mouse_timeout: 0,
            scroll_snap: 0,
        };
        assert_eq!(rec.to_raw(), 0x0000_007F);

        let rec = ConfigRecord {
            scroll_div: 7,
            ..ConfigRecord::default()
        };
        assert_eq!(rec.to_raw(), 0b111 << 7);

        let rec = ConfigRecord {
            auto_mouse_enabled: true,
            ..ConfigRecord::default()
        };
        assert_eq!(rec.to_raw(), 1 << 10);

        let rec = ConfigRecord {
            auto_mouse_timeout: 0x1F,
            ..ConfigRecord::default()
        };
        assert_eq!(rec.to_raw(), 0x1F << 11);

        let rec = ConfigRecord {
            scroll_snap: 2,
            ..ConfigRecord::default()
        };
        assert_eq!(rec.to_raw(), 2 << 16);
    }

    #[test]
    fn test_from_raw_ignores_unused_bits() {
        let rec = ConfigRecord::from_raw(0xFFFC_0000 | 5);
        assert_eq!(rec.cpi, 5);
        assert_eq!(rec.scroll_snap, 0);
        assert_eq!(rec.scroll_div, 0);
    }

    #[test]
    fn test_in_range_record_survives_packing() {
        let rec = ConfigRecord {
            cpi: 120,
            scroll_div: 3,
            auto_mouse_enabled: true,
            auto_mouse_timeout: 12,
            scroll_snap: 1,
        };
        assert_eq!(ConfigRecord::from_raw(rec.to_raw()), rec);
        assert_eq!(ConfigRecord::from(u32::from(rec)), rec);
    }

    #[test]
    fn test_oversized_value_is_truncated_to_field() {
        let rec = ConfigRecord {
            cpi: 0xFF,
            ..ConfigRecord::default()
        };
        assert_eq!(rec.to_raw(), 0x7F);
    }
}
