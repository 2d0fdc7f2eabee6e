//! Fixed-width OLED status lines.
//!
//! Every line is exactly [`STATUS_LINE_WIDTH`] font codes. Codes `0xB0..`
//! are icons in the keyboard's logo font; the renderer draws them as-is.

use crate::hooks::ReexHooks;
use crate::pressing::BLANK;
use crate::reex::Reex;
use crate::snap::ScrollSnapMode;
use heapless::Vec;

pub const STATUS_LINE_WIDTH: usize = 21;

pub type StatusLine = Vec<u8, STATUS_LINE_WIDTH>;

const LABEL_SEP: u8 = 0xB1;
const ON: &[u8] = b"\xB2\xB3";
const OFF: &[u8] = b"\xB4\xB5";

/// Right-aligned 4-character decimal with a leading sign slot.
#[must_use]
pub fn format_4d(value: i16) -> [u8; 4] {
    let mut buf = [b' '; 4];
    let mut lead = if value < 0 { b'-' } else { b' ' };
    let mut d = value.unsigned_abs();

    buf[3] = b'0' + (d % 10) as u8;
    d /= 10;
    for slot in [2, 1] {
        if d == 0 {
            buf[slot] = lead;
            lead = b' ';
        } else {
            buf[slot] = b'0' + (d % 10) as u8;
            d /= 10;
        }
    }
    buf[0] = lead;
    buf
}

/// Lowest nibble as a lowercase hex digit.
#[must_use]
pub const fn to_1x(x: u8) -> u8 {
    let x = x & 0x0F;
    if x < 10 {
        b'0' + x
    } else {
        b'a' + x - 10
    }
}

/// Appends until the line is full, then drops the rest.
struct LineWriter(StatusLine);

impl LineWriter {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn put(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.0.push(b).is_err() {
                break;
            }
        }
    }

    fn put_byte(&mut self, b: u8) {
        self.put(&[b]);
    }

    fn finish(self) -> StatusLine {
        self.0
    }
}

impl<H: ReexHooks> Reex<H> {
    /// Last report on the first line, settings on the second.
    ///
    /// ```text
    /// Ball: -12  34   0   0
    ///     :CPI 500 VT-- :D4
    /// ```
    #[must_use]
    pub fn render_ball_info(&self) -> [StatusLine; 2] {
        let m = self.last_mouse();

        let mut first = LineWriter::new();
        first.put(b"Ball");
        first.put_byte(LABEL_SEP);
        for v in [m.x, m.y, m.h, m.v] {
            first.put(&format_4d(i16::from(v)));
        }

        let mut second = LineWriter::new();
        second.put(b"    \xB1\xBC\xBD");
        second.put(&format_4d(i16::from(self.cpi()))[1..]);
        second.put(b"00 ");
        if self.config().scroll_snap_lock() {
            match self.scroll_snap_mode() {
                ScrollSnapMode::Vertical => second.put(b"VT"),
                ScrollSnapMode::Horizontal => second.put(b"HO"),
                ScrollSnapMode::Free => second.put(b"\xBE\xBF"),
            }
        } else {
            second.put(b"\xBE\xBF");
        }
        second.put(if self.scroll_mode() { ON } else { OFF });
        second.put(b" \xC0\xC1");
        second.put_byte(b'0' + self.scroll_div());

        [first.finish(), second.finish()]
    }

    /// Last key position and code followed by the held keys.
    ///
    /// ```text
    /// Key :R2C3K06  abc
    /// ```
    #[must_use]
    pub fn render_key_info(&self) -> StatusLine {
        let pos = self.last_pos();
        let kc = self.last_keycode() as u8;

        let mut line = LineWriter::new();
        line.put(b"Key ");
        line.put_byte(LABEL_SEP);
        line.put(&[0xB8, to_1x(pos.row), 0xB9, to_1x(pos.col)]);
        line.put(&[0xBA, 0xBB, to_1x(kc >> 4), to_1x(kc)]);
        line.put(b"  ");
        line.put(self.pressing_keys().as_bytes());
        line.finish()
    }

    /// Active layers 1..=7 and the auto mouse state.
    #[must_use]
    pub fn render_layer_info(&self, layer_state: u32) -> StatusLine {
        let mut line = LineWriter::new();
        line.put(b"L\xB6\xB7r");
        line.put_byte(LABEL_SEP);
        for layer in 1u8..8 {
            let active = layer_state & (1 << layer) != 0;
            line.put_byte(if active { to_1x(layer) } else { BLANK });
        }
        line.put_byte(b' ');

        if self.config().auto_mouse {
            let aml = self.auto_mouse();
            line.put(b"\xC2\xC3");
            line.put(if aml.enabled() { ON } else { OFF });
            let tens = (aml.timeout_ms() / 10) as i16;
            line.put(&format_4d(tens)[1..]);
            line.put_byte(b'0');
        } else {
            line.put(b"\xC2\xC3\xB4\xB5 ---");
        }
        line.finish()
    }
}
