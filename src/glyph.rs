//! 7-segment glyph encoding for the TM1637 driver.
//!
//! Bit 0 to 6 select segments A to G, bit 7 is the decimal point or, on the second digit of
//! clock style modules, the colon.

use ufmt::uwrite;
use ufmt_write::uWrite;

/// Number of glyph slots a [`Glyphs`] buffer holds.
pub const GLYPH_SLOTS: usize = 5;

/// Decimal point, or colon when set on slot 1.
pub const DOT: u8 = 0x80;

const BLANK: usize = 36;
const DASH: usize = 37;
const STAR: usize = 38;

/// 0-9, a-z, blank, dash, star
const SEGMENTS: [u8; 39] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F, // 0-9
    0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71, 0x3D, 0x76, 0x06, 0x1E, // a-j
    0x76, 0x38, 0x55, 0x54, 0x3F, 0x73, 0x67, 0x50, 0x6D, 0x78, // k-t
    0x3E, 0x1C, 0x2A, 0x76, 0x6E, 0x5B, // u-z
    0x00, 0x40, 0x63,
];

/// Encoded text, at most [`GLYPH_SLOTS`] digits long.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Glyphs {
    slots: [u8; GLYPH_SLOTS],
    len: u8,
}

impl Glyphs {
    /// Glyphs that were actually encoded, in display order.
    pub fn as_slice(&self) -> &[u8] {
        &self.slots[..self.len as usize]
    }

    /// All slots, unused ones are blank.
    pub fn slots(&self) -> &[u8; GLYPH_SLOTS] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lights the colon between the second and third digit.
    ///
    /// The colon is wired to the dot of slot 1 on clock modules. The slot counts as used
    /// afterwards so the colon is sent even when the text was shorter.
    pub fn set_colon(&mut self) {
        self.slots[1] |= DOT;
        if self.len < 2 {
            self.len = 2;
        }
    }

    /// Encodes `text` into the free slots, dropping what does not fit.
    ///
    /// `.` and `:` do not take a slot of their own, they light the dot of the glyph before them.
    /// On clock modules that dot is the colon when it follows the second digit.
    pub fn append(&mut self, text: &[u8]) {
        for &c in text {
            if matches!(c, b'.' | b':') && !self.is_empty() {
                self.slots[self.len as usize - 1] |= DOT;
            } else if self.len() < GLYPH_SLOTS {
                self.slots[self.len as usize] = encode_char(c);
                self.len += 1;
            }
        }
    }
}

/// Segments of the hex digit `digit & 0xf`.
pub fn encode_digit(digit: u8) -> u8 {
    SEGMENTS[(digit & 0x0f) as usize]
}

/// Segments of an ASCII character.
///
/// Digits, letters (case insensitive), space, `-` and `*` (rendered as a degree sign) have a
/// glyph, everything else is blank.
pub fn encode_char(c: u8) -> u8 {
    let index = match c {
        b' ' => BLANK,
        b'*' => STAR,
        b'-' => DASH,
        b'A'..=b'Z' => (c - b'A') as usize + 10,
        b'a'..=b'z' => (c - b'a') as usize + 10,
        b'0'..=b'9' => (c - b'0') as usize,
        _ => BLANK,
    };
    SEGMENTS[index]
}

/// Encodes the first [`GLYPH_SLOTS`] bytes of `text`.
pub fn encode_bytes(text: &[u8]) -> Glyphs {
    let mut glyphs = Glyphs::default();
    for (slot, c) in glyphs.slots.iter_mut().zip(text) {
        *slot = encode_char(*c);
        glyphs.len += 1;
    }
    glyphs
}

/// Encodes the first [`GLYPH_SLOTS`] characters of `text`.
pub fn encode_string(text: &str) -> Glyphs {
    encode_bytes(text.as_bytes())
}

/// `val` as four lowercase hex digits.
pub fn to_hex(val: u16) -> Glyphs {
    let text = [
        hex_char((val >> 12) as u8),
        hex_char((val >> 8) as u8),
        hex_char((val >> 4) as u8),
        hex_char(val as u8),
    ];
    encode_bytes(&text)
}

/// `val` as four zero padded decimal digits. Values above 9999 keep their leading four digits.
pub fn to_decimal(val: u16) -> Glyphs {
    let mut text = DigitText::default();
    match uwrite!(text, "{}", val) {
        Ok(()) => encode_bytes(&text.padded()),
        Err(()) => encode_bytes(b"----"),
    }
}

fn hex_char(nibble: u8) -> u8 {
    b"0123456789abcdef"[(nibble & 0x0f) as usize]
}

/// Just large enough for the decimal representation of a `u16`.
#[derive(Default)]
struct DigitText {
    buf: [u8; 5],
    len: usize,
}

impl DigitText {
    /// First four characters, left padded with zeros.
    fn padded(&self) -> [u8; 4] {
        let mut out = [b'0'; 4];
        let digits = &self.buf[..self.len];
        if digits.len() >= out.len() {
            out.copy_from_slice(&digits[..4]);
        } else {
            let start = out.len() - digits.len();
            out[start..].copy_from_slice(digits);
        }
        out
    }
}

impl uWrite for DigitText {
    type Error = ();

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(());
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}
