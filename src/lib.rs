#![no_std]
//! Drivers for two cheap display modules found on hobby boards:
//!
//! * character LCDs with a HD44780 compatible controller (LCD1602, LCD2004) wired to a PCF8574
//!   I2C expander, see [`sync_lcd::Lcd`],
//! * 4 digit 7-segment modules built around the TM1637 controller, driven by bit banging two
//!   output pins, see [`sync_tm1637::SegmentDisplay`].
//!
//! Both drivers only require [`embedded_hal`] traits: an [`embedded_hal::i2c::I2c`] bus or two
//! [`embedded_hal::digital::OutputPin`]s, plus a [`embedded_hal::delay::DelayNs`] instance. With
//! the `async` feature enabled the same drivers are available on top of `embedded-hal-async` in
//! [`async_lcd`] and [`async_tm1637`].
//!
//! Usage:
//! ```ignore
//! const LCD_ADDRESS: u8 = 0x27; // Address depends on hardware, see link below
//!
//! let mut lcd = lcd_tm1637::sync_lcd::Lcd::new(&mut i2c, &mut delay)
//!     .with_address(LCD_ADDRESS)
//!     .init(2, 16)?; // two lines, sixteen columns
//! lcd.put_string("Hello\nworld")?;
//!
//! let mut digits = lcd_tm1637::sync_tm1637::SegmentDisplay::new(&mut clk, &mut dio, &mut delay)
//!     .with_brightness(3)
//!     .init()?;
//! digits.show("12 30", true)?;
//! ```
//!
//! This [site][lcd address] describes how to find the address of your LCD devices.
//!
//! Neither controller acknowledges anything the drivers send. Out of range arguments are clamped
//! or ignored, the only errors reported are the ones raised by the underlying bus or pins.
//!
//! [lcd address]: https://www.ardumotive.com/i2clcden.html

pub mod glyph;
pub mod sync_lcd;
pub mod sync_tm1637;

#[cfg(feature = "async")]
pub mod async_lcd;
#[cfg(feature = "async")]
pub mod async_tm1637;

#[cfg(test)]
mod testing;

/// Default 7-bit I2C address of PCF8574 based LCD backpacks.
pub const DEFAULT_LCD_ADDRESS: u8 = 0x27;

/// Largest number of lines the HD44780 addressing scheme covers.
pub const MAX_LINES: u8 = 4;

/// Largest number of columns a single HD44780 line driver can address.
pub const MAX_COLUMNS: u8 = 40;

/// Timing requirements of the HD44780 controller.
///
/// These values come from the datasheet and are correctness requirements. Shortening them breaks
/// real hardware while every test against a mock bus keeps passing.
pub mod timing {
    /// Power on settle time before the first reset nibble (datasheet: >15ms after Vcc 4.5V).
    pub const POWER_ON_MS: u32 = 20;
    /// Wait after the first "function set 8 bit" reset nibble (datasheet: >4.1ms).
    pub const FIRST_RESET_MS: u32 = 5;
    /// Wait after the remaining reset nibbles and the 4 bit switch (datasheet: >100us).
    pub const RESET_MS: u32 = 1;
    /// Execution time of clear display and return home (worst case 4.1ms at slow clocks).
    pub const HOME_CLEAR_MS: u32 = 5;
    /// Setup time for each CGRAM write.
    pub const CGRAM_WRITE_US: u32 = 40;
}

/// Backlight state, mirrored into every byte sent to the expander.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backlight {
    Off = 0x00,
    On = 0x08,
}

impl From<bool> for Backlight {
    fn from(on: bool) -> Self {
        if on {
            Backlight::On
        } else {
            Backlight::Off
        }
    }
}

/// PCF8574 pin assignment of the common LCD backpacks.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Pin {
    /// P0: register select, set for display data.
    Rs = 0x01,
    /// P2: enable, data is latched on the falling edge.
    Enable = 0x04,
}

/// P4-P7 carry the data nibble.
const DATA_SHIFT: u8 = 4;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Cmd = 0x00,
    Data = Pin::Rs as u8,
}

/// HD44780 instructions, identified by their highest set bit.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Instruction {
    Clear = 0x01,
    ReturnHome = 0x02,
    EntrySet = 0x04,
    DisplayControl = 0x08,
    Shift = 0x10,
    FunctionSet = 0x20,
    CgramAddr = 0x40,
    DdramAddr = 0x80,
}

/// Flags of [`Instruction::DisplayControl`].
#[repr(u8)]
#[derive(Copy, Clone)]
enum DisplayControl {
    Off = 0x00,
    CursorBlink = 0x01,
    CursorOn = 0x02,
    DisplayOn = 0x04,
}

/// Flags of [`Instruction::EntrySet`].
#[repr(u8)]
#[derive(Copy, Clone)]
enum EntryMode {
    Increment = 0x02,
}

/// Flags of [`Instruction::Shift`].
#[repr(u8)]
#[derive(Copy, Clone)]
enum ShiftMode {
    MoveDisplay = 0x08,
    Right = 0x04,
}

/// Flags of [`Instruction::FunctionSet`].
#[repr(u8)]
#[derive(Copy, Clone)]
enum FunctionSet {
    Bit8 = 0x10,
    TwoLines = 0x08,
}

/// Nibble sent three times to force the controller into 8 bit mode from any state.
const RESET_NIBBLE: u8 = Instruction::FunctionSet as u8 | FunctionSet::Bit8 as u8;
/// Nibble switching the controller from 8 bit into 4 bit mode.
const FOUR_BIT_NIBBLE: u8 = Instruction::FunctionSet as u8;

/// Commands at or below this value (clear, return home) need [`timing::HOME_CLEAR_MS`].
const SLOW_COMMAND_MAX: u8 = 3;

/// Expander byte carrying `nibble` (lower four bits) with the given mode and backlight, enable
/// low.
fn expander_byte(nibble: u8, mode: Mode, backlight: Backlight) -> u8 {
    ((nibble & 0x0f) << DATA_SHIFT) | backlight as u8 | mode as u8
}

/// DDRAM address of column `x` on row `y`.
///
/// Rows 1 and 3 live at `0x40` in the second line driver, rows 2 and 3 continue the first two
/// rows right after the last visible column.
pub fn ddram_address(x: u8, y: u8, columns: u8) -> u8 {
    let mut addr = x & 0x3f;
    if y & 1 != 0 {
        addr += 0x40;
    }
    if y & 2 != 0 {
        addr += columns;
    }
    addr
}

/// Clamps a requested geometry to what the controller can address.
fn clamp_geometry(lines: u8, columns: u8) -> (u8, u8) {
    #[cfg(feature = "defmt")]
    {
        if lines > MAX_LINES || columns > MAX_COLUMNS {
            defmt::debug!("lcd geometry {}x{} clamped", lines, columns);
        }
    }
    (lines.min(MAX_LINES), columns.min(MAX_COLUMNS))
}

/// Cursor bookkeeping shared by the blocking and async LCD drivers.
///
/// Kept free of any bus access so the line wrap rules can be reasoned about on their own.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Cursor {
    x: u8,
    y: u8,
    lines: u8,
    columns: u8,
    implied_newline: bool,
}

impl Cursor {
    fn new(lines: u8, columns: u8) -> Self {
        Self {
            lines,
            columns,
            ..Self::default()
        }
    }

    /// Clamps a requested position onto the display.
    fn place(&mut self, x: u8, y: u8) {
        self.implied_newline = false;
        self.x = x.min(self.columns.saturating_sub(1));
        self.y = y.min(self.lines.saturating_sub(1));
    }

    /// Advances the cursor for `ch`. Returns whether `ch` has to be sent as display data.
    fn advance(&mut self, ch: u8) -> bool {
        let newline = ch == b'\n';
        // Only the character right after a wrap may be absorbed.
        let wrapped = core::mem::take(&mut self.implied_newline);
        let emit = if newline {
            if !wrapped {
                self.x = self.columns;
            }
            false
        } else {
            self.x = self.x.saturating_add(1);
            true
        };

        if self.x >= self.columns {
            self.x = 0;
            self.y = self.y.saturating_add(1);
            self.implied_newline = !newline;
        }
        if self.y >= self.lines {
            self.y = 0;
        }
        emit
    }

    fn address(&self) -> u8 {
        ddram_address(self.x, self.y, self.columns)
    }
}

/// TM1637 commands.
#[repr(u8)]
#[derive(Copy, Clone)]
enum SegmentCommand {
    /// Data command, auto increment address.
    DataAuto = 0x40,
    /// Data command, fixed address.
    DataFixed = 0x44,
    /// Display control, or'ed with [`SEGMENT_DISPLAY_ON`] and the brightness.
    DisplayControl = 0x80,
    /// Address command, or'ed with the digit position.
    Address = 0xC0,
}

const SEGMENT_DISPLAY_ON: u8 = 0x08;

/// Half period of the TM1637 clock. The chip accepts up to ~250kHz, 50us keeps long jumper
/// wires with weak pull-ups working.
pub const SEGMENT_BIT_DELAY_US: u32 = 50;

/// Highest digit position addressable by [`sync_tm1637::SegmentDisplay::write`].
pub const MAX_SEGMENT_POSITION: u8 = 4;

/// Brightness used until [`sync_tm1637::SegmentDisplay::set_brightness`] is called.
pub const DEFAULT_BRIGHTNESS: u8 = 7;

fn display_control(brightness: u8) -> u8 {
    SegmentCommand::DisplayControl as u8 | SEGMENT_DISPLAY_ON | (brightness & 0x07)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddram_address_interleaves_rows() {
        assert_eq!(ddram_address(0, 0, 16), 0x00);
        assert_eq!(ddram_address(5, 1, 16), 0x45);
        assert_eq!(ddram_address(0, 2, 20), 20);
        assert_eq!(ddram_address(2, 3, 16), 58);
        // only six address bits of the column are used
        assert_eq!(ddram_address(0x41, 0, 16), 0x01);
    }

    #[test]
    fn expander_byte_folds_control_bits() {
        assert_eq!(expander_byte(0x3, Mode::Cmd, Backlight::Off), 0x30);
        assert_eq!(expander_byte(0xA, Mode::Data, Backlight::On), 0xA9);
        assert_eq!(expander_byte(0x1F, Mode::Cmd, Backlight::On), 0xF8);
    }

    #[test]
    fn geometry_is_clamped() {
        assert_eq!(clamp_geometry(2, 16), (2, 16));
        assert_eq!(clamp_geometry(9, 80), (4, 40));
    }

    #[test]
    fn cursor_wraps_and_absorbs_newline() {
        let mut cursor = Cursor::new(2, 4);
        for ch in b"abcd" {
            assert!(cursor.advance(*ch));
        }
        assert_eq!((cursor.x, cursor.y), (0, 1));
        assert!(cursor.implied_newline);

        assert!(!cursor.advance(b'\n'));
        assert_eq!((cursor.x, cursor.y), (0, 1));
        assert!(!cursor.implied_newline);
    }

    #[test]
    fn implied_newline_only_covers_next_character() {
        let mut cursor = Cursor::new(3, 2);
        cursor.advance(b'a');
        cursor.advance(b'b');
        assert!(cursor.implied_newline);
        cursor.advance(b'c');
        assert!(!cursor.advance(b'\n'));
        assert_eq!((cursor.x, cursor.y), (0, 2));
    }

    #[test]
    fn explicit_newline_moves_to_next_line() {
        let mut cursor = Cursor::new(2, 16);
        cursor.advance(b'a');
        assert!(!cursor.advance(b'\n'));
        assert_eq!((cursor.x, cursor.y), (0, 1));
        assert!(!cursor.implied_newline);

        // the last row wraps to the first without scrolling
        cursor.advance(b'\n');
        assert_eq!((cursor.x, cursor.y), (0, 0));
    }

    #[test]
    fn place_clamps_onto_display() {
        let mut cursor = Cursor::new(2, 16);
        cursor.place(30, 7);
        assert_eq!((cursor.x, cursor.y), (15, 1));
    }

    #[test]
    fn display_control_masks_brightness() {
        assert_eq!(display_control(7), 0x8F);
        assert_eq!(display_control(0xFF), 0x8F);
        assert_eq!(display_control(0), 0x88);
    }
}
