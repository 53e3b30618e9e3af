use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use ufmt_write::uWrite;

use crate::{
    clamp_geometry, expander_byte, timing, Backlight, Cursor, DisplayControl, EntryMode,
    FunctionSet, Instruction, Mode, Pin, ShiftMode, DEFAULT_LCD_ADDRESS, FOUR_BIT_NIBBLE,
    RESET_NIBBLE, SLOW_COMMAND_MAX,
};

/// API to write to the LCD.
pub struct Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    i2c: &'a mut I,
    address: u8,
    delay: &'a mut D,
    backlight_state: Backlight,
    cursor: Cursor,
}

impl<'a, I, D> Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Create new instance with only the I2C and delay instance.
    pub fn new(i2c: &'a mut I, delay: &'a mut D) -> Self {
        Self {
            i2c,
            delay,
            backlight_state: Backlight::On,
            address: DEFAULT_LCD_ADDRESS,
            cursor: Cursor::default(),
        }
    }

    /// Set I2C address, see [lcd address].
    ///
    /// [lcd address]: https://badboi.dev/rust,/microcontrollers/2020/11/09/i2c-hello-world.html
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Initializes the hardware for a display with `lines` lines (at most 4) and `columns`
    /// columns (at most 40).
    pub fn init(mut self, lines: u8, columns: u8) -> Result<Self, I::Error> {
        self.reinit(lines, columns)?;
        Ok(self)
    }

    /// Runs the power on sequence again and resets all tracked state.
    ///
    /// The controller may be in 8 bit mode or halfway through a 4 bit transfer, so it is reset
    /// by instruction as described in the "Initializing by Instruction" section of the
    /// [datasheet]: three 8 bit function sets, then the switch to 4 bit mode.
    ///
    /// [datasheet]: https://www.sparkfun.com/datasheets/LCD/HD44780.pdf
    pub fn reinit(&mut self, lines: u8, columns: u8) -> Result<(), I::Error> {
        let (lines, columns) = clamp_geometry(lines, columns);
        self.cursor = Cursor::new(lines, columns);
        #[cfg(feature = "defmt")]
        defmt::debug!("lcd init {}x{} at {=u8:#x}", lines, columns, self.address);

        self.i2c.write(self.address, &[0])?;
        self.delay.delay_ms(timing::POWER_ON_MS);

        self.write_init_nibble(RESET_NIBBLE)?;
        self.delay.delay_ms(timing::FIRST_RESET_MS);
        self.write_init_nibble(RESET_NIBBLE)?;
        self.delay.delay_ms(timing::RESET_MS);
        self.write_init_nibble(RESET_NIBBLE)?;
        self.delay.delay_ms(timing::RESET_MS);

        // Switch to 4 bit mode
        self.write_init_nibble(FOUR_BIT_NIBBLE)?;
        self.delay.delay_ms(timing::RESET_MS);

        self.display_off()?;
        self.backlight_on()?;
        self.clear()?;
        self.command(Instruction::EntrySet as u8 | EntryMode::Increment as u8)?;
        self.hide_cursor()?;
        self.display_on()?;

        let function_set = if lines > 1 {
            Instruction::FunctionSet as u8 | FunctionSet::TwoLines as u8
        } else {
            Instruction::FunctionSet as u8
        };
        self.command(function_set)
    }

    /// Upper nibble of `data`, strobed without backlight or register select. Only used while
    /// the controller is still in 8 bit mode.
    fn write_init_nibble(&mut self, data: u8) -> Result<(), I::Error> {
        let byte = expander_byte(data >> 4, Mode::Cmd, Backlight::Off);
        self.strobe(byte)
    }

    /// Data is latched on the falling edge of enable.
    fn strobe(&mut self, byte: u8) -> Result<(), I::Error> {
        self.i2c.write(self.address, &[byte | Pin::Enable as u8])?;
        self.i2c.write(self.address, &[byte])
    }

    fn send(&mut self, data: u8, mode: Mode) -> Result<(), I::Error> {
        self.strobe(expander_byte(data >> 4, mode, self.backlight_state))?;
        self.strobe(expander_byte(data, mode, self.backlight_state))
    }

    fn command(&mut self, data: u8) -> Result<(), I::Error> {
        self.send(data, Mode::Cmd)?;
        if data <= SLOW_COMMAND_MAX {
            self.delay.delay_ms(timing::HOME_CLEAR_MS);
        }
        Ok(())
    }

    fn display_control(&mut self, flags: u8) -> Result<(), I::Error> {
        self.command(Instruction::DisplayControl as u8 | flags)
    }

    /// Switch the backlight. This is a side channel of the expander, not an LCD command.
    pub fn backlight(&mut self, backlight: Backlight) -> Result<(), I::Error> {
        self.backlight_state = backlight;
        self.i2c.write(self.address, &[backlight as u8])
    }

    pub fn backlight_on(&mut self) -> Result<(), I::Error> {
        self.backlight(Backlight::On)
    }

    pub fn backlight_off(&mut self) -> Result<(), I::Error> {
        self.backlight(Backlight::Off)
    }

    /// Clear the display and move the cursor to the upper left corner.
    pub fn clear(&mut self) -> Result<(), I::Error> {
        self.command(Instruction::Clear as u8)?;
        self.return_home()
    }

    /// Return cursor to upper left corner, i.e. (0,0). The content is not touched.
    pub fn return_home(&mut self) -> Result<(), I::Error> {
        self.command(Instruction::ReturnHome as u8)?;
        self.cursor.place(0, 0);
        Ok(())
    }

    /// Unblank the display, cursor hidden.
    pub fn display_on(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::DisplayOn as u8)
    }

    /// Blank the display. Content and cursor position are kept.
    pub fn display_off(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::Off as u8)
    }

    pub fn hide_cursor(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::DisplayOn as u8)
    }

    /// Show a blinking cursor.
    pub fn blink_cursor_on(&mut self) -> Result<(), I::Error> {
        self.display_control(
            DisplayControl::DisplayOn as u8
                | DisplayControl::CursorOn as u8
                | DisplayControl::CursorBlink as u8,
        )
    }

    /// Show a solid cursor.
    pub fn blink_cursor_off(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::DisplayOn as u8 | DisplayControl::CursorOn as u8)
    }

    /// Set the cursor to (x, y). Coordinates are zero-based and clamped onto the display.
    pub fn move_to(&mut self, x: u8, y: u8) -> Result<(), I::Error> {
        self.cursor.place(x, y);
        self.sync_address()
    }

    /// Points the controller's address counter at the tracked cursor.
    fn sync_address(&mut self) -> Result<(), I::Error> {
        self.command(Instruction::DdramAddr as u8 | self.cursor.address())
    }

    /// Write a single character at the cursor and advance it.
    ///
    /// `'\n'` moves to the start of the next line, unless the previous character already wrapped
    /// the cursor there. Past the last line the cursor wraps to the first line, the display does
    /// not scroll.
    pub fn put_char(&mut self, ch: u8) -> Result<(), I::Error> {
        if self.cursor.advance(ch) {
            self.send(ch, Mode::Data)?;
        }
        // The controller's address counter does not follow our line layout.
        self.sync_address()
    }

    /// Write string to display. The UTF-8 bytes are sent unchanged, so anything beyond ASCII
    /// shows up as several ROM glyphs. `'\x00'` to `'\x07'` print the custom characters.
    pub fn put_string(&mut self, data: &str) -> Result<(), I::Error> {
        for byte in data.bytes() {
            self.put_char(byte)?;
        }
        Ok(())
    }

    /// Store a 5x8 glyph in one of the eight CGRAM slots, afterwards printable as `'\x00'` to
    /// `'\x07'`. Each byte of `bitmap` is one row, top row first, lower five bits used.
    pub fn custom_char(&mut self, location: u8, bitmap: &[u8; 8]) -> Result<(), I::Error> {
        self.command(Instruction::CgramAddr as u8 | ((location & 0x7) << 3))?;
        self.delay.delay_us(timing::CGRAM_WRITE_US);
        for row in bitmap {
            self.send(*row, Mode::Data)?;
            self.delay.delay_us(timing::CGRAM_WRITE_US);
        }
        // CGRAM and DDRAM share the address counter.
        self.sync_address()
    }

    /// Scrolls the display one char to the left
    pub fn scroll_display_left(&mut self) -> Result<(), I::Error> {
        self.command(Instruction::Shift as u8 | ShiftMode::MoveDisplay as u8)
    }

    /// Scrolls the display one char to the right
    pub fn scroll_display_right(&mut self) -> Result<(), I::Error> {
        self.command(
            Instruction::Shift as u8 | ShiftMode::MoveDisplay as u8 | ShiftMode::Right as u8,
        )
    }

    /// Zero based (column, line) of the cursor.
    pub fn cursor(&self) -> (u8, u8) {
        (self.cursor.x, self.cursor.y)
    }

    pub fn lines(&self) -> u8 {
        self.cursor.lines
    }

    pub fn columns(&self) -> u8 {
        self.cursor.columns
    }

    /// Whether the cursor just wrapped to a new line on its own.
    pub fn implied_newline(&self) -> bool {
        self.cursor.implied_newline
    }

    pub fn backlight_state(&self) -> Backlight {
        self.backlight_state
    }
}

impl<'a, I, D> uWrite for Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    type Error = I::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.put_string(s)
    }
}
