use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use ufmt_write::uWrite;

use crate::glyph::{self, Glyphs, DOT};
use crate::{
    display_control, SegmentCommand, DEFAULT_BRIGHTNESS, MAX_SEGMENT_POSITION,
    SEGMENT_BIT_DELAY_US,
};

/// API to write to a TM1637 7-segment module.
///
/// The TM1637 speaks a two wire protocol that looks like I2C without addresses and with bytes
/// sent LSB first, so it is bit banged on two plain output pins. Both pins should be configured
/// as open drain outputs with pull-ups before they are handed over.
pub struct SegmentDisplay<'a, CLK, DIO, D>
where
    CLK: OutputPin,
    DIO: OutputPin<Error = CLK::Error>,
    D: DelayNs,
{
    clk: &'a mut CLK,
    dio: &'a mut DIO,
    delay: &'a mut D,
    brightness: u8,
    segments: Glyphs,
}

impl<'a, CLK, DIO, D> SegmentDisplay<'a, CLK, DIO, D>
where
    CLK: OutputPin,
    DIO: OutputPin<Error = CLK::Error>,
    D: DelayNs,
{
    /// Create new instance with the clock and data pin and a delay instance.
    pub fn new(clk: &'a mut CLK, dio: &'a mut DIO, delay: &'a mut D) -> Self {
        Self {
            clk,
            dio,
            delay,
            brightness: DEFAULT_BRIGHTNESS,
            segments: Glyphs::default(),
        }
    }

    /// Brightness applied by [`Self::init`], only the lower three bits are used.
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness & 0x07;
        self
    }

    /// Puts the lines into their idle state and switches the display on.
    pub fn init(mut self) -> Result<Self, CLK::Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!("tm1637 init, brightness {}", self.brightness);

        // Clock goes low first so the data line cannot form a start condition.
        self.clk.set_low()?;
        self.dio.set_low()?;
        self.tick();

        self.write_data_cmd()?;
        self.write_dsp_ctrl()?;
        Ok(self)
    }

    fn tick(&mut self) {
        self.delay.delay_us(SEGMENT_BIT_DELAY_US);
    }

    fn start(&mut self) -> Result<(), CLK::Error> {
        self.dio.set_low()?;
        self.tick();
        self.clk.set_low()?;
        self.tick();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CLK::Error> {
        self.dio.set_low()?;
        self.tick();
        self.clk.set_high()?;
        self.tick();
        self.dio.set_high()?;
        self.tick();
        Ok(())
    }

    fn clock_pulse(&mut self) -> Result<(), CLK::Error> {
        self.clk.set_high()?;
        self.tick();
        self.clk.set_low()?;
        self.tick();
        Ok(())
    }

    /// Eight bits LSB first, then the ack clock. The ack itself is never read.
    fn write_byte(&mut self, byte: u8) -> Result<(), CLK::Error> {
        for i in 0..8 {
            if (byte >> i) & 1 != 0 {
                self.dio.set_high()?;
            } else {
                self.dio.set_low()?;
            }
            self.tick();
            self.clock_pulse()?;
        }
        self.clk.set_low()?;
        self.tick();
        self.clock_pulse()
    }

    fn frame(&mut self, bytes: &[u8]) -> Result<(), CLK::Error> {
        self.start()?;
        for byte in bytes {
            self.write_byte(*byte)?;
        }
        self.stop()
    }

    fn write_data_cmd(&mut self) -> Result<(), CLK::Error> {
        self.frame(&[SegmentCommand::DataAuto as u8])
    }

    fn write_dsp_ctrl(&mut self) -> Result<(), CLK::Error> {
        self.frame(&[display_control(self.brightness)])
    }

    /// Set the brightness, 0 is 1/16th pulse width, 7 is 14/16th. Only the lower three bits
    /// are used.
    pub fn set_brightness(&mut self, brightness: u8) -> Result<(), CLK::Error> {
        self.brightness = brightness & 0x07;
        self.write_data_cmd()?;
        self.write_dsp_ctrl()
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Write raw segment bytes to consecutive digits starting at `pos`.
    ///
    /// Positions above [`MAX_SEGMENT_POSITION`] are ignored.
    pub fn write(&mut self, segments: &[u8], pos: u8) -> Result<(), CLK::Error> {
        if pos > MAX_SEGMENT_POSITION {
            return Ok(());
        }
        self.write_data_cmd()?;
        self.start()?;
        self.write_byte(SegmentCommand::Address as u8 | pos)?;
        for byte in segments {
            self.write_byte(*byte)?;
        }
        self.stop()?;
        self.write_dsp_ctrl()
    }

    /// Show `text` from the first digit on, optionally with the colon lit.
    pub fn show(&mut self, text: &str, colon: bool) -> Result<(), CLK::Error> {
        let mut segments = glyph::encode_string(text);
        if colon {
            segments.set_colon();
        }
        self.segments = segments;
        self.refresh()
    }

    /// Add `text` after the glyphs already shown and send the result. Text that does not fit
    /// is dropped, `.` and `:` light the dot of the previous digit. [`Self::show`] starts over.
    pub fn append(&mut self, text: &str) -> Result<(), CLK::Error> {
        self.segments.append(text.as_bytes());
        self.refresh()
    }

    /// Send the glyphs of the last [`Self::show`] again.
    pub fn refresh(&mut self) -> Result<(), CLK::Error> {
        let segments = self.segments;
        self.write(segments.as_slice(), 0)
    }

    /// Glyphs on the display, as left by [`Self::show`] and [`Self::append`].
    pub fn segments(&self) -> &Glyphs {
        &self.segments
    }

    /// Set the segments of a single digit.
    pub fn set_raw(&mut self, pos: u8, data: u8) -> Result<(), CLK::Error> {
        if pos > MAX_SEGMENT_POSITION {
            return Ok(());
        }
        self.frame(&[SegmentCommand::DataFixed as u8])?;
        self.frame(&[SegmentCommand::Address as u8 | pos, data])?;
        self.write_dsp_ctrl()
    }

    /// Set a single character, optionally with its decimal point.
    pub fn set_char(&mut self, pos: u8, ch: u8, dot: bool) -> Result<(), CLK::Error> {
        let mut data = glyph::encode_char(ch);
        if dot {
            data |= DOT;
        }
        self.set_raw(pos, data)
    }
}

impl<'a, CLK, DIO, D> uWrite for SegmentDisplay<'a, CLK, DIO, D>
where
    CLK: OutputPin,
    DIO: OutputPin<Error = CLK::Error>,
    D: DelayNs,
{
    type Error = CLK::Error;

    /// Every fragment of a `uwrite!` is appended, call [`SegmentDisplay::show`] with an empty
    /// string to start a fresh line of text.
    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.append(s)
    }
}
