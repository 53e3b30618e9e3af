use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::glyph::{self, Glyphs, DOT};
use crate::{
    display_control, SegmentCommand, DEFAULT_BRIGHTNESS, MAX_SEGMENT_POSITION,
    SEGMENT_BIT_DELAY_US,
};

/// API to write to a TM1637 7-segment module, async flavour of
/// [`crate::sync_tm1637::SegmentDisplay`].
///
/// Only the delays are awaited, the pins are plain blocking outputs.
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
    pub async fn init(mut self) -> Result<Self, CLK::Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!("tm1637 init, brightness {}", self.brightness);

        // Clock goes low first so the data line cannot form a start condition.
        self.clk.set_low()?;
        self.dio.set_low()?;
        self.tick().await;

        self.write_data_cmd().await?;
        self.write_dsp_ctrl().await?;
        Ok(self)
    }

    async fn tick(&mut self) {
        self.delay.delay_us(SEGMENT_BIT_DELAY_US).await;
    }

    async fn start(&mut self) -> Result<(), CLK::Error> {
        self.dio.set_low()?;
        self.tick().await;
        self.clk.set_low()?;
        self.tick().await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CLK::Error> {
        self.dio.set_low()?;
        self.tick().await;
        self.clk.set_high()?;
        self.tick().await;
        self.dio.set_high()?;
        self.tick().await;
        Ok(())
    }

    async fn clock_pulse(&mut self) -> Result<(), CLK::Error> {
        self.clk.set_high()?;
        self.tick().await;
        self.clk.set_low()?;
        self.tick().await;
        Ok(())
    }

    /// Eight bits LSB first, then the ack clock. The ack itself is never read.
    async fn write_byte(&mut self, byte: u8) -> Result<(), CLK::Error> {
        for i in 0..8 {
            if (byte >> i) & 1 != 0 {
                self.dio.set_high()?;
            } else {
                self.dio.set_low()?;
            }
            self.tick().await;
            self.clock_pulse().await?;
        }
        self.clk.set_low()?;
        self.tick().await;
        self.clock_pulse().await
    }

    async fn frame(&mut self, bytes: &[u8]) -> Result<(), CLK::Error> {
        self.start().await?;
        for byte in bytes {
            self.write_byte(*byte).await?;
        }
        self.stop().await
    }

    async fn write_data_cmd(&mut self) -> Result<(), CLK::Error> {
        self.frame(&[SegmentCommand::DataAuto as u8]).await
    }

    async fn write_dsp_ctrl(&mut self) -> Result<(), CLK::Error> {
        self.frame(&[display_control(self.brightness)]).await
    }

    /// Set the brightness, 0 is 1/16th pulse width, 7 is 14/16th. Only the lower three bits
    /// are used.
    pub async fn set_brightness(&mut self, brightness: u8) -> Result<(), CLK::Error> {
        self.brightness = brightness & 0x07;
        self.write_data_cmd().await?;
        self.write_dsp_ctrl().await
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Write raw segment bytes to consecutive digits starting at `pos`.
    ///
    /// Positions above [`MAX_SEGMENT_POSITION`] are ignored.
    pub async fn write(&mut self, segments: &[u8], pos: u8) -> Result<(), CLK::Error> {
        if pos > MAX_SEGMENT_POSITION {
            return Ok(());
        }
        self.write_data_cmd().await?;
        self.start().await?;
        self.write_byte(SegmentCommand::Address as u8 | pos).await?;
        for byte in segments {
            self.write_byte(*byte).await?;
        }
        self.stop().await?;
        self.write_dsp_ctrl().await
    }

    /// Show `text` from the first digit on, optionally with the colon lit.
    pub async fn show(&mut self, text: &str, colon: bool) -> Result<(), CLK::Error> {
        let mut segments = glyph::encode_string(text);
        if colon {
            segments.set_colon();
        }
        self.segments = segments;
        self.refresh().await
    }

    /// Add `text` after the glyphs already shown and send the result. Text that does not fit
    /// is dropped, `.` and `:` light the dot of the previous digit. [`Self::show`] starts over.
    pub async fn append(&mut self, text: &str) -> Result<(), CLK::Error> {
        self.segments.append(text.as_bytes());
        self.refresh().await
    }

    /// Send the glyphs of the last [`Self::show`] again.
    pub async fn refresh(&mut self) -> Result<(), CLK::Error> {
        let segments = self.segments;
        self.write(segments.as_slice(), 0).await
    }

    /// Glyphs on the display, as left by [`Self::show`] and [`Self::append`].
    pub fn segments(&self) -> &Glyphs {
        &self.segments
    }

    /// Set the segments of a single digit.
    pub async fn set_raw(&mut self, pos: u8, data: u8) -> Result<(), CLK::Error> {
        if pos > MAX_SEGMENT_POSITION {
            return Ok(());
        }
        self.frame(&[SegmentCommand::DataFixed as u8]).await?;
        self.frame(&[SegmentCommand::Address as u8 | pos, data]).await?;
        self.write_dsp_ctrl().await
    }

    /// Set a single character, optionally with its decimal point.
    pub async fn set_char(&mut self, pos: u8, ch: u8, dot: bool) -> Result<(), CLK::Error> {
        let mut data = glyph::encode_char(ch);
        if dot {
            data |= DOT;
        }
        self.set_raw(pos, data).await
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::testing::{decode_segments, recording_lines};
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::vec;

    #[test]
    fn show_and_brightness() {
        let (mut clk, mut dio, trace) = recording_lines();
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut display = SegmentDisplay::new(&mut clk, &mut dio, &mut delay)
                .init()
                .await
                .unwrap();
            display.show("-1", false).await.unwrap();
            display.set_brightness(12).await.unwrap();
            assert_eq!(display.brightness(), 4);
        });
        assert_eq!(
            decode_segments(&trace.borrow()),
            vec![
                vec![0x40],
                vec![0x8F],
                vec![0x40],
                vec![0xC0, 0x40, 0x06],
                vec![0x8F],
                vec![0x40],
                vec![0x8C],
            ]
        );
    }

    #[test]
    fn set_raw_ignores_out_of_range_position() {
        let (mut clk, mut dio, trace) = recording_lines();
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut display = SegmentDisplay::new(&mut clk, &mut dio, &mut delay)
                .init()
                .await
                .unwrap();
            trace.borrow_mut().clear();
            display.set_raw(5, 0xFF).await.unwrap();
            assert!(trace.borrow().is_empty());
            display.set_raw(0, 0xFF).await.unwrap();
        });
        assert_eq!(
            decode_segments(&trace.borrow()),
            vec![vec![0x44], vec![0xC0, 0xFF], vec![0x8F]]
        );
    }

    #[test]
    fn append_extends_shown_text() {
        let (mut clk, mut dio, trace) = recording_lines();
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut display = SegmentDisplay::new(&mut clk, &mut dio, &mut delay)
                .init()
                .await
                .unwrap();
            display.show("12", false).await.unwrap();
            trace.borrow_mut().clear();
            display.append(":3").await.unwrap();
        });
        assert_eq!(
            decode_segments(&trace.borrow()),
            vec![vec![0x40], vec![0xC0, 0x06, 0x5B | DOT, 0x4F], vec![0x8F]]
        );
    }
}
