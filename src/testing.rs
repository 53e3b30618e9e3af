//! Recording fakes for the unit tests.
//!
//! `embedded-hal-mock` checks exact sequences, which is what the init tests want. Most other
//! tests only care about the decoded frames, these fakes record everything and decode afterwards.

extern crate std;

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{ErrorType, I2c, Operation};

use crate::{Backlight, Pin};

/// I2C bus remembering every written byte together with its address.
#[derive(Default)]
pub struct RecordingBus {
    pub writes: Vec<(u8, u8)>,
}

impl RecordingBus {
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.iter().map(|(_, byte)| *byte).collect()
    }

    pub fn frames(&self) -> Vec<LcdFrame> {
        decode_lcd(&self.bytes())
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl ErrorType for RecordingBus {
    type Error = Infallible;
}

impl I2c for RecordingBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            if let Operation::Write(bytes) = op {
                self.writes.extend(bytes.iter().map(|b| (address, *b)));
            }
        }
        Ok(())
    }
}

#[cfg(feature = "async")]
impl embedded_hal_async::i2c::I2c for RecordingBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        I2c::transaction(self, address, operations)
    }
}

/// What the expander saw, grouped back into controller transfers.
#[derive(Debug, PartialEq, Eq)]
pub enum LcdFrame {
    /// Byte written without an enable strobe, e.g. the backlight side channel.
    Raw(u8),
    Command { value: u8, backlight: Backlight },
    Data { value: u8, backlight: Backlight },
}

impl LcdFrame {
    pub fn command(value: u8) -> Self {
        LcdFrame::Command {
            value,
            backlight: Backlight::On,
        }
    }

    pub fn data(value: u8) -> Self {
        LcdFrame::Data {
            value,
            backlight: Backlight::On,
        }
    }
}

/// Pairs enable strobes into nibbles and nibbles into bytes. Only valid for traffic after init,
/// where every strobed transfer is a full byte.
pub fn decode_lcd(bytes: &[u8]) -> Vec<LcdFrame> {
    let enable = Pin::Enable as u8;
    let mut frames = Vec::new();
    let mut high: Option<u8> = None;
    let mut iter = bytes.iter().copied();
    while let Some(byte) = iter.next() {
        if byte & enable == 0 {
            frames.push(LcdFrame::Raw(byte));
            continue;
        }
        let latched = iter.next();
        assert_eq!(latched, Some(byte & !enable), "enable strobe not released");
        let nibble = byte >> 4;
        match high.take() {
            None => high = Some(nibble),
            Some(hi) => {
                let value = (hi << 4) | nibble;
                let backlight = if byte & Backlight::On as u8 != 0 {
                    Backlight::On
                } else {
                    Backlight::Off
                };
                if byte & Pin::Rs as u8 != 0 {
                    frames.push(LcdFrame::Data { value, backlight });
                } else {
                    frames.push(LcdFrame::Command { value, backlight });
                }
            }
        }
    }
    assert!(high.is_none(), "dangling nibble");
    frames
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Clk,
    Dio,
}

type Trace = Rc<RefCell<Vec<(Line, bool)>>>;

/// One of the two TM1637 lines, logging level changes into a shared trace.
pub struct RecordingLine {
    line: Line,
    trace: Trace,
}

impl PinErrorType for RecordingLine {
    type Error = Infallible;
}

impl OutputPin for RecordingLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.trace.borrow_mut().push((self.line, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.trace.borrow_mut().push((self.line, true));
        Ok(())
    }
}

/// Clock and data line sharing one trace.
pub fn recording_lines() -> (RecordingLine, RecordingLine, Trace) {
    let trace = Trace::default();
    let clk = RecordingLine {
        line: Line::Clk,
        trace: trace.clone(),
    };
    let dio = RecordingLine {
        line: Line::Dio,
        trace: trace.clone(),
    };
    (clk, dio, trace)
}

/// Decodes a TM1637 waveform into the bytes of each start/stop frame.
///
/// Bits are sampled on rising clock edges. A frame ends with the stop condition (data rising
/// while clock is high), whose own clock edge is dropped together with the ninth ack clock of
/// each byte.
pub fn decode_segments(trace: &[(Line, bool)]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut bits = Vec::new();
    let (mut clk, mut dio) = (false, false);
    for &(line, level) in trace {
        match line {
            Line::Clk => {
                if level && !clk {
                    bits.push(dio);
                }
                clk = level;
            }
            Line::Dio => {
                if level && !dio && clk {
                    bits.pop();
                    assert_eq!(bits.len() % 9, 0, "frame is not whole bytes");
                    let frame = bits
                        .chunks(9)
                        .map(|byte| {
                            byte[..8]
                                .iter()
                                .enumerate()
                                .fold(0u8, |acc, (i, bit)| acc | ((*bit as u8) << i))
                        })
                        .collect();
                    frames.push(frame);
                    bits.clear();
                }
                dio = level;
            }
        }
    }
    assert!(bits.is_empty(), "unterminated frame");
    frames
}
