use crate::output::SharedOutput;
use gridguide_domain_grid::{PadCoord, ROWS};
use gridguide_ports::midi::{MidiError, MidiMessage};

pub const CC_HIGHLIGHT_COLUMN: u8 = 20;
pub const CC_HIGHLIGHT_ROW: u8 = 21;
pub const CC_HIGHLIGHT_COLOR: u8 = 22;

pub const COLOR_OFF: u8 = 0;

/// Lights pads on the device through its column/row/color controllers.
#[derive(Clone)]
pub struct PadHighlighter {
    output: SharedOutput,
    channel: u8,
}

impl PadHighlighter {
    pub fn new(output: SharedOutput, channel: u8) -> Self {
        Self { output, channel }
    }

    pub fn highlight_pad(&self, coord: PadCoord, color: u8) -> Result<(), MidiError> {
        let cc = |controller, value| MidiMessage::ControlChange {
            channel: self.channel,
            controller,
            value,
        };
        // column 0 is the settings column, playable pads start at 1
        self.output.send_all(&[
            cc(CC_HIGHLIGHT_COLUMN, coord.x + 1),
            cc(CC_HIGHLIGHT_ROW, coord.y),
            cc(CC_HIGHLIGHT_COLOR, color),
        ])
    }

    pub fn highlight_pads(&self, coords: &[PadCoord], color: u8) -> Result<(), MidiError> {
        for coord in coords {
            self.highlight_pad(*coord, color)?;
        }
        Ok(())
    }

    pub fn clear_all(&self, columns: usize) -> Result<(), MidiError> {
        for x in 0..columns {
            for y in 0..ROWS {
                self.highlight_pad(
                    PadCoord {
                        x: x as u8,
                        y: y as u8,
                    },
                    COLOR_OFF,
                )?;
            }
        }
        Ok(())
    }
}
