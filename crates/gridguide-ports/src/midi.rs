use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

/// NRPN parameter number, coarse.
pub const CC_NRPN_MSB: u8 = 99;
/// NRPN parameter number, fine.
pub const CC_NRPN_LSB: u8 = 98;
pub const CC_DATA_ENTRY_MSB: u8 = 6;
/// Data entry fine. Devices answer a parameter query with the value on this controller.
pub const CC_DATA_ENTRY_LSB: u8 = 38;

/// Channel numbers are zero based (0 = MIDI channel 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiMessage {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// One of the NRPN controllers (99/98/6/38) received from a device.
    ParameterResponse {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Polyphonic key pressure.
    KeyPressure {
        channel: u8,
        note: u8,
        pressure: u8,
    },
    /// Any other short message (pitch bend, channel pressure, program
    /// change, system common and realtime), kept as received.
    Other { bytes: [u8; 3], len: u8 },
}

impl MidiMessage {
    /// Classifies an incoming control change: NRPN controllers become
    /// `ParameterResponse`, everything else stays a plain `ControlChange`.
    pub fn from_control_change(channel: u8, controller: u8, value: u8) -> Self {
        match controller {
            CC_NRPN_MSB | CC_NRPN_LSB | CC_DATA_ENTRY_MSB | CC_DATA_ENTRY_LSB => {
                MidiMessage::ParameterResponse {
                    channel,
                    controller,
                    value,
                }
            }
            _ => MidiMessage::ControlChange {
                channel,
                controller,
                value,
            },
        }
    }

    /// Wraps an undecoded message of one to three bytes starting with a
    /// status byte.
    pub fn raw(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        if status < 0x80 || data.len() > 3 {
            return None;
        }
        let mut bytes = [0; 3];
        bytes[..data.len()].copy_from_slice(data);
        Some(MidiMessage::Other {
            bytes,
            len: data.len() as u8,
        })
    }

    /// `None` for system messages.
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ParameterResponse { channel, .. }
            | MidiMessage::KeyPressure { channel, .. } => Some(channel),
            MidiMessage::Other { bytes, .. } if bytes[0] < 0xF0 => Some(bytes[0] & 0x0F),
            MidiMessage::Other { .. } => None,
        }
    }
}

/// A decoded message stamped with the monotonic arrival time.
#[derive(Clone, Copy, Debug)]
pub struct TimedMessage {
    pub at: Instant,
    pub message: MidiMessage,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// MIDI input stream handle: drop closes it.
pub trait MidiInputStream: Send {
    fn close(self: Box<Self>);
}

pub type TimedMessageCallback = Arc<dyn Fn(TimedMessage) + Send + Sync + 'static>;

pub trait MidiInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<MidiPortDevice>, MidiError>;

    /// Open input stream: implementation should invoke cb from a background thread/callback.
    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: TimedMessageCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError>;
}

pub trait MidiOutputStream: Send {
    fn send(&mut self, message: MidiMessage) -> Result<(), MidiError>;
    fn close(self: Box<Self>);
}

pub trait MidiOutputPort: Send + Sync {
    fn list_outputs(&self) -> Result<Vec<MidiPortDevice>, MidiError>;

    fn open_output(&self, device_id: &DeviceId) -> Result<Box<dyn MidiOutputStream>, MidiError>;
}
