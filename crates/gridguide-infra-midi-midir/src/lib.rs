mod codec;

pub use codec::{decode_message, encode_message};

use gridguide_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiMessage, MidiOutputPort, MidiOutputStream,
    TimedMessage, TimedMessageCallback,
};
use gridguide_ports::types::{DeviceId, MidiPortDevice};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::time::Instant;

const DEFAULT_CLIENT_NAME: &str = "GridGuide";

fn device_id(index: usize, name: &str) -> DeviceId {
    DeviceId(format!("midir:{}:{}", index, name))
}

/// Finds the port whose generated id matches `device_id`.
fn select_port<P: Clone>(
    ports: &[P],
    device_id: &DeviceId,
    port_name: impl Fn(&P) -> Option<String>,
) -> Result<P, MidiError> {
    ports
        .iter()
        .enumerate()
        .find(|(index, port)| {
            let name = port_name(port).unwrap_or_default();
            &self::device_id(*index, &name) == device_id
        })
        .map(|(_, port)| port.clone())
        .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))
}

pub struct MidirMidiInputPort {
    client_name: String,
}

impl MidirMidiInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_in(&self) -> Result<MidiInput, MidiError> {
        MidiInput::new(&self.client_name).map_err(|e| MidiError::Backend(e.to_string()))
    }
}

impl Default for MidirMidiInputPort {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_NAME)
    }
}

pub struct MidirMidiInputStream {
    connection: Option<MidiInputConnection<TimedMessageCallback>>,
}

impl MidiInputStream for MidirMidiInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }
}

impl MidiInputPort for MidirMidiInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiPortDevice>, MidiError> {
        let midi_in = self.create_midi_in()?;
        let devices = midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| "Unknown Input".to_string());
                MidiPortDevice {
                    id: device_id(index, &name),
                    name,
                }
            })
            .collect();
        Ok(devices)
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: TimedMessageCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let mut midi_in = self.create_midi_in()?;
        // sysex does not fit a short message; everything else is forwarded
        midi_in.ignore(Ignore::Sysex);

        let port = select_port(&midi_in.ports(), device_id, |port| {
            midi_in.port_name(port).ok()
        })?;

        let connection = midi_in
            .connect(
                &port,
                "gridguide-input",
                move |_stamp, bytes, callback| {
                    if let Some(message) = decode_message(bytes) {
                        (callback)(TimedMessage {
                            at: Instant::now(),
                            message,
                        });
                    }
                },
                cb,
            )
            .map_err(|e| MidiError::Backend(e.to_string()))?;

        Ok(Box::new(MidirMidiInputStream {
            connection: Some(connection),
        }))
    }
}

pub struct MidirMidiOutputPort {
    client_name: String,
}

impl MidirMidiOutputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_out(&self) -> Result<MidiOutput, MidiError> {
        MidiOutput::new(&self.client_name).map_err(|e| MidiError::Backend(e.to_string()))
    }
}

impl Default for MidirMidiOutputPort {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_NAME)
    }
}

pub struct MidirMidiOutputStream {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputStream for MidirMidiOutputStream {
    fn send(&mut self, message: MidiMessage) -> Result<(), MidiError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| MidiError::DeviceUnavailable("output closed".to_string()))?;
        connection
            .send(&encode_message(message))
            .map_err(|e| MidiError::Send(e.to_string()))
    }

    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl MidiOutputPort for MidirMidiOutputPort {
    fn list_outputs(&self) -> Result<Vec<MidiPortDevice>, MidiError> {
        let midi_out = self.create_midi_out()?;
        let devices = midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| "Unknown Output".to_string());
                MidiPortDevice {
                    id: device_id(index, &name),
                    name,
                }
            })
            .collect();
        Ok(devices)
    }

    fn open_output(&self, device_id: &DeviceId) -> Result<Box<dyn MidiOutputStream>, MidiError> {
        let midi_out = self.create_midi_out()?;
        let port = select_port(&midi_out.ports(), device_id, |port| {
            midi_out.port_name(port).ok()
        })?;
        let connection = midi_out
            .connect(&port, "gridguide-output")
            .map_err(|e| MidiError::Backend(e.to_string()))?;
        Ok(Box::new(MidirMidiOutputStream {
            connection: Some(connection),
        }))
    }
}
