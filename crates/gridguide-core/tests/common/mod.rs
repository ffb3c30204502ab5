#![allow(dead_code)]

use gridguide_core::{DeviceStateSync, SharedOutput, NRPN_REQUEST_VALUE};
use gridguide_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiMessage, MidiOutputPort, MidiOutputStream,
    TimedMessage, TimedMessageCallback, CC_DATA_ENTRY_LSB, CC_DATA_ENTRY_MSB, CC_NRPN_LSB,
    CC_NRPN_MSB,
};
use gridguide_ports::types::{DeviceId, MidiPortDevice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

/// Records everything sent and reports each completed parameter query.
pub struct FakeOutputStream {
    sent: Arc<Mutex<Vec<MidiMessage>>>,
    queries: mpsc::UnboundedSender<u16>,
    nrpn: (u8, u8),
    data_msb: u8,
}

impl MidiOutputStream for FakeOutputStream {
    fn send(&mut self, message: MidiMessage) -> Result<(), MidiError> {
        self.sent.lock().push(message);
        if let MidiMessage::ControlChange {
            controller, value, ..
        } = message
        {
            match controller {
                CC_NRPN_MSB => self.nrpn.0 = value,
                CC_NRPN_LSB => self.nrpn.1 = value,
                CC_DATA_ENTRY_MSB => self.data_msb = value,
                CC_DATA_ENTRY_LSB => {
                    let param = ((self.nrpn.0 as u16) << 7) | self.nrpn.1 as u16;
                    if param == NRPN_REQUEST_VALUE {
                        let target = ((self.data_msb as u16) << 7) | value as u16;
                        let _ = self.queries.send(target);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) {}
}

pub struct FakeDevice {
    pub output: SharedOutput,
    pub sent: Arc<Mutex<Vec<MidiMessage>>>,
    pub queries: Option<mpsc::UnboundedReceiver<u16>>,
    /// Parameter values the device answers with; missing entries never answer.
    pub values: Arc<Mutex<HashMap<u16, u8>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (queries_tx, queries_rx) = mpsc::unbounded_channel();
        let stream = FakeOutputStream {
            sent: sent.clone(),
            queries: queries_tx,
            nrpn: (0, 0),
            data_msb: 0,
        };
        Self {
            output: SharedOutput::new("fake", Box::new(stream)),
            sent,
            queries: Some(queries_rx),
            values: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set_layout(&self, octave: u8, transpose: u8, row_interval: u8, tempo: u8) {
        let mut values = self.values.lock();
        values.insert(36, octave);
        values.insert(37, transpose);
        values.insert(227, row_interval);
        values.insert(238, tempo);
    }

    /// Answers queries through `respond` after `delay`, the way the device
    /// does: parameter number first, then the value on CC 38.
    pub fn spawn_responder<F>(&mut self, delay: Duration, respond: F) -> JoinHandle<()>
    where
        F: Fn(u8, u8) + Send + 'static,
    {
        let mut queries = self.queries.take().expect("responder already running");
        let values = self.values.clone();
        tokio::spawn(async move {
            while let Some(param) = queries.recv().await {
                let value = values.lock().get(&param).copied();
                if let Some(value) = value {
                    time::sleep(delay).await;
                    respond(CC_NRPN_MSB, (param >> 7) as u8);
                    respond(CC_NRPN_LSB, (param & 0x7F) as u8);
                    respond(CC_DATA_ENTRY_MSB, 0);
                    respond(CC_DATA_ENTRY_LSB, value);
                }
            }
        })
    }

    pub fn spawn_sync_responder(&mut self, sync: Arc<DeviceStateSync>, delay: Duration) -> JoinHandle<()> {
        self.spawn_responder(delay, move |controller, value| {
            sync.handle_response(controller, value);
        })
    }

    pub fn sent(&self) -> Vec<MidiMessage> {
        self.sent.lock().clone()
    }

    /// `(controller, value)` of every control change sent.
    pub fn control_changes(&self) -> Vec<(u8, u8)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|message| match *message {
                MidiMessage::ControlChange {
                    controller, value, ..
                } => Some((controller, value)),
                _ => None,
            })
            .collect()
    }

    /// Highlight triples `(column, row, color)`.
    pub fn highlights(&self) -> Vec<(u8, u8, u8)> {
        let ccs: Vec<(u8, u8)> = self
            .control_changes()
            .into_iter()
            .filter(|(controller, _)| matches!(controller, 20 | 21 | 22))
            .collect();
        ccs.chunks(3)
            .filter_map(|chunk| match chunk {
                [(20, x), (21, y), (22, color)] => Some((*x, *y, *color)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }
}

fn recording_stream(sent: Arc<Mutex<Vec<MidiMessage>>>) -> FakeOutputStream {
    let (queries, _) = mpsc::unbounded_channel();
    FakeOutputStream {
        sent,
        queries,
        nrpn: (0, 0),
        data_msb: 0,
    }
}

pub struct NullInputStream;

impl MidiInputStream for NullInputStream {
    fn close(self: Box<Self>) {}
}

/// Input port over a fixed device list; keeps each opened callback so tests
/// can push messages through it.
pub struct FakeInputPort {
    pub names: Vec<&'static str>,
    pub callbacks: Mutex<Vec<(DeviceId, TimedMessageCallback)>>,
}

impl FakeInputPort {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            names: names.to_vec(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn deliver(&self, device: &str, message: MidiMessage) {
        let id = DeviceId(device.to_string());
        for (opened, callback) in self.callbacks.lock().iter() {
            if *opened == id {
                callback(TimedMessage {
                    at: tokio::time::Instant::now(),
                    message,
                });
            }
        }
    }
}

fn port_devices(names: &[&'static str]) -> Vec<MidiPortDevice> {
    names
        .iter()
        .map(|name| MidiPortDevice {
            id: DeviceId(name.to_string()),
            name: name.to_string(),
        })
        .collect()
}

impl MidiInputPort for FakeInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiPortDevice>, MidiError> {
        Ok(port_devices(&self.names))
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: TimedMessageCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        self.callbacks.lock().push((device_id.clone(), cb));
        Ok(Box::new(NullInputStream))
    }
}

pub struct FakeOutputPort {
    pub names: Vec<&'static str>,
    pub sent: Arc<Mutex<Vec<MidiMessage>>>,
}

impl FakeOutputPort {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            names: names.to_vec(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MidiOutputPort for FakeOutputPort {
    fn list_outputs(&self) -> Result<Vec<MidiPortDevice>, MidiError> {
        Ok(port_devices(&self.names))
    }

    fn open_output(&self, _device_id: &DeviceId) -> Result<Box<dyn MidiOutputStream>, MidiError> {
        Ok(Box::new(recording_stream(self.sent.clone())))
    }
}
