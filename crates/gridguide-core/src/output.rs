use gridguide_ports::midi::{MidiError, MidiMessage, MidiOutputStream};
use parking_lot::Mutex;
use std::sync::Arc;

/// Output stream shared between the tasks that talk to one device.
#[derive(Clone)]
pub struct SharedOutput {
    name: Arc<str>,
    stream: Arc<Mutex<Option<Box<dyn MidiOutputStream>>>>,
}

impl SharedOutput {
    pub fn new(name: impl Into<String>, stream: Box<dyn MidiOutputStream>) -> Self {
        Self {
            name: Arc::from(name.into()),
            stream: Arc::new(Mutex::new(Some(stream))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send(&self, message: MidiMessage) -> Result<(), MidiError> {
        self.send_all(&[message])
    }

    /// Sends `messages` back to back; no other sender can interleave.
    pub fn send_all(&self, messages: &[MidiMessage]) -> Result<(), MidiError> {
        let mut guard = self.stream.lock();
        let stream = guard
            .as_mut()
            .ok_or_else(|| MidiError::DeviceUnavailable(self.name.to_string()))?;
        for message in messages {
            stream.send(*message)?;
        }
        Ok(())
    }

    pub fn close(&self) {
        if let Some(stream) = self.stream.lock().take() {
            stream.close();
        }
    }
}
