use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiPortDevice {
    pub id: DeviceId,
    pub name: String,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves a configured port name against an enumerated device list.
///
/// Exact matches win; otherwise the first device whose name starts with `name`
/// is used, since backends often append a client or port suffix.
pub fn find_device_by_name<'a>(devices: &'a [MidiPortDevice], name: &str) -> Option<&'a MidiPortDevice> {
    devices
        .iter()
        .find(|device| device.name == name)
        .or_else(|| devices.iter().find(|device| device.name.starts_with(name)))
}
