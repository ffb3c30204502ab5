use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_delayed_threshold_ms() -> u64 {
    100
}

fn default_missed_threshold_ms() -> u64 {
    500
}

fn default_key_pressure_note_offset() -> u8 {
    21
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// How the guide input announces notes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuideEncoding {
    #[default]
    NoteOn,
    /// Light-guide keyboards that report lit keys as polyphonic key pressure.
    KeyPressure,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub instrument_input_port: Option<String>,
    pub instrument_output_port: Option<String>,
    pub guide_input_port: Option<String>,
    pub forward_ports: Vec<String>,

    pub guide_highlight_color: u8,
    /// Zero based MIDI channel the pad highlight CCs are sent on.
    pub highlight_channel: u8,

    /// Number of pads on the device (8 rows).
    pub device_width: u32,
    pub start_note: i32,
    pub row_interval: i32,
    pub column_interval: i32,
    pub bpm: u16,

    #[serde(default = "default_delayed_threshold_ms")]
    pub delayed_threshold_ms: u64,
    #[serde(default = "default_missed_threshold_ms")]
    pub missed_threshold_ms: u64,

    pub update_state_interval_ms: u64,
    pub state_failure_penalty_ms: u64,
    pub param_timeout_ms: u64,
    pub pause_threshold_ms: u64,
    pub idle_check_interval_ms: u64,
    pub fade_out_delay_ms: u64,
    pub history_capacity: usize,

    pub guide_encoding: GuideEncoding,
    #[serde(default = "default_key_pressure_note_offset")]
    pub key_pressure_note_offset: u8,
    /// Put the device into its alternate operating mode while running.
    pub alternate_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instrument_input_port: Some("LinnStrument MIDI".to_string()),
            instrument_output_port: Some("LinnStrument MIDI".to_string()),
            guide_input_port: Some("Loop Back C".to_string()),
            forward_ports: Vec::new(),
            guide_highlight_color: 3,
            highlight_channel: 0,
            device_width: 128,
            start_note: 30,
            row_interval: 5,
            column_interval: 1,
            bpm: 120,
            delayed_threshold_ms: default_delayed_threshold_ms(),
            missed_threshold_ms: default_missed_threshold_ms(),
            update_state_interval_ms: 200,
            state_failure_penalty_ms: 3000,
            param_timeout_ms: 250,
            pause_threshold_ms: 3000,
            idle_check_interval_ms: 500,
            fade_out_delay_ms: 200,
            history_capacity: 4096,
            guide_encoding: GuideEncoding::NoteOn,
            key_pressure_note_offset: default_key_pressure_note_offset(),
            alternate_mode: false,
        }
    }
}

impl Settings {
    pub fn delayed_threshold(&self) -> Duration {
        Duration::from_millis(self.delayed_threshold_ms)
    }

    pub fn missed_threshold(&self) -> Duration {
        Duration::from_millis(self.missed_threshold_ms)
    }

    pub fn update_state_interval(&self) -> Duration {
        Duration::from_millis(self.update_state_interval_ms)
    }

    pub fn state_failure_penalty(&self) -> Duration {
        Duration::from_millis(self.state_failure_penalty_ms)
    }

    pub fn param_timeout(&self) -> Duration {
        Duration::from_millis(self.param_timeout_ms)
    }

    pub fn pause_threshold(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    pub fn fade_out_delay(&self) -> Duration {
        Duration::from_millis(self.fade_out_delay_ms)
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<Settings, StorageError>;
    fn save_settings(&self, s: &Settings) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "missed_threshold_ms": 300, "guide_encoding": "key_pressure" }"#)
                .unwrap();
        assert_eq!(settings.missed_threshold_ms, 300);
        assert_eq!(settings.delayed_threshold_ms, 100);
        assert_eq!(settings.guide_encoding, GuideEncoding::KeyPressure);
        assert_eq!(settings.key_pressure_note_offset, 21);
        assert_eq!(settings.start_note, 30);
    }
}
