use crate::ipc::{Event, EventSender};
use crate::layout::SharedLayout;
use crate::output::SharedOutput;
use gridguide_domain_grid::{LayoutState, ROWS};
use gridguide_ports::midi::{
    MidiError, MidiMessage, CC_DATA_ENTRY_LSB, CC_DATA_ENTRY_MSB, CC_NRPN_LSB, CC_NRPN_MSB,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Parameter the device reads as "send back the value of the following parameter".
pub const NRPN_REQUEST_VALUE: u16 = 299;

pub const PARAM_SPLIT_LEFT_OCTAVE: u16 = 36;
pub const PARAM_SPLIT_LEFT_TRANSPOSE: u16 = 37;
pub const PARAM_ROW_INTERVAL: u16 = 227;
pub const PARAM_TEMPO: u16 = 238;
pub const PARAM_OPERATING_MODE: u16 = 245;

/// Note on the bottom left pad at octave and transpose zero.
pub const BASE_NOTE: i32 = 30;
/// Raw octave value meaning "no octave shift".
pub const OCTAVE_ZERO: i32 = 5;
/// Raw transpose value meaning "no transposition".
pub const TRANSPOSE_ZERO: i32 = 7;

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("no response for parameter {param} within {timeout_ms}ms")]
    Timeout { param: u16, timeout_ms: u64 },
    /// Responses carry no parameter number, so only one query may be open.
    #[error("query for parameter {param} rejected, another query is waiting for its response")]
    QueryInFlight { param: u16 },
    #[error("transport error: {0}")]
    Transport(#[from] MidiError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatingMode {
    Normal,
    Alternate,
}

impl OperatingMode {
    fn raw(self) -> u16 {
        match self {
            OperatingMode::Normal => 0,
            OperatingMode::Alternate => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Debounced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Unchanged(LayoutState),
    Changed(LayoutState),
}

#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Zero based channel the parameter messages are sent on.
    pub channel: u8,
    pub param_timeout: Duration,
    pub min_interval: Duration,
    pub failure_penalty: Duration,
}

/// Raw values as reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawDeviceState {
    pub octave: u8,
    pub transpose: u8,
    pub row_interval: u8,
    pub tempo: u8,
}

impl RawDeviceState {
    /// Applies the device values on top of `base`, which supplies the
    /// geometry the device does not report.
    pub fn to_layout(self, base: LayoutState) -> LayoutState {
        let start_note = BASE_NOTE
            + (self.octave as i32 - OCTAVE_ZERO) * 12
            + (self.transpose as i32 - TRANSPOSE_ZERO);
        let row_interval = match self.row_interval {
            0 => (base.device_width as usize / ROWS) as i32,
            raw => raw as i32,
        };
        LayoutState {
            start_note,
            row_interval,
            bpm: self.tempo as u16,
            ..base
        }
    }
}

/// Splits a 14 bit number into (coarse, fine) 7 bit halves.
pub fn split_14bit(value: u16) -> (u8, u8) {
    (((value >> 7) & 0x7F) as u8, (value & 0x7F) as u8)
}

fn nrpn_messages(channel: u8, param: u16, value: u16) -> [MidiMessage; 4] {
    let (param_msb, param_lsb) = split_14bit(param);
    let (value_msb, value_lsb) = split_14bit(value);
    let cc = |controller, value| MidiMessage::ControlChange {
        channel,
        controller,
        value,
    };
    [
        cc(CC_NRPN_MSB, param_msb),
        cc(CC_NRPN_LSB, param_lsb),
        cc(CC_DATA_ENTRY_MSB, value_msb),
        cc(CC_DATA_ENTRY_LSB, value_lsb),
    ]
}

struct PendingResponse {
    id: u64,
    tx: oneshot::Sender<u8>,
}

/// Removes the pending response slot when a request finishes, times out,
/// or is dropped mid-flight.
struct PendingGuard<'a> {
    slot: &'a Mutex<Option<PendingResponse>>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|pending| pending.id) == Some(self.id) {
            *slot = None;
        }
    }
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keeps the published layout in step with the device by reading its
/// parameters over NRPN.
pub struct DeviceStateSync {
    output: SharedOutput,
    layout: Arc<SharedLayout>,
    events: EventSender,
    config: SyncConfig,
    pending: Mutex<Option<PendingResponse>>,
    next_request_id: AtomicU64,
    in_flight: AtomicBool,
    next_allowed: Mutex<Option<Instant>>,
    queries_sent: AtomicUsize,
    failing: AtomicBool,
}

impl DeviceStateSync {
    pub fn new(
        output: SharedOutput,
        layout: Arc<SharedLayout>,
        events: EventSender,
        config: SyncConfig,
    ) -> Self {
        Self {
            output,
            layout,
            events,
            config,
            pending: Mutex::new(None),
            next_request_id: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            next_allowed: Mutex::new(None),
            queries_sent: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of parameter queries written to the device so far.
    pub fn queries_sent(&self) -> usize {
        self.queries_sent.load(Ordering::Relaxed)
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Feeds a parameter response from the device. Returns whether it
    /// completed a pending request.
    pub fn handle_response(&self, controller: u8, value: u8) -> bool {
        if controller != CC_DATA_ENTRY_LSB {
            return false;
        }
        let Some(pending) = self.pending.lock().take() else {
            debug!(value, "discarding unsolicited parameter response");
            return false;
        };
        pending.tx.send(value).is_ok()
    }

    pub async fn get_param_value(&self, param: u16) -> Result<u8, SyncError> {
        let (tx, rx) = oneshot::channel();
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.pending.lock();
            if pending.is_some() {
                return Err(SyncError::QueryInFlight { param });
            }
            *pending = Some(PendingResponse { id, tx });
        }
        let _guard = PendingGuard {
            slot: &self.pending,
            id,
        };

        self.output
            .send_all(&nrpn_messages(self.config.channel, NRPN_REQUEST_VALUE, param))?;
        self.queries_sent.fetch_add(1, Ordering::Relaxed);

        match time::timeout(self.config.param_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            _ => Err(SyncError::Timeout {
                param,
                timeout_ms: self.config.param_timeout.as_millis() as u64,
            }),
        }
    }

    pub fn set_param_value(&self, param: u16, value: u16) -> Result<(), SyncError> {
        self.output
            .send_all(&nrpn_messages(self.config.channel, param, value))?;
        Ok(())
    }

    pub fn set_operating_mode(&self, mode: OperatingMode) -> Result<(), SyncError> {
        self.set_param_value(PARAM_OPERATING_MODE, mode.raw())
    }

    pub async fn fetch_raw_state(&self) -> Result<RawDeviceState, SyncError> {
        let octave = self.get_param_value(PARAM_SPLIT_LEFT_OCTAVE).await?;
        let transpose = self.get_param_value(PARAM_SPLIT_LEFT_TRANSPOSE).await?;
        let row_interval = self.get_param_value(PARAM_ROW_INTERVAL).await?;
        let tempo = self.get_param_value(PARAM_TEMPO).await?;
        Ok(RawDeviceState {
            octave,
            transpose,
            row_interval,
            tempo,
        })
    }

    /// Reads the device layout and publishes it if the note mapping changed.
    ///
    /// Only one refresh runs at a time; overlapping calls and calls inside
    /// the debounce window return `Skipped` without touching the device.
    pub async fn sync_state(&self) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        if matches!(*self.next_allowed.lock(), Some(next) if started < next) {
            return Ok(SyncOutcome::Skipped(SkipReason::Debounced));
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(SyncOutcome::Skipped(SkipReason::InFlight));
        }
        let _flight = FlightGuard(&self.in_flight);

        let fetched = self.fetch_raw_state().await;
        let next = match fetched {
            Ok(_) => started + self.config.min_interval,
            Err(_) => Instant::now() + self.config.failure_penalty,
        };
        *self.next_allowed.lock() = Some(next);

        Ok(self.apply(fetched?))
    }

    /// One poll tick: runs `sync_state` and logs failures once per streak.
    pub async fn refresh(&self) {
        match self.sync_state().await {
            Ok(SyncOutcome::Skipped(_)) => {}
            Ok(_) => {
                if self.failing.swap(false, Ordering::Relaxed) {
                    info!("device state sync recovered");
                }
            }
            Err(err) => {
                if !self.failing.swap(true, Ordering::Relaxed) {
                    warn!(
                        error = %err,
                        retry_in_ms = self.config.failure_penalty.as_millis() as u64,
                        "device state sync failed"
                    );
                }
            }
        }
    }

    fn apply(&self, raw: RawDeviceState) -> SyncOutcome {
        let previous = self.layout.layout();
        let base = previous.unwrap_or(LayoutState {
            start_note: BASE_NOTE,
            row_interval: 5,
            column_interval: 1,
            device_width: 128,
            bpm: 120,
        });
        let next = raw.to_layout(base);

        match previous {
            Some(previous) if previous.same_mapping(&next) => {
                if previous.bpm != next.bpm {
                    self.layout.set_bpm(next.bpm);
                }
                SyncOutcome::Unchanged(next)
            }
            _ => {
                self.layout.publish(next);
                info!(
                    start_note = next.start_note,
                    row_interval = next.row_interval,
                    bpm = next.bpm,
                    "device layout changed"
                );
                let _ = self.events.send(Event::LayoutChanged { layout: next });
                SyncOutcome::Changed(next)
            }
        }
    }
}
