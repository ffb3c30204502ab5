use crate::device_sync::{DeviceStateSync, OperatingMode, SyncConfig};
use crate::highlight::{PadHighlighter, COLOR_OFF};
use crate::ipc::{Event, EventReceiver, EventSender, InputSource, RoutedMessage};
use crate::layout::SharedLayout;
use crate::output::SharedOutput;
use crate::scheduler::{spawn_repeating, TaskHandle};
use gridguide_domain_grid::{LayoutState, PadCoord};
use gridguide_domain_timing::{
    AggregatedStats, GuideOnset, NoteHistory, NoteTimingClassifier, PlayedNoteEvent,
    StatisticsAggregator, TimingResult, TimingThresholds,
};
use gridguide_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiMessage, MidiOutputPort, TimedMessage,
    TimedMessageCallback,
};
use gridguide_ports::storage::{GuideEncoding, Settings};
use gridguide_ports::types::find_device_by_name;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("port not found: {0}")]
    PortNotFound(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuideAction {
    Onset(u8),
    Release(u8),
}

/// Decodes a guide input message according to the configured encoding.
pub fn guide_action(message: MidiMessage, encoding: GuideEncoding, note_offset: u8) -> Option<GuideAction> {
    match (encoding, message) {
        (GuideEncoding::NoteOn, MidiMessage::NoteOn { note, .. }) => Some(GuideAction::Onset(note)),
        (GuideEncoding::NoteOn, MidiMessage::NoteOff { note, .. }) => Some(GuideAction::Release(note)),
        (GuideEncoding::KeyPressure, MidiMessage::KeyPressure { note, pressure, .. }) => {
            let note = note.checked_add(note_offset).filter(|note| *note <= 127)?;
            if pressure > 0 {
                Some(GuideAction::Onset(note))
            } else {
                Some(GuideAction::Release(note))
            }
        }
        _ => None,
    }
}

pub fn layout_from_settings(settings: &Settings) -> LayoutState {
    LayoutState {
        start_note: settings.start_note,
        row_interval: settings.row_interval,
        column_interval: settings.column_interval,
        device_width: settings.device_width,
        bpm: settings.bpm,
    }
}

/// Everything a running session needs, created at startup and torn down
/// with `shutdown`.
pub struct AppContext {
    settings: Settings,
    history: Arc<NoteHistory>,
    classifier: Arc<NoteTimingClassifier>,
    stats: Mutex<StatisticsAggregator>,
    layout: Arc<SharedLayout>,
    sync: Option<Arc<DeviceStateSync>>,
    highlighter: Option<PadHighlighter>,
    /// Pads lit per guide note, so a release clears the same pads even if the
    /// layout changed in between.
    lit: Mutex<HashMap<u8, Vec<PadCoord>>>,
    forwards: Vec<SharedOutput>,
    events: EventSender,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl AppContext {
    /// `output` is the instrument's output port; without it layout sync
    /// and pad highlighting are disabled.
    pub fn new(
        settings: Settings,
        output: Option<SharedOutput>,
        forwards: Vec<SharedOutput>,
    ) -> (Arc<Self>, EventReceiver) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let thresholds =
            TimingThresholds::from_millis(settings.delayed_threshold_ms, settings.missed_threshold_ms);
        let history = Arc::new(NoteHistory::new(settings.history_capacity));
        let classifier = Arc::new(NoteTimingClassifier::new(history.clone(), thresholds));
        let layout = Arc::new(SharedLayout::new(Some(layout_from_settings(&settings))));

        let sync = output.as_ref().map(|output| {
            Arc::new(DeviceStateSync::new(
                output.clone(),
                layout.clone(),
                events.clone(),
                SyncConfig {
                    channel: settings.highlight_channel,
                    param_timeout: settings.param_timeout(),
                    min_interval: settings.update_state_interval(),
                    failure_penalty: settings.state_failure_penalty(),
                },
            ))
        });
        let highlighter = output.map(|output| PadHighlighter::new(output, settings.highlight_channel));

        let ctx = Arc::new(Self {
            settings,
            history,
            classifier,
            stats: Mutex::new(StatisticsAggregator::new(thresholds)),
            layout,
            sync,
            highlighter,
            lit: Mutex::new(HashMap::new()),
            forwards,
            events,
            tasks: Mutex::new(Vec::new()),
        });
        (ctx, events_rx)
    }

    pub fn history(&self) -> &Arc<NoteHistory> {
        &self.history
    }

    pub fn layout(&self) -> &Arc<SharedLayout> {
        &self.layout
    }

    pub fn sync(&self) -> Option<&Arc<DeviceStateSync>> {
        self.sync.as_ref()
    }

    pub fn pending_results(&self) -> usize {
        self.stats.lock().len()
    }

    /// Clears the pads and starts the layout poll and the idle watchdog.
    pub fn start(self: &Arc<Self>) {
        self.clear_pads();

        let mut tasks = self.tasks.lock();
        match &self.sync {
            Some(sync) => {
                if self.settings.alternate_mode {
                    if let Err(err) = sync.set_operating_mode(OperatingMode::Alternate) {
                        warn!(error = %err, "could not switch device to alternate mode");
                    }
                }
                let sync = sync.clone();
                tasks.push(spawn_repeating(self.settings.update_state_interval(), move || {
                    let sync = sync.clone();
                    async move { sync.refresh().await }
                }));
            }
            None => warn!("no instrument output, layout sync and highlighting are disabled"),
        }

        let ctx = Arc::downgrade(self);
        tasks.push(spawn_repeating(self.settings.idle_check_interval(), move || {
            let ctx = ctx.clone();
            async move {
                if let Some(ctx) = ctx.upgrade() {
                    ctx.flush_if_idle(Instant::now());
                }
            }
        }));
    }

    /// Dispatches routed input until `shutdown` resolves. Once every input
    /// is gone the session keeps syncing the layout until shutdown.
    pub async fn run<S>(self: Arc<Self>, mut inputs: mpsc::UnboundedReceiver<RoutedMessage>, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut inputs_open = true;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                routed = inputs.recv(), if inputs_open => match routed {
                    Some(routed) => self.dispatch(routed),
                    None => {
                        warn!("no input ports open, waiting for shutdown");
                        inputs_open = false;
                    }
                },
            }
        }
    }

    pub fn dispatch(self: &Arc<Self>, routed: RoutedMessage) {
        match routed.source {
            InputSource::Instrument => self.handle_instrument(routed.message),
            InputSource::Guide => self.handle_guide(routed.message),
        }
    }

    pub fn handle_instrument(&self, timed: TimedMessage) {
        for forward in &self.forwards {
            if let Err(err) = forward.send(timed.message) {
                debug!(port = forward.name(), error = %err, "forward failed");
            }
        }

        match timed.message {
            MidiMessage::NoteOn { note, .. } => self.history.append(PlayedNoteEvent {
                at: timed.at,
                note,
            }),
            MidiMessage::ParameterResponse {
                controller, value, ..
            } => {
                if let Some(sync) = &self.sync {
                    sync.handle_response(controller, value);
                }
            }
            _ => {}
        }
    }

    pub fn handle_guide(self: &Arc<Self>, timed: TimedMessage) {
        let Some(action) = guide_action(
            timed.message,
            self.settings.guide_encoding,
            self.settings.key_pressure_note_offset,
        ) else {
            return;
        };

        match action {
            GuideAction::Onset(note) => {
                let coords = self.highlight(note, self.settings.guide_highlight_color);
                if !coords.is_empty() {
                    self.lit.lock().insert(note, coords);
                }
                let ctx = self.clone();
                let onset = GuideOnset { note, at: timed.at };
                tokio::spawn(async move {
                    let result = ctx.classifier.classify(onset).await;
                    ctx.record_result(result);
                });
            }
            GuideAction::Release(note) => {
                let (Some(highlighter), Some(coords)) =
                    (self.highlighter.clone(), self.lit.lock().remove(&note))
                else {
                    return;
                };
                let delay = self.settings.fade_out_delay();
                tokio::spawn(async move {
                    time::sleep(delay).await;
                    if let Err(err) = highlighter.highlight_pads(&coords, COLOR_OFF) {
                        debug!(note, error = %err, "pad fade out failed");
                    }
                });
            }
        }
    }

    pub fn record_result(&self, result: TimingResult) {
        let class = self.classifier.thresholds().classify(result.offset_ms);
        match result.offset_ms {
            Some(offset_ms) => info!(note = %result.identifier, offset_ms, ?class, "guide note"),
            None => info!(note = %result.identifier, ?class, "guide note"),
        }
        self.stats.lock().record(result.clone());
        let _ = self.events.send(Event::TimingFeedback { result, class });
    }

    /// Summarizes and resets the take once no guide note was judged for
    /// `pause_threshold`.
    pub fn flush_if_idle(&self, now: Instant) -> Option<AggregatedStats> {
        let mut stats = self.stats.lock();
        let last = stats.last_recorded_at()?;
        if now.saturating_duration_since(last) < self.settings.pause_threshold() {
            return None;
        }
        Some(self.flush_locked(&mut stats))
    }

    pub fn flush(&self) -> Option<AggregatedStats> {
        let mut stats = self.stats.lock();
        if stats.is_empty() {
            return None;
        }
        Some(self.flush_locked(&mut stats))
    }

    fn flush_locked(&self, stats: &mut StatisticsAggregator) -> AggregatedStats {
        let summary = stats.compute(self.history.notes_played());
        stats.clear();
        self.history.clear();
        info!("take finished\n{summary}");
        let _ = self.events.send(Event::StatsFlushed {
            stats: summary.clone(),
        });
        summary
    }

    pub fn shutdown(&self) {
        self.tasks.lock().clear();
        self.flush();
        if let Some(sync) = &self.sync {
            if self.settings.alternate_mode {
                if let Err(err) = sync.set_operating_mode(OperatingMode::Normal) {
                    warn!(error = %err, "could not restore device operating mode");
                }
            }
        }
        self.clear_pads();
        for forward in &self.forwards {
            forward.close();
        }
    }

    /// Lights every pad of `note` in the current layout and returns them.
    fn highlight(&self, note: u8, color: u8) -> Vec<PadCoord> {
        let (Some(highlighter), Some(snapshot)) = (&self.highlighter, self.layout.load()) else {
            return Vec::new();
        };
        let coords = snapshot.index.coords(note);
        if let Err(err) = highlighter.highlight_pads(coords, color) {
            debug!(note, error = %err, "pad highlight failed");
        }
        coords.to_vec()
    }

    fn clear_pads(&self) {
        let (Some(highlighter), Some(snapshot)) = (&self.highlighter, self.layout.load()) else {
            return;
        };
        if let Err(err) = highlighter.clear_all(snapshot.grid.columns()) {
            warn!(error = %err, "could not clear pad highlights");
        }
    }
}

/// Ports opened for a session. Any of them may be missing; the session then
/// runs without the features that need it.
pub struct Devices {
    pub instrument_in: Option<Box<dyn MidiInputStream>>,
    pub guide_in: Option<Box<dyn MidiInputStream>>,
    pub output: Option<SharedOutput>,
    pub forwards: Vec<SharedOutput>,
}

impl Devices {
    pub fn open(
        settings: &Settings,
        inputs: &dyn MidiInputPort,
        outputs: &dyn MidiOutputPort,
        tx: mpsc::UnboundedSender<RoutedMessage>,
    ) -> Self {
        let instrument_in = open_optional(
            "instrument input",
            settings.instrument_input_port.as_deref(),
            |name| open_input(inputs, name, InputSource::Instrument, tx.clone()),
        );
        let guide_in = open_optional("guide input", settings.guide_input_port.as_deref(), |name| {
            open_input(inputs, name, InputSource::Guide, tx.clone())
        });
        let output = open_optional(
            "instrument output",
            settings.instrument_output_port.as_deref(),
            |name| open_output(outputs, name),
        );

        let forwards = if instrument_in.is_some() {
            settings
                .forward_ports
                .iter()
                .filter_map(|name| {
                    open_optional("forward output", Some(name.as_str()), |name| {
                        open_output(outputs, name)
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            instrument_in,
            guide_in,
            output,
            forwards,
        }
    }

    pub fn close(self) {
        if let Some(stream) = self.instrument_in {
            stream.close();
        }
        if let Some(stream) = self.guide_in {
            stream.close();
        }
        if let Some(output) = self.output {
            output.close();
        }
    }
}

fn open_optional<T>(
    role: &str,
    name: Option<&str>,
    open: impl FnOnce(&str) -> Result<T, AppError>,
) -> Option<T> {
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        warn!(role, "no port configured");
        return None;
    };
    match open(name) {
        Ok(opened) => {
            info!(role, port = name, "port opened");
            Some(opened)
        }
        Err(err) => {
            warn!(role, port = name, error = %err, "could not open port");
            None
        }
    }
}

fn open_input(
    port: &dyn MidiInputPort,
    name: &str,
    source: InputSource,
    tx: mpsc::UnboundedSender<RoutedMessage>,
) -> Result<Box<dyn MidiInputStream>, AppError> {
    let devices = port.list_inputs()?;
    let device =
        find_device_by_name(&devices, name).ok_or_else(|| AppError::PortNotFound(name.to_string()))?;
    let cb: TimedMessageCallback = Arc::new(move |message: TimedMessage| {
        let _ = tx.send(RoutedMessage { source, message });
    });
    Ok(port.open_input(&device.id, cb)?)
}

fn open_output(port: &dyn MidiOutputPort, name: &str) -> Result<SharedOutput, AppError> {
    let devices = port.list_outputs()?;
    let device =
        find_device_by_name(&devices, name).ok_or_else(|| AppError::PortNotFound(name.to_string()))?;
    let stream = port.open_output(&device.id)?;
    Ok(SharedOutput::new(device.name.clone(), stream))
}
