use gridguide_domain_grid::LayoutState;
use gridguide_domain_timing::{AggregatedStats, TimingClass, TimingResult};
use gridguide_ports::midi::TimedMessage;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Instrument,
    Guide,
}

/// A message from one of the input ports, tagged with where it came from.
#[derive(Clone, Copy, Debug)]
pub struct RoutedMessage {
    pub source: InputSource,
    pub message: TimedMessage,
}

#[derive(Clone, Debug)]
pub enum Event {
    LayoutChanged {
        layout: LayoutState,
    },
    TimingFeedback {
        result: TimingResult,
        class: TimingClass,
    },
    StatsFlushed {
        stats: AggregatedStats,
    },
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;
