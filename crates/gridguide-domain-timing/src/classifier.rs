use crate::history::NoteHistory;
use crate::note_name::note_identifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingThresholds {
    /// Largest |offset| still counted as in time.
    pub delayed: Duration,
    /// Largest |offset| a match is searched for at all.
    pub missed: Duration,
}

impl TimingThresholds {
    pub fn from_millis(delayed_ms: u64, missed_ms: u64) -> Self {
        Self {
            delayed: Duration::from_millis(delayed_ms),
            missed: Duration::from_millis(missed_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        (self.delayed / 4).max(Duration::from_millis(1))
    }

    pub fn classify(&self, offset_ms: Option<i64>) -> TimingClass {
        let Some(offset) = offset_ms else {
            return TimingClass::Missed;
        };
        let distance = offset.unsigned_abs() as u128;
        if distance > self.missed.as_millis() {
            TimingClass::Missed
        } else if distance <= self.delayed.as_millis() {
            TimingClass::InTime
        } else if offset < 0 {
            TimingClass::Early
        } else {
            TimingClass::Late
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingClass {
    InTime,
    Early,
    Late,
    Missed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuideOnset {
    pub note: u8,
    pub at: Instant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimingResult {
    pub note: u8,
    pub identifier: String,
    pub observed_at: Instant,
    /// Played minus guide time in ms. `None` when nothing matched.
    pub offset_ms: Option<i64>,
}

impl TimingResult {
    pub fn is_missed(&self) -> bool {
        self.offset_ms.is_none()
    }
}

/// Signed `event_at - now` in whole milliseconds.
pub fn offset_ms(event_at: Instant, now: Instant) -> i64 {
    if event_at >= now {
        (event_at - now).as_millis() as i64
    } else {
        -((now - event_at).as_millis() as i64)
    }
}

/// Pairs a guide onset with the nearest played note of the same pitch.
///
/// A played note already in the history within `delayed` settles the match
/// immediately. Otherwise the history is polled for a later note until the
/// earlier candidate's distance (or `missed` without one) has passed, and the
/// closer of the two wins.
pub struct NoteTimingClassifier {
    history: Arc<NoteHistory>,
    thresholds: TimingThresholds,
}

impl NoteTimingClassifier {
    pub fn new(history: Arc<NoteHistory>, thresholds: TimingThresholds) -> Self {
        Self {
            history,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> TimingThresholds {
        self.thresholds
    }

    pub async fn classify(&self, onset: GuideOnset) -> TimingResult {
        let now = onset.at;
        let delayed_ms = self.thresholds.delayed.as_millis() as u64;
        let missed_ms = self.thresholds.missed.as_millis() as u64;

        let floor = now
            .checked_sub(self.thresholds.missed)
            .or_else(|| self.history.oldest_at())
            .unwrap_or(now);

        let earlier = self
            .history
            .find_last_before(onset.note, floor)
            .map(|event| offset_ms(event.at, now));

        if let Some(offset) = earlier {
            if offset.unsigned_abs() <= delayed_ms {
                return self.result(onset, Some(offset));
            }
        }

        let candidate = earlier.filter(|offset| offset.unsigned_abs() <= missed_ms);
        let wait = candidate
            .map(|offset| Duration::from_millis(offset.unsigned_abs()))
            .unwrap_or(self.thresholds.missed);

        let later = time::timeout_at(now + wait, self.poll_later(onset.note, now))
            .await
            .ok();

        let offset = match (candidate, later) {
            (Some(early), Some(late)) if late.unsigned_abs() < early.unsigned_abs() => Some(late),
            (Some(early), _) => Some(early),
            (None, late) => late,
        };

        self.result(onset, offset)
    }

    async fn poll_later(&self, note: u8, now: Instant) -> i64 {
        let mut ticker = time::interval(self.thresholds.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(event) = self.history.find_first_after(note, now) {
                return offset_ms(event.at, now);
            }
        }
    }

    fn result(&self, onset: GuideOnset, offset_ms: Option<i64>) -> TimingResult {
        TimingResult {
            note: onset.note,
            identifier: note_identifier(onset.note),
            observed_at: onset.at,
            offset_ms,
        }
    }
}
