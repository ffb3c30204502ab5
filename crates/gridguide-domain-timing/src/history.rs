use parking_lot::RwLock;
use std::collections::VecDeque;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayedNoteEvent {
    pub at: Instant,
    pub note: u8,
}

#[derive(Debug, Default)]
struct HistoryState {
    events: VecDeque<PlayedNoteEvent>,
    notes_played: usize,
}

/// Time-ordered log of played notes.
///
/// Writers take the lock only for a push; readers scan from the newest entry
/// and stop at the first one outside their window, so a scan never waits on
/// more than one append.
#[derive(Debug)]
pub struct NoteHistory {
    state: RwLock<HistoryState>,
    capacity: usize,
}

impl NoteHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(HistoryState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, mut event: PlayedNoteEvent) {
        let mut state = self.state.write();
        if let Some(last) = state.events.back() {
            // keep the log sorted even if a backend stamps out of order
            event.at = event.at.max(last.at);
        }
        if state.events.len() >= self.capacity {
            state.events.pop_front();
        }
        state.events.push_back(event);
        state.notes_played += 1;
    }

    /// Most recent `note` played at or after `not_earlier_than`.
    pub fn find_last_before(&self, note: u8, not_earlier_than: Instant) -> Option<PlayedNoteEvent> {
        let state = self.state.read();
        state
            .events
            .iter()
            .rev()
            .take_while(|event| event.at >= not_earlier_than)
            .find(|event| event.note == note)
            .copied()
    }

    /// Earliest `note` played strictly after `after`.
    pub fn find_first_after(&self, note: u8, after: Instant) -> Option<PlayedNoteEvent> {
        let state = self.state.read();
        state
            .events
            .iter()
            .rev()
            .take_while(|event| event.at > after)
            .filter(|event| event.note == note)
            .last()
            .copied()
    }

    pub fn oldest_at(&self) -> Option<Instant> {
        self.state.read().events.front().map(|event| event.at)
    }

    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().events.is_empty()
    }

    /// Appends since the last `clear`, including entries evicted by capacity.
    pub fn notes_played(&self) -> usize {
        self.state.read().notes_played
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.events.clear();
        state.notes_played = 0;
    }
}

impl Default for NoteHistory {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn searches_respect_window_and_note() {
        let base = Instant::now();
        let history = NoteHistory::new(16);
        history.append(PlayedNoteEvent { at: at(base, 0), note: 60 });
        history.append(PlayedNoteEvent { at: at(base, 10), note: 62 });
        history.append(PlayedNoteEvent { at: at(base, 20), note: 60 });
        history.append(PlayedNoteEvent { at: at(base, 30), note: 60 });

        let last = history.find_last_before(60, at(base, 5));
        assert_eq!(last.map(|e| e.at), Some(at(base, 30)));
        assert_eq!(history.find_last_before(62, at(base, 11)), None);

        let first = history.find_first_after(60, at(base, 0));
        assert_eq!(first.map(|e| e.at), Some(at(base, 20)));
        assert_eq!(history.find_first_after(60, at(base, 30)), None);
    }

    #[test]
    fn capacity_evicts_oldest_but_keeps_count() {
        let base = Instant::now();
        let history = NoteHistory::new(2);
        for ms in 0..5 {
            history.append(PlayedNoteEvent { at: at(base, ms), note: 40 });
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.notes_played(), 5);
        assert_eq!(history.oldest_at(), Some(at(base, 3)));

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.notes_played(), 0);
    }

    #[test]
    fn out_of_order_stamps_are_clamped() {
        let base = Instant::now();
        let history = NoteHistory::new(8);
        history.append(PlayedNoteEvent { at: at(base, 50), note: 1 });
        history.append(PlayedNoteEvent { at: at(base, 40), note: 2 });
        assert_eq!(history.find_first_after(2, at(base, 45)).map(|e| e.at), Some(at(base, 50)));
    }
}
