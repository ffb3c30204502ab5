use crate::layout::{Grid, MAX_MIDI_NOTE};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PadCoord {
    pub x: u8,
    pub y: u8,
}

/// Reverse lookup from note number to every pad playing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridIndex {
    by_note: Vec<Vec<PadCoord>>,
}

impl GridIndex {
    /// Pads for `note`, ordered by x then y. Empty for notes not on the grid.
    pub fn coords(&self, note: u8) -> &[PadCoord] {
        self.by_note
            .get(note as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, note: u8) -> bool {
        !self.coords(note).is_empty()
    }

    /// Notes that have at least one pad.
    pub fn notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.by_note
            .iter()
            .enumerate()
            .filter(|(_, coords)| !coords.is_empty())
            .map(|(note, _)| note as u8)
    }
}

pub fn build_index(grid: &Grid, start_note: i32) -> GridIndex {
    let mut by_note = vec![Vec::new(); MAX_MIDI_NOTE as usize + 1];
    let lowest = start_note.max(0);

    for (x, y, value) in grid.iter() {
        if value < lowest || value > MAX_MIDI_NOTE {
            continue;
        }
        by_note[value as usize].push(PadCoord {
            x: x as u8,
            y: y as u8,
        });
    }

    GridIndex { by_note }
}
