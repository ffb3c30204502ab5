use crate::index::{build_index, GridIndex};
use serde::{Deserialize, Serialize};

/// Pad rows on the device. Width varies, height does not.
pub const ROWS: usize = 8;

pub const MAX_MIDI_NOTE: i32 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutState {
    pub start_note: i32,
    pub row_interval: i32,
    pub column_interval: i32,
    /// Total pad count, `columns * ROWS`.
    pub device_width: u32,
    pub bpm: u16,
}

impl LayoutState {
    pub fn columns(&self) -> usize {
        self.device_width as usize / ROWS
    }

    pub fn grid(&self) -> Grid {
        compute_grid(
            self.start_note,
            self.row_interval,
            self.column_interval,
            self.device_width,
        )
    }

    pub fn index(&self) -> GridIndex {
        build_index(&self.grid(), self.start_note)
    }

    /// True when both layouts put the same note on every pad.
    pub fn same_mapping(&self, other: &LayoutState) -> bool {
        self.start_note == other.start_note
            && self.row_interval == other.row_interval
            && self.column_interval == other.column_interval
            && self.device_width == other.device_width
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridCell {
    Note(u8),
    /// Computed value outside 0..=127; drawn as an unplayable pad.
    Invalid(i32),
}

impl GridCell {
    pub fn from_value(value: i32) -> Self {
        if (0..=MAX_MIDI_NOTE).contains(&value) {
            GridCell::Note(value as u8)
        } else {
            GridCell::Invalid(value)
        }
    }
}

/// Note values per pad, stored column major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    columns: usize,
    values: Vec<i32>,
}

impl Grid {
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        ROWS
    }

    pub fn value(&self, x: usize, y: usize) -> Option<i32> {
        if x >= self.columns || y >= ROWS {
            return None;
        }
        self.values.get(x * ROWS + y).copied()
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<GridCell> {
        self.value(x, y).map(GridCell::from_value)
    }

    /// Every pad as `(x, y, value)`, x-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, i32)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, value)| (i / ROWS, i % ROWS, *value))
    }
}

pub fn compute_grid(start_note: i32, row_interval: i32, column_interval: i32, width: u32) -> Grid {
    let columns = width as usize / ROWS;
    let mut values = Vec::with_capacity(columns * ROWS);
    for x in 0..columns as i32 {
        for y in 0..ROWS as i32 {
            values.push(start_note + x * column_interval + y * row_interval);
        }
    }
    Grid { columns, values }
}
