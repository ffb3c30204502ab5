use arc_swap::ArcSwapOption;
use gridguide_domain_grid::{Grid, GridIndex, LayoutState};
use std::sync::Arc;

/// A layout with its grid and reverse index, built together.
#[derive(Debug)]
pub struct LayoutSnapshot {
    pub layout: LayoutState,
    pub grid: Arc<Grid>,
    pub index: Arc<GridIndex>,
}

impl LayoutSnapshot {
    pub fn build(layout: LayoutState) -> Self {
        let grid = layout.grid();
        let index = gridguide_domain_grid::build_index(&grid, layout.start_note);
        Self {
            layout,
            grid: Arc::new(grid),
            index: Arc::new(index),
        }
    }
}

/// Latest published layout. Writers build a full snapshot and swap it in;
/// readers never observe a partially rebuilt index.
#[derive(Default)]
pub struct SharedLayout {
    current: ArcSwapOption<LayoutSnapshot>,
}

impl SharedLayout {
    pub fn new(initial: Option<LayoutState>) -> Self {
        let shared = Self::default();
        if let Some(layout) = initial {
            shared.publish(layout);
        }
        shared
    }

    pub fn load(&self) -> Option<Arc<LayoutSnapshot>> {
        self.current.load_full()
    }

    pub fn layout(&self) -> Option<LayoutState> {
        self.current.load().as_ref().map(|snapshot| snapshot.layout)
    }

    pub fn publish(&self, layout: LayoutState) -> Arc<LayoutSnapshot> {
        let snapshot = Arc::new(LayoutSnapshot::build(layout));
        self.current.store(Some(snapshot.clone()));
        snapshot
    }

    /// Stores a new tempo, reusing the current grid.
    pub fn set_bpm(&self, bpm: u16) {
        self.current.rcu(|current| {
            current.as_ref().map(|snapshot| {
                Arc::new(LayoutSnapshot {
                    layout: LayoutState {
                        bpm,
                        ..snapshot.layout
                    },
                    grid: snapshot.grid.clone(),
                    index: snapshot.index.clone(),
                })
            })
        });
    }
}
