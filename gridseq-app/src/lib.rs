//! Editing side of the grid sequencer: the section table, its sync onto the
//! engine's flat grid, and snapshot export/import.

pub mod config;
pub mod engine;
pub mod selection;
pub mod sequencer;
pub mod snapshot;
pub mod table;
pub mod undo;

pub use crate::config::SequencerConfig;
pub use crate::engine::{
    BridgeCounters, EngineBridge, EngineControl, EngineError, NativeEngine, SampleSource,
};
pub use crate::selection::{CellSelection, SelectionRange};
pub use crate::sequencer::Sequencer;
pub use crate::snapshot::{ImportError, ImportReport, ImportStep, SnapshotDocument};
pub use crate::table::{GridGeometry, TableError, TableSyncEngine};
pub use crate::undo::UndoHistory;
