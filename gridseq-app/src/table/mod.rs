//! Section-based table editing mirrored onto the engine's flat grid.

use thiserror::Error;

pub mod geometry;
pub mod model;
pub mod plan;
pub mod sections;
pub mod settings;
pub mod sync;

pub use geometry::GridGeometry;
pub use model::{CellAddress, TableModel, DEFAULT_LAYERS};
pub use plan::{plan_edit, EditKind, PlayState, SyncPlan};
pub use sections::SectionList;
pub use settings::{SampleSettings, SessionSettings};
pub use sync::{ResizeReport, SyncSuspension, TableSyncEngine};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("section {index} out of range ({count} sections)")]
    SectionOutOfRange { index: usize, count: usize },

    #[error("at most {max} sections are supported")]
    TooManySections { max: usize },

    #[error("{requested} steps exceed the {max}-step native table")]
    TooManySteps { requested: usize, max: usize },

    #[error("the last section cannot be removed")]
    LastSection,

    #[error("invalid step count {0}")]
    InvalidStepCount(usize),

    #[error("step {step} out of range ({total} steps)")]
    StepOutOfRange { step: usize, total: usize },

    #[error("column {column} out of range ({columns} columns)")]
    ColumnOutOfRange { column: usize, columns: usize },

    #[error("{requested} sound grids requested, at most {max} fit")]
    SoundGridsOutOfRange { requested: usize, max: usize },

    #[error("layer {layer} out of range")]
    LayerOutOfRange { layer: usize },

    #[error("invalid layer length {0}")]
    InvalidLayerLen(i32),

    #[error("sample slot {slot} out of range ({max} slots)")]
    SampleSlotOutOfRange { slot: usize, max: usize },
}
