use std::fmt;

use thiserror::Error;

use crate::table::TableError;

/// Import phases, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportStep {
    Parse,
    StopPlayback,
    ResetPatterns,
    ClearSampleBank,
    ClearTable,
    CollapseSections,
    ImportSampleBank,
    ImportTable,
    RefreshStructure,
    SyncTable,
    ImportPlayback,
    ReconcileSelection,
    ClearHistory,
}

impl ImportStep {
    pub const ALL: [ImportStep; 13] = [
        ImportStep::Parse,
        ImportStep::StopPlayback,
        ImportStep::ResetPatterns,
        ImportStep::ClearSampleBank,
        ImportStep::ClearTable,
        ImportStep::CollapseSections,
        ImportStep::ImportSampleBank,
        ImportStep::ImportTable,
        ImportStep::RefreshStructure,
        ImportStep::SyncTable,
        ImportStep::ImportPlayback,
        ImportStep::ReconcileSelection,
        ImportStep::ClearHistory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImportStep::Parse => "parse",
            ImportStep::StopPlayback => "stop playback",
            ImportStep::ResetPatterns => "reset patterns",
            ImportStep::ClearSampleBank => "clear sample bank",
            ImportStep::ClearTable => "clear table",
            ImportStep::CollapseSections => "collapse sections",
            ImportStep::ImportSampleBank => "import sample bank",
            ImportStep::ImportTable => "import table",
            ImportStep::RefreshStructure => "refresh structure",
            ImportStep::SyncTable => "sync table",
            ImportStep::ImportPlayback => "import playback",
            ImportStep::ReconcileSelection => "reconcile selection",
            ImportStep::ClearHistory => "clear history",
        }
    }
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum ImportErrorKind {
    #[error("malformed snapshot document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported schema version {found}")]
    UnsupportedSchema { found: u64 },

    #[error("missing '{0}'")]
    MissingField(&'static str),

    #[error("document declares {declared} sections but lists {listed}")]
    SectionsMismatch { declared: i32, listed: usize },

    #[error("section {index} has invalid step count {steps}")]
    InvalidSection { index: usize, steps: i32 },

    #[error("cell ({step}, {column}) lies outside the imported table")]
    CellOutOfRange { step: usize, column: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// An import that stopped part way. State changed by earlier steps stays changed.
#[derive(Error, Debug)]
#[error("snapshot import failed at {step}: {kind}")]
pub struct ImportError {
    pub step: ImportStep,
    pub kind: ImportErrorKind,
}

impl ImportError {
    pub fn at(step: ImportStep, kind: impl Into<ImportErrorKind>) -> Self {
        Self {
            step,
            kind: kind.into(),
        }
    }
}
