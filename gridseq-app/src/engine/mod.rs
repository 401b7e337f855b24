//! Control surface of the native sequencer engine.

use std::path::PathBuf;

use thiserror::Error;

use gridseq_bridge::layout::{Cell, Section};

pub mod bridge;
pub mod native;

pub use bridge::{BridgeCounters, EngineBridge};
pub use native::NativeEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("shared region writers are already owned by another engine")]
    WritersUnavailable,

    #[error("sample slot {slot} out of range (max {max})")]
    SlotOutOfRange { slot: usize, max: usize },

    #[error("sample file not found: {}", path.display())]
    SampleNotFound { path: PathBuf },
}

/// A sample file resolved from a library, ready to be loaded into a slot.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleSource {
    pub path: PathBuf,
    pub sample_id: Option<String>,
    pub display_name: Option<String>,
}

impl SampleSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Self {
            path,
            sample_id: None,
            display_name,
        }
    }
}

/// Engine calls made by the table sync and snapshot import paths.
///
/// All calls come from one engine-control context; callers serialize
/// structural mutations themselves. Steps and columns are absolute.
pub trait EngineControl {
    fn stop(&mut self);
    fn reset_all_patterns(&mut self);

    fn set_total_sections(&mut self, count: usize);
    fn set_current_section(&mut self, index: usize);
    fn set_section_layout(&mut self, index: usize, section: Section);
    fn set_layer_len(&mut self, section: usize, layer: usize, len: i32);
    /// Native section count as last published by the engine.
    fn sections_count(&self) -> usize;

    fn set_grid_cell(&mut self, step: usize, column: usize, cell: Cell);
    fn clear_grid_cell(&mut self, step: usize, column: usize);
    fn clear_all_grid_cells(&mut self);

    fn configure_columns(&mut self, columns: usize);
    fn set_sequencer_steps(&mut self, steps: usize);
    fn set_sequencer_bpm(&mut self, bpm: i32);
    fn start_sequencer(&mut self, bpm: i32, steps: usize, start_step: usize);
    fn current_step(&self) -> usize;
    fn is_sequencer_playing(&self) -> bool;

    fn set_song_mode(&mut self, song_mode: bool);
    fn set_region(&mut self, start: i32, end: i32);
    fn set_section_loops(&mut self, section: usize, loops: i32);

    fn load_sample(&mut self, slot: usize, source: &SampleSource) -> Result<(), EngineError>;
    fn unload_sample(&mut self, slot: usize);
    fn set_sample_settings(&mut self, slot: usize, volume: f32, pitch: f32);
}
