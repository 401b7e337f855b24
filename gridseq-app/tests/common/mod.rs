#![allow(dead_code)]

use gridseq_app::engine::{EngineControl, EngineError, NativeEngine, SampleSource};
use gridseq_app::table::{GridGeometry, TableSyncEngine};
use gridseq_app::EngineBridge;
use gridseq_bridge::layout::{Cell, Section};
use gridseq_bridge::SharedRegion;

/// Engine call as seen by [`RecordingEngine`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Stop,
    ResetPatterns,
    SetTotalSections(usize),
    SetCurrentSection(usize),
    SetGridCell(usize, usize),
    ClearGridCell(usize, usize),
    ClearAllGridCells,
    ConfigureColumns(usize),
    SetSequencerSteps(usize),
    Start,
    LoadSample(usize),
    UnloadSample(usize),
    SetRegion(i32, i32),
    Other(&'static str),
}

/// Native engine that also logs every control call.
pub struct RecordingEngine {
    pub inner: NativeEngine,
    pub calls: Vec<Call>,
}

impl RecordingEngine {
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }

    pub fn first_matching(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }
}

impl EngineControl for RecordingEngine {
    fn stop(&mut self) {
        self.calls.push(Call::Stop);
        self.inner.stop();
    }

    fn reset_all_patterns(&mut self) {
        self.calls.push(Call::ResetPatterns);
        self.inner.reset_all_patterns();
    }

    fn set_total_sections(&mut self, count: usize) {
        self.calls.push(Call::SetTotalSections(count));
        self.inner.set_total_sections(count);
    }

    fn set_current_section(&mut self, index: usize) {
        self.calls.push(Call::SetCurrentSection(index));
        self.inner.set_current_section(index);
    }

    fn set_section_layout(&mut self, index: usize, section: Section) {
        self.calls.push(Call::Other("set_section_layout"));
        self.inner.set_section_layout(index, section);
    }

    fn set_layer_len(&mut self, section: usize, layer: usize, len: i32) {
        self.calls.push(Call::Other("set_layer_len"));
        self.inner.set_layer_len(section, layer, len);
    }

    fn sections_count(&self) -> usize {
        self.inner.sections_count()
    }

    fn set_grid_cell(&mut self, step: usize, column: usize, cell: Cell) {
        self.calls.push(Call::SetGridCell(step, column));
        self.inner.set_grid_cell(step, column, cell);
    }

    fn clear_grid_cell(&mut self, step: usize, column: usize) {
        self.calls.push(Call::ClearGridCell(step, column));
        self.inner.clear_grid_cell(step, column);
    }

    fn clear_all_grid_cells(&mut self) {
        self.calls.push(Call::ClearAllGridCells);
        self.inner.clear_all_grid_cells();
    }

    fn configure_columns(&mut self, columns: usize) {
        self.calls.push(Call::ConfigureColumns(columns));
        self.inner.configure_columns(columns);
    }

    fn set_sequencer_steps(&mut self, steps: usize) {
        self.calls.push(Call::SetSequencerSteps(steps));
        self.inner.set_sequencer_steps(steps);
    }

    fn set_sequencer_bpm(&mut self, bpm: i32) {
        self.calls.push(Call::Other("set_sequencer_bpm"));
        self.inner.set_sequencer_bpm(bpm);
    }

    fn start_sequencer(&mut self, bpm: i32, steps: usize, start_step: usize) {
        self.calls.push(Call::Start);
        self.inner.start_sequencer(bpm, steps, start_step);
    }

    fn current_step(&self) -> usize {
        self.inner.current_step()
    }

    fn is_sequencer_playing(&self) -> bool {
        self.inner.is_sequencer_playing()
    }

    fn set_song_mode(&mut self, song_mode: bool) {
        self.calls.push(Call::Other("set_song_mode"));
        self.inner.set_song_mode(song_mode);
    }

    fn set_region(&mut self, start: i32, end: i32) {
        self.calls.push(Call::SetRegion(start, end));
        self.inner.set_region(start, end);
    }

    fn set_section_loops(&mut self, section: usize, loops: i32) {
        self.calls.push(Call::Other("set_section_loops"));
        self.inner.set_section_loops(section, loops);
    }

    fn load_sample(&mut self, slot: usize, source: &SampleSource) -> Result<(), EngineError> {
        self.calls.push(Call::LoadSample(slot));
        self.inner.load_sample(slot, source)
    }

    fn unload_sample(&mut self, slot: usize) {
        self.calls.push(Call::UnloadSample(slot));
        self.inner.unload_sample(slot);
    }

    fn set_sample_settings(&mut self, slot: usize, volume: f32, pitch: f32) {
        self.calls.push(Call::Other("set_sample_settings"));
        self.inner.set_sample_settings(slot, volume, pitch);
    }
}

pub fn recording_table() -> (TableSyncEngine<RecordingEngine>, EngineBridge) {
    let region = SharedRegion::anonymous().unwrap();
    let bridge = EngineBridge::new(&region);
    let engine = RecordingEngine {
        inner: NativeEngine::new(region).unwrap(),
        calls: Vec::new(),
    };
    let table = TableSyncEngine::new(engine, GridGeometry::new(16, 4, 4)).unwrap();
    (table, bridge)
}

pub fn native_table() -> (TableSyncEngine<NativeEngine>, EngineBridge) {
    let region = SharedRegion::anonymous().unwrap();
    let bridge = EngineBridge::new(&region);
    let table =
        TableSyncEngine::new(NativeEngine::new(region).unwrap(), GridGeometry::new(16, 4, 4))
            .unwrap();
    (table, bridge)
}
