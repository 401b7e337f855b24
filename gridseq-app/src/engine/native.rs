use std::sync::Arc;

use gridseq_bridge::layout::{
    Cell, PlaybackState, SampleSlot, Section, DEFAULT_SECTION_STEPS, MAX_BPM,
    MAX_COLS_PER_LAYER, MAX_LAYERS_PER_SECTION, MAX_SAMPLE_SLOTS, MAX_SECTIONS,
    MAX_SECTION_LOOPS, MAX_SEQUENCER_COLS, MAX_SEQUENCER_STEPS, MIN_BPM, MIN_SECTION_LOOPS,
};
use gridseq_bridge::{RegionWriters, SharedRegion};

use super::{EngineControl, EngineError, SampleSource};

/// In-process engine that publishes every control call through the region's
/// seqlock writers. Owns the only writers of its region.
pub struct NativeEngine {
    region: Arc<SharedRegion>,
    writers: RegionWriters,
    columns: usize,
    total_steps: usize,
}

impl NativeEngine {
    pub fn new(region: Arc<SharedRegion>) -> Result<Self, EngineError> {
        let writers = region
            .claim_writers()
            .ok_or(EngineError::WritersUnavailable)?;
        Ok(Self {
            region,
            writers,
            columns: MAX_SEQUENCER_COLS,
            total_steps: DEFAULT_SECTION_STEPS as usize,
        })
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn playback(&self) -> &PlaybackState {
        self.writers.playback.payload()
    }

    pub fn cell(&self, step: usize, column: usize) -> Option<Cell> {
        self.writers.table.payload().cell(step, column).copied()
    }

    /// Advances the playhead by one step and returns the new step.
    ///
    /// Song mode walks the sections in order, repeating each one for its loop
    /// count. Loop mode wraps inside the playback region.
    pub fn tick(&mut self) -> usize {
        let state = *self.writers.playback.payload();
        if !state.is_playing() {
            return state.current_step.max(0) as usize;
        }
        let table = self.writers.table.payload();
        let count = table.sections().len().max(1);
        let mut section = (state.current_section.max(0) as usize).min(count - 1);
        let mut loop_index = state.current_section_loop;
        let mut step = state.current_step + 1;

        if state.song_mode() {
            if step >= table.sections[section].end_step() {
                loop_index += 1;
                if loop_index >= state.sections_loops_num[section].max(MIN_SECTION_LOOPS) {
                    loop_index = 0;
                    section = (section + 1) % count;
                }
                step = table.sections[section].start_step;
            }
        } else {
            let start = state.region_start;
            let end = state.region_end.max(start + 1);
            if step >= end || step < start {
                step = start;
                loop_index += 1;
            }
        }

        self.writers.playback.update(|playback| {
            playback.current_step = step;
            playback.current_section = section as i32;
            playback.current_section_loop = loop_index;
        });
        step as usize
    }

    fn section(&self, index: usize) -> Option<Section> {
        self.writers.table.payload().sections().get(index).copied()
    }
}

impl EngineControl for NativeEngine {
    fn stop(&mut self) {
        self.writers.playback.update(|playback| playback.is_playing = 0);
        log::debug!("sequencer stopped");
    }

    fn reset_all_patterns(&mut self) {
        self.writers.table.update(|table| {
            table.sections_count = 1;
            table.sections = [Section::default(); MAX_SECTIONS];
            table.sections[0] = Section::new(0, DEFAULT_SECTION_STEPS);
            table.layers = [[MAX_COLS_PER_LAYER as i32; MAX_LAYERS_PER_SECTION]; MAX_SECTIONS];
        });
        self.writers.playback.update(|playback| {
            playback.current_section = 0;
            playback.current_section_loop = 0;
            playback.current_step = 0;
        });
        self.total_steps = DEFAULT_SECTION_STEPS as usize;
    }

    fn set_total_sections(&mut self, count: usize) {
        let count = count.clamp(1, MAX_SECTIONS);
        self.writers
            .table
            .update(|table| table.sections_count = count as i32);
    }

    fn set_current_section(&mut self, index: usize) {
        let Some(section) = self.section(index) else {
            log::warn!("set_current_section({index}) past the native section count");
            return;
        };
        self.writers.playback.update(|playback| {
            playback.current_section = index as i32;
            playback.current_section_loop = 0;
            if !playback.song_mode() {
                playback.region_start = section.start_step;
                playback.region_end = section.end_step();
            }
            if !playback.is_playing() {
                playback.current_step = section.start_step;
            }
        });
    }

    fn set_section_layout(&mut self, index: usize, section: Section) {
        if index >= MAX_SECTIONS {
            log::warn!("section {index} out of range");
            return;
        }
        self.writers
            .table
            .update(|table| table.sections[index] = section);
    }

    fn set_layer_len(&mut self, section: usize, layer: usize, len: i32) {
        if section >= MAX_SECTIONS || layer >= MAX_LAYERS_PER_SECTION {
            log::warn!("layer {layer} of section {section} out of range");
            return;
        }
        let len = len.clamp(1, MAX_COLS_PER_LAYER as i32);
        self.writers
            .table
            .update(|table| table.layers[section][layer] = len);
    }

    fn sections_count(&self) -> usize {
        self.writers.table.payload().sections().len()
    }

    fn set_grid_cell(&mut self, step: usize, column: usize, cell: Cell) {
        if step >= MAX_SEQUENCER_STEPS || column >= MAX_SEQUENCER_COLS {
            log::warn!("grid cell ({step}, {column}) out of range");
            return;
        }
        self.writers
            .table
            .update(|table| table.cells[step][column] = cell);
    }

    fn clear_grid_cell(&mut self, step: usize, column: usize) {
        self.set_grid_cell(step, column, Cell::EMPTY);
    }

    fn clear_all_grid_cells(&mut self) {
        self.writers.table.update(|table| {
            for row in table.cells.iter_mut() {
                *row = [Cell::EMPTY; MAX_SEQUENCER_COLS];
            }
        });
    }

    fn configure_columns(&mut self, columns: usize) {
        self.columns = columns.min(MAX_SEQUENCER_COLS);
    }

    fn set_sequencer_steps(&mut self, steps: usize) {
        self.total_steps = steps.clamp(1, MAX_SEQUENCER_STEPS);
        let last = self.total_steps as i32 - 1;
        self.writers.playback.update(|playback| {
            if playback.current_step > last {
                playback.current_step = last;
            }
        });
    }

    fn set_sequencer_bpm(&mut self, bpm: i32) {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.writers.playback.update(|playback| playback.bpm = bpm);
    }

    fn start_sequencer(&mut self, bpm: i32, steps: usize, start_step: usize) {
        self.total_steps = steps.clamp(1, MAX_SEQUENCER_STEPS);
        let start = start_step.min(self.total_steps - 1) as i32;
        let section = self
            .writers
            .table
            .payload()
            .sections()
            .iter()
            .position(|section| start < section.end_step())
            .unwrap_or(0);
        self.writers.playback.update(|playback| {
            playback.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
            playback.current_step = start;
            playback.current_section = section as i32;
            playback.current_section_loop = 0;
            playback.is_playing = 1;
        });
        log::debug!("sequencer started at step {start} ({steps} steps, {bpm} bpm)");
    }

    fn current_step(&self) -> usize {
        self.playback().current_step.max(0) as usize
    }

    fn is_sequencer_playing(&self) -> bool {
        self.playback().is_playing()
    }

    fn set_song_mode(&mut self, song_mode: bool) {
        self.writers
            .playback
            .update(|playback| playback.song_mode = song_mode as i32);
    }

    fn set_region(&mut self, start: i32, end: i32) {
        self.writers.playback.update(|playback| {
            playback.region_start = start;
            playback.region_end = end;
        });
    }

    fn set_section_loops(&mut self, section: usize, loops: i32) {
        if section >= MAX_SECTIONS {
            return;
        }
        let loops = loops.clamp(MIN_SECTION_LOOPS, MAX_SECTION_LOOPS);
        self.writers
            .playback
            .update(|playback| playback.sections_loops_num[section] = loops);
    }

    fn load_sample(&mut self, slot: usize, source: &SampleSource) -> Result<(), EngineError> {
        if slot >= MAX_SAMPLE_SLOTS {
            return Err(EngineError::SlotOutOfRange {
                slot,
                max: MAX_SAMPLE_SLOTS,
            });
        }
        if !source.path.is_file() {
            return Err(EngineError::SampleNotFound {
                path: source.path.clone(),
            });
        }
        let path = source.path.to_string_lossy();
        self.writers.sample_bank.update(|bank| {
            let entry = &mut bank.samples[slot];
            entry.loaded = 1;
            entry.set_strings(
                source.sample_id.as_deref(),
                Some(path.as_ref()),
                source.display_name.as_deref(),
            );
        });
        log::debug!("slot {slot} loaded from {}", source.path.display());
        Ok(())
    }

    fn unload_sample(&mut self, slot: usize) {
        if slot >= MAX_SAMPLE_SLOTS {
            return;
        }
        self.writers
            .sample_bank
            .update(|bank| bank.samples[slot] = SampleSlot::EMPTY);
    }

    fn set_sample_settings(&mut self, slot: usize, volume: f32, pitch: f32) {
        if slot >= MAX_SAMPLE_SLOTS {
            return;
        }
        self.writers.sample_bank.update(|bank| {
            bank.samples[slot].volume = volume;
            bank.samples[slot].pitch = pitch;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> NativeEngine {
        NativeEngine::new(SharedRegion::anonymous().unwrap()).unwrap()
    }

    #[test]
    fn second_engine_on_a_region_is_refused() {
        let engine = engine();
        assert!(matches!(
            NativeEngine::new(engine.region().clone()),
            Err(EngineError::WritersUnavailable)
        ));
    }

    #[test]
    fn grid_writes_are_visible_to_readers() {
        let mut engine = engine();
        engine.set_grid_cell(3, 1, Cell::new(5, 0.8, 1.2));
        let table = engine.region().readers().table.read_boxed();
        assert!(table.ok);
        assert_eq!(table.value.cells[3][1], Cell::new(5, 0.8, 1.2));

        engine.clear_all_grid_cells();
        assert!(engine.cell(3, 1).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_cells_are_ignored() {
        let mut engine = engine();
        engine.set_grid_cell(MAX_SEQUENCER_STEPS, 0, Cell::new(1, 1.0, 1.0));
        engine.set_grid_cell(0, MAX_SEQUENCER_COLS, Cell::new(1, 1.0, 1.0));
        assert!(engine.cell(0, 0).unwrap().is_empty());
    }

    #[test]
    fn loop_mode_wraps_inside_region() {
        let mut engine = engine();
        engine.set_region(4, 6);
        engine.start_sequencer(120, 16, 4);
        assert_eq!(engine.tick(), 5);
        assert_eq!(engine.tick(), 4);
        engine.stop();
        assert_eq!(engine.tick(), 4);
    }

    #[test]
    fn song_mode_walks_sections_by_loop_count() {
        let mut engine = engine();
        engine.set_total_sections(2);
        engine.set_section_layout(0, Section::new(0, 2));
        engine.set_section_layout(1, Section::new(2, 2));
        engine.set_section_loops(0, 2);
        engine.set_section_loops(1, 1);
        engine.set_song_mode(true);
        engine.start_sequencer(120, 4, 0);

        let steps: Vec<usize> = (0..8).map(|_| engine.tick()).collect();
        assert_eq!(steps, vec![1, 0, 1, 2, 3, 0, 1, 0]);
        assert_eq!(engine.playback().current_section, 0);
    }

    #[test]
    fn current_section_moves_region_in_loop_mode() {
        let mut engine = engine();
        engine.set_total_sections(2);
        engine.set_section_layout(1, Section::new(16, 8));
        engine.set_current_section(1);
        let playback = engine.playback();
        assert_eq!((playback.region_start, playback.region_end), (16, 24));
        assert_eq!(playback.current_step, 16);

        engine.set_current_section(9);
        assert_eq!(engine.playback().current_section, 1);
    }

    #[test]
    fn sample_load_requires_an_existing_file() {
        let mut engine = engine();
        let dir = tempfile::tempdir().unwrap();
        let missing = SampleSource::from_path(dir.path().join("missing.wav"));
        assert!(matches!(
            engine.load_sample(0, &missing),
            Err(EngineError::SampleNotFound { .. })
        ));

        let path = dir.path().join("kick.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        let source = SampleSource {
            sample_id: Some("kick".into()),
            ..SampleSource::from_path(&path)
        };
        engine.load_sample(2, &source).unwrap();
        engine.set_sample_settings(2, 0.5, 2.0);

        let bank = engine.region().readers().sample_bank.read().value;
        assert!(bank.samples[2].is_loaded());
        assert_eq!(bank.samples[2].sample_id(), Some("kick"));
        assert_eq!(bank.samples[2].display_name(), Some("kick"));
        assert_eq!(bank.samples[2].volume, 0.5);

        engine.unload_sample(2);
        assert_eq!(engine.region().readers().sample_bank.read().value.loaded_count(), 0);
        assert!(matches!(
            engine.load_sample(MAX_SAMPLE_SLOTS, &source),
            Err(EngineError::SlotOutOfRange { .. })
        ));
    }
}
