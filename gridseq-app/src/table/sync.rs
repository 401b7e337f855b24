use std::ops::{Deref, DerefMut};

use gridseq_bridge::layout::{
    Cell, MAX_SAMPLE_SLOTS, MAX_SECTIONS, MAX_SEQUENCER_COLS, MAX_SEQUENCER_STEPS,
};

use crate::engine::EngineControl;
use crate::selection::CellSelection;
use crate::undo::{UndoHistory, UNDO_MAX_HISTORY};

use super::geometry::GridGeometry;
use super::model::TableModel;
use super::plan::{plan_edit, EditKind, PlayState, SyncPlan};
use super::settings::{SampleSettings, SessionSettings};
use super::TableError;

/// Steps and columns the engine was last configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Extent {
    steps: usize,
    columns: usize,
}

/// What one undo or redo step restores.
#[derive(Clone, Debug, PartialEq)]
struct SessionSnapshot {
    model: TableModel,
    settings: SessionSettings,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResizeReport {
    pub dropped_cells: usize,
    pub selection_cleared: bool,
}

/// Owns the editable table and keeps the engine's flat grid in step with it.
///
/// Every structural mutation goes through here, from one engine-control
/// context. While sync is suspended only the model changes; the engine is
/// brought back in line by `refresh_structure` and `sync_full_table`.
pub struct TableSyncEngine<E: EngineControl> {
    engine: E,
    model: TableModel,
    settings: SessionSettings,
    current_section: usize,
    sync_enabled: bool,
    cached_sections: usize,
    selection: Option<CellSelection>,
    history: UndoHistory<SessionSnapshot>,
}

impl<E: EngineControl> TableSyncEngine<E> {
    pub fn new(engine: E, geometry: GridGeometry) -> Result<Self, TableError> {
        if geometry.grid_rows == 0 || geometry.grid_rows > MAX_SEQUENCER_STEPS {
            return Err(TableError::InvalidStepCount(geometry.grid_rows));
        }
        let max_grids = MAX_SEQUENCER_COLS / geometry.columns_per_grid.max(1);
        if geometry.columns_per_grid == 0 || geometry.sound_grids == 0 || geometry.sound_grids > max_grids {
            return Err(TableError::SoundGridsOutOfRange {
                requested: geometry.sound_grids,
                max: max_grids,
            });
        }
        let mut table = Self {
            engine,
            model: TableModel::new(geometry),
            settings: SessionSettings::default(),
            current_section: 0,
            sync_enabled: true,
            cached_sections: 0,
            selection: None,
            history: UndoHistory::new(UNDO_MAX_HISTORY),
        };
        table.rebuild();
        Ok(table)
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = UndoHistory::new(depth);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn model(&self) -> &TableModel {
        &self.model
    }

    pub fn geometry(&self) -> GridGeometry {
        self.model.geometry()
    }

    /// Playback and sample settings as last written through this table.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn current_section(&self) -> usize {
        self.current_section
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Section count as of the last structure push or refresh.
    pub fn cached_sections(&self) -> usize {
        self.cached_sections
    }

    pub fn play_state(&self) -> PlayState {
        if self.engine.is_sequencer_playing() {
            PlayState::Playing
        } else {
            PlayState::Stopped
        }
    }

    pub fn cell(&self, step: usize, column: usize) -> Option<Cell> {
        self.model.cell(step, column)
    }

    pub fn set_cell(&mut self, step: usize, column: usize, cell: Cell) -> Result<(), TableError> {
        self.edit(|model| model.set_cell(step, column, cell))?;
        self.sync_edit(EditKind::SingleCell { step, column }, self.extent());
        Ok(())
    }

    /// Changes a cell's volume and pitch, keeping its sample slot.
    pub fn set_cell_settings(
        &mut self,
        step: usize,
        column: usize,
        volume: f32,
        pitch: f32,
    ) -> Result<(), TableError> {
        self.edit(|model| model.set_cell_settings(step, column, volume, pitch))?;
        self.sync_edit(EditKind::SingleCell { step, column }, self.extent());
        Ok(())
    }

    /// Changes a cell's sample slot, keeping its volume and pitch.
    pub fn set_cell_sample_slot(
        &mut self,
        step: usize,
        column: usize,
        sample_slot: i32,
    ) -> Result<(), TableError> {
        self.edit(|model| model.set_cell_sample_slot(step, column, sample_slot))?;
        self.sync_edit(EditKind::SingleCell { step, column }, self.extent());
        Ok(())
    }

    pub fn clear_cell(&mut self, step: usize, column: usize) -> Result<(), TableError> {
        self.set_cell(step, column, Cell::EMPTY)
    }

    /// Clears the engine's grid and writes back every populated cell of every
    /// section. Discards native state, so it is only for stopped playback or
    /// fresh structure. Returns the number of cells written.
    pub fn sync_full_table(&mut self) -> usize {
        if !self.sync_enabled {
            log::debug!("full table sync skipped while sync is suspended");
            return 0;
        }
        self.engine.clear_all_grid_cells();
        let written: usize = (0..self.model.section_count())
            .map(|index| self.push_section(index, false))
            .sum();
        log::debug!(
            "full table sync: {} sections, {} cells",
            self.model.section_count(),
            written
        );
        written
    }

    /// Rewrites one section's cells, empty ones included. Other sections are
    /// left alone; the engine holds the whole song at once.
    pub fn sync_section(&mut self, index: usize) -> Result<usize, TableError> {
        if index >= self.model.section_count() {
            return Err(TableError::SectionOutOfRange {
                index,
                count: self.model.section_count(),
            });
        }
        if !self.sync_enabled {
            return Ok(0);
        }
        Ok(self.push_section(index, true))
    }

    pub fn sync_current_section_only(&mut self) -> usize {
        self.sync_section(self.current_section).unwrap_or(0)
    }

    /// Sets every section to `rows` steps. Rows are added or removed at the
    /// bottom; cells below a shrunk edge are dropped and logged.
    pub fn resize_grid_rows(&mut self, rows: usize) -> Result<ResizeReport, TableError> {
        let previous = self.extent();
        let old_rows = self.model.geometry().grid_rows;
        let dropped_cells = self.edit(|model| model.resize_rows(rows))?;
        if dropped_cells > 0 {
            log::warn!(
                "grid rows {} -> {} dropped {} populated cells",
                old_rows,
                rows,
                dropped_cells
            );
        }
        let selection_cleared = self.reconcile_selection();
        self.sync_structure(previous);
        Ok(ResizeReport {
            dropped_cells,
            selection_cleared,
        })
    }

    pub fn increase_grid_rows(&mut self, by: usize) -> Result<ResizeReport, TableError> {
        self.resize_grid_rows(self.model.geometry().grid_rows + by)
    }

    pub fn decrease_grid_rows(&mut self, by: usize) -> Result<ResizeReport, TableError> {
        let rows = self.model.geometry().grid_rows.saturating_sub(by).max(1);
        self.resize_grid_rows(rows)
    }

    pub fn set_sound_grid_count(&mut self, count: usize) -> Result<usize, TableError> {
        let previous = self.extent();
        let dropped = self.edit(|model| model.set_sound_grids(count))?;
        if dropped > 0 {
            log::warn!("sound grid count {} dropped {} populated cells", count, dropped);
        }
        self.reconcile_selection();
        self.sync_structure(previous);
        Ok(dropped)
    }

    /// Appends a section at the end of the song, empty or copied from `copy_from`.
    pub fn append_section(&mut self, copy_from: Option<usize>) -> Result<usize, TableError> {
        let previous = self.extent();
        let index = self.edit(|model| model.append_section(copy_from))?;
        self.sync_structure(previous);
        Ok(index)
    }

    pub fn delete_section(&mut self, index: usize) -> Result<(), TableError> {
        let previous = self.extent();
        let dropped = self.edit(|model| model.delete_section(index))?;
        if dropped > 0 {
            log::info!("deleted section {} with {} populated cells", index, dropped);
        }
        if self.current_section > index || self.current_section >= self.model.section_count() {
            self.current_section -= 1;
        }
        self.selection = match self.selection {
            Some(selection) if selection.section == index => None,
            Some(mut selection) if selection.section > index => {
                selection.section -= 1;
                Some(selection)
            }
            other => other,
        };
        self.sync_structure(previous);
        if self.sync_enabled {
            self.engine.set_current_section(self.current_section);
        }
        Ok(())
    }

    pub fn set_section_step_count(&mut self, index: usize, steps: usize) -> Result<usize, TableError> {
        let previous = self.extent();
        let dropped = self.edit(|model| model.set_section_step_count(index, steps))?;
        if dropped > 0 {
            log::warn!(
                "section {} resized to {} steps, dropped {} populated cells",
                index,
                steps,
                dropped
            );
        }
        self.reconcile_selection();
        self.sync_structure(previous);
        Ok(dropped)
    }

    /// Inserts an empty row before `row` of a section. Later rows and
    /// sections move down one step.
    pub fn insert_step(&mut self, section: usize, row: usize) -> Result<(), TableError> {
        let previous = self.extent();
        self.edit(|model| model.insert_step(section, row))?;
        self.sync_structure(previous);
        Ok(())
    }

    /// Removes `row` of a section. Later rows and sections move up one step.
    /// Returns the populated cells dropped with the row.
    pub fn delete_step(&mut self, section: usize, row: usize) -> Result<usize, TableError> {
        let previous = self.extent();
        let dropped = self.edit(|model| model.delete_step(section, row))?;
        if dropped > 0 {
            log::info!(
                "deleted row {} of section {} with {} populated cells",
                row,
                section,
                dropped
            );
        }
        self.reconcile_selection();
        self.sync_structure(previous);
        Ok(dropped)
    }

    pub fn set_layer_len(&mut self, section: usize, layer: usize, len: i32) -> Result<(), TableError> {
        self.edit(|model| model.set_layer_len(section, layer, len))?;
        if self.sync_enabled {
            self.engine.set_layer_len(section, layer, len);
        }
        Ok(())
    }

    /// Makes `index` the current section. While stopped, that section's cells
    /// are rewritten so the engine plays exactly what the editor shows.
    pub fn switch_to_section(&mut self, index: usize) -> Result<(), TableError> {
        self.set_current_section(index)?;
        if self.sync_enabled && self.play_state() == PlayState::Stopped {
            self.sync_current_section_only();
        }
        Ok(())
    }

    /// Moves the current section without touching any cells.
    pub fn set_current_section(&mut self, index: usize) -> Result<(), TableError> {
        if index >= self.model.section_count() {
            return Err(TableError::SectionOutOfRange {
                index,
                count: self.model.section_count(),
            });
        }
        self.current_section = index;
        if self.selection.is_some_and(|selection| selection.section != index) {
            self.selection = None;
        }
        self.engine.set_current_section(index);
        Ok(())
    }

    // Settings are not part of the flat grid, so they reach the engine even
    // while sync is suspended. History still only records while it is enabled.

    pub fn set_bpm(&mut self, bpm: i32) {
        let bpm = SessionSettings::clamp_bpm(bpm);
        self.edit_settings(|settings| settings.bpm = bpm);
        self.engine.set_sequencer_bpm(bpm);
    }

    pub fn set_song_mode(&mut self, song_mode: bool) {
        self.edit_settings(|settings| settings.song_mode = song_mode);
        self.engine.set_song_mode(song_mode);
    }

    pub fn set_section_loops(&mut self, section: usize, loops: i32) -> Result<(), TableError> {
        if section >= MAX_SECTIONS {
            return Err(TableError::SectionOutOfRange {
                index: section,
                count: MAX_SECTIONS,
            });
        }
        let loops = SessionSettings::clamp_loops(loops);
        self.edit_settings(|settings| settings.section_loops[section] = loops);
        self.engine.set_section_loops(section, loops);
        Ok(())
    }

    pub fn set_sample_settings(&mut self, slot: usize, volume: f32, pitch: f32) -> Result<(), TableError> {
        if slot >= MAX_SAMPLE_SLOTS {
            return Err(TableError::SampleSlotOutOfRange {
                slot,
                max: MAX_SAMPLE_SLOTS,
            });
        }
        self.edit_settings(|settings| settings.samples[slot] = SampleSettings { volume, pitch });
        self.engine.set_sample_settings(slot, volume, pitch);
        Ok(())
    }

    /// Unloads every sample slot; their settings return to the defaults.
    pub fn clear_sample_bank(&mut self) {
        for slot in 0..MAX_SAMPLE_SLOTS {
            self.engine.unload_sample(slot);
        }
        self.settings.samples = [SampleSettings::default(); MAX_SAMPLE_SLOTS];
    }

    /// Pushes the section layout to the engine and re-reads the engine's
    /// section count instead of trusting the cached one.
    pub fn refresh_structure(&mut self) -> usize {
        let extent = self.extent();
        self.engine.configure_columns(extent.columns);
        self.push_structure();
        self.engine.set_sequencer_steps(extent.steps);
        let native = self.engine.sections_count();
        if native != self.model.section_count() {
            log::warn!(
                "engine reports {} sections, table has {}",
                native,
                self.model.section_count()
            );
        }
        self.cached_sections = native;
        native
    }

    /// Stops mirroring edits to the engine until the guard drops. Sync is
    /// re-enabled on drop whether or not the edits in between succeeded.
    pub fn suspend_sync(&mut self) -> SyncSuspension<'_, E> {
        self.sync_enabled = false;
        log::debug!("native sync suspended");
        SyncSuspension { table: self }
    }

    /// Replaces the table with one empty section of `grid_rows` steps.
    pub fn reset_structure(&mut self) {
        self.model = TableModel::new(self.model.geometry());
        self.current_section = 0;
        self.selection = None;
        self.engine.set_total_sections(1);
        self.cached_sections = 1;
    }

    /// Loads section sizes and layer widths, leaving every cell empty.
    /// Only the model changes; callers push the result to the engine.
    pub fn load_structure(
        &mut self,
        step_counts: &[usize],
        layers: &[Vec<i32>],
        grid_rows: usize,
    ) -> Result<(), TableError> {
        self.edit(|model| model.load_structure(step_counts, layers, grid_rows))?;
        self.current_section = self.current_section.min(self.model.section_count() - 1);
        self.reconcile_selection();
        Ok(())
    }

    pub fn select_cell(&mut self, step: usize, column: usize) -> Result<(), TableError> {
        let address = self.model.locate(step, column)?;
        self.selection = Some(CellSelection::single(address.section, address.row, column));
        Ok(())
    }

    pub fn selection(&self) -> Option<CellSelection> {
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Trims a selection to its own section's rows and the table's columns,
    /// and drops it once nothing of it is left or its section is gone.
    /// Returns true if anything was cleared or trimmed.
    pub fn reconcile_selection(&mut self) -> bool {
        let Some(selection) = self.selection else {
            return false;
        };
        let reconciled = self.model.sections().get(selection.section).and_then(|section| {
            selection.clamp(section.num_steps as usize, self.model.total_columns())
        });
        self.selection = reconciled;
        reconciled != Some(selection)
    }

    /// Restores the table and settings recorded before the last edit.
    pub fn undo(&mut self) -> bool {
        self.step_history(|history, current| history.undo(current))
    }

    pub fn redo(&mut self) -> bool {
        self.step_history(|history, current| history.redo(current))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn step_history(
        &mut self,
        step: impl FnOnce(&mut UndoHistory<SessionSnapshot>, &mut SessionSnapshot) -> bool,
    ) -> bool {
        let previous = self.extent();
        let mut current = self.snapshot();
        if !step(&mut self.history, &mut current) {
            return false;
        }
        let replaced = std::mem::replace(&mut self.settings, current.settings);
        self.model = current.model;
        self.settings.push_changes(&replaced, &mut self.engine);
        self.current_section = self.current_section.min(self.model.section_count() - 1);
        self.reconcile_selection();
        self.sync_structure(previous);
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            model: self.model.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Runs a model mutation, recording the prior state for undo when it
    /// succeeds. Nothing is recorded while sync is suspended.
    fn edit<R>(
        &mut self,
        f: impl FnOnce(&mut TableModel) -> Result<R, TableError>,
    ) -> Result<R, TableError> {
        let before = self.sync_enabled.then(|| self.snapshot());
        let result = f(&mut self.model)?;
        if let Some(before) = before {
            self.history.push(before);
        }
        Ok(result)
    }

    fn edit_settings(&mut self, f: impl FnOnce(&mut SessionSettings)) {
        if self.sync_enabled {
            let before = self.snapshot();
            self.history.push(before);
        }
        f(&mut self.settings);
    }

    fn sync_structure(&mut self, previous: Extent) {
        self.sync_edit(EditKind::Structural, previous);
    }

    fn sync_edit(&mut self, kind: EditKind, previous: Extent) {
        if !self.sync_enabled {
            return;
        }
        match plan_edit(self.play_state(), kind) {
            SyncPlan::InPlaceWrite { step, column } => self.write_native_cell(step, column),
            SyncPlan::LiveReconfigure => {
                log::debug!("structural sync via live reconfigure");
                self.reconfigure_live(previous);
            }
            SyncPlan::Rebuild => {
                log::debug!("structural sync via rebuild");
                self.rebuild();
            }
        }
    }

    fn rebuild(&mut self) {
        let extent = self.extent();
        self.engine.configure_columns(extent.columns);
        self.push_structure();
        self.engine.set_sequencer_steps(extent.steps);
        self.engine.set_current_section(self.current_section);
        self.sync_full_table();
    }

    fn reconfigure_live(&mut self, previous: Extent) {
        let extent = self.extent();
        self.engine.configure_columns(extent.columns);
        self.push_structure();
        self.engine.set_sequencer_steps(extent.steps);
        for index in 0..self.model.section_count() {
            self.push_section(index, true);
        }
        // Stale cells past the new edges would otherwise replay if the table grows again.
        for step in 0..previous.steps.max(extent.steps) {
            for column in extent.columns..previous.columns.max(extent.columns) {
                self.engine.clear_grid_cell(step, column);
            }
        }
        for step in extent.steps..previous.steps {
            for column in 0..extent.columns {
                self.engine.clear_grid_cell(step, column);
            }
        }
    }

    fn push_structure(&mut self) {
        let count = self.model.section_count();
        self.engine.set_total_sections(count);
        for (index, section) in self.model.sections().iter().enumerate() {
            self.engine.set_section_layout(index, *section);
            if let Some(layers) = self.model.layers(index) {
                for (layer, len) in layers.iter().enumerate() {
                    self.engine.set_layer_len(index, layer, *len);
                }
            }
        }
        self.cached_sections = count;
    }

    fn push_section(&mut self, index: usize, write_empty: bool) -> usize {
        let mut written = 0;
        for (step, column, cell) in self.model.section_cells(index) {
            if !cell.is_empty() {
                self.engine.set_grid_cell(step, column, cell);
                written += 1;
            } else if write_empty {
                self.engine.clear_grid_cell(step, column);
            }
        }
        written
    }

    fn write_native_cell(&mut self, step: usize, column: usize) {
        let cell = self.model.cell(step, column).unwrap_or(Cell::EMPTY);
        if cell.is_empty() {
            self.engine.clear_grid_cell(step, column);
        } else {
            self.engine.set_grid_cell(step, column, cell);
        }
    }

    fn extent(&self) -> Extent {
        Extent {
            steps: self.model.total_steps(),
            columns: self.model.total_columns(),
        }
    }
}

/// Guard returned by [`TableSyncEngine::suspend_sync`].
pub struct SyncSuspension<'a, E: EngineControl> {
    table: &'a mut TableSyncEngine<E>,
}

impl<E: EngineControl> Deref for SyncSuspension<'_, E> {
    type Target = TableSyncEngine<E>;

    fn deref(&self) -> &Self::Target {
        self.table
    }
}

impl<E: EngineControl> DerefMut for SyncSuspension<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.table
    }
}

impl<E: EngineControl> Drop for SyncSuspension<'_, E> {
    fn drop(&mut self) {
        self.table.sync_enabled = true;
        log::debug!("native sync re-enabled");
    }
}
