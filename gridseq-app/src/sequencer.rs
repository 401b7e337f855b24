use std::path::Path;

use anyhow::{Context, Result};
use gridseq_bridge::SharedRegion;

use crate::config::SequencerConfig;
use crate::engine::{EngineBridge, NativeEngine};
use crate::snapshot::{self, DirSampleLibrary, ImportReport, ImportStep};
use crate::table::TableSyncEngine;

/// One editing session: the engine writing a shared region, a reader on the
/// same region, and the table that keeps them in step.
pub struct Sequencer {
    pub table: TableSyncEngine<NativeEngine>,
    pub bridge: EngineBridge,
    pub library: DirSampleLibrary,
}

impl Sequencer {
    /// Builds a session from `config`, mapping the region file it names or an
    /// anonymous region otherwise.
    pub fn open(config: &SequencerConfig) -> Result<Self> {
        let region = match config.region_path.as_deref() {
            Some(path) => SharedRegion::create_file(path)
                .with_context(|| format!("failed to create region {}", path.display()))?,
            None => SharedRegion::anonymous().context("failed to map anonymous region")?,
        };
        let bridge = EngineBridge::new(&region).with_max_tries(config.reader_tries);
        let engine = NativeEngine::new(region)?;
        let mut table = TableSyncEngine::new(engine, config.geometry())?
            .with_history_depth(config.undo_depth);
        table.set_bpm(config.bpm);
        table.clear_history();
        let library = match config.sample_root.as_deref() {
            Some(root) => DirSampleLibrary::open(root)?,
            None => DirSampleLibrary::new(std::env::current_dir()?),
        };
        log::info!(
            "sequencer ready: {} x {} grid, {} sound grids",
            config.grid_rows,
            config.columns_per_grid,
            config.sound_grids
        );
        Ok(Self {
            table,
            bridge,
            library,
        })
    }

    pub fn export_json(&self, name: &str, description: Option<&str>) -> Result<String> {
        Ok(snapshot::export_json(&self.bridge, name, description)?)
    }

    pub fn import_json(
        &mut self,
        json: &str,
        progress: impl FnMut(ImportStep),
    ) -> Result<ImportReport> {
        Ok(snapshot::import(&mut self.table, &self.library, json, progress)?)
    }

    pub fn save(&self, path: &Path, name: &str) -> Result<()> {
        let json = self.export_json(name, None)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(&mut self, path: &Path) -> Result<ImportReport> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.import_json(&json, |step| log::debug!("import: {}", step))
    }
}
