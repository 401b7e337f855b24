use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use gridseq_bridge::layout::{DEFAULT_BPM, MAX_BPM, MAX_COLS_PER_LAYER, MAX_SEQUENCER_COLS, MIN_BPM};
use gridseq_bridge::reader::MAX_TRIES;

use crate::table::GridGeometry;
use crate::undo::UNDO_MAX_HISTORY;

pub const CONFIG_ENV: &str = "GRIDSEQ_CONFIG";
pub const REGION_PATH_ENV: &str = "GRIDSEQ_REGION_PATH";
pub const SAMPLE_ROOT_ENV: &str = "GRIDSEQ_SAMPLE_ROOT";

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    grid: GridConfig,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    paths: PathsConfig,
}

#[derive(Deserialize, Default)]
struct GridConfig {
    rows: Option<usize>,
    columns_per_grid: Option<usize>,
    sound_grids: Option<usize>,
}

#[derive(Deserialize, Default)]
struct EngineConfig {
    bpm: Option<i32>,
    reader_tries: Option<u32>,
    undo_depth: Option<usize>,
}

#[derive(Deserialize, Default)]
struct PathsConfig {
    region: Option<PathBuf>,
    samples: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SequencerConfig {
    pub grid_rows: usize,
    pub columns_per_grid: usize,
    pub sound_grids: usize,
    pub bpm: i32,
    pub reader_tries: u32,
    pub undo_depth: usize,
    /// File the engine maps its shared region to; anonymous memory when unset.
    pub region_path: Option<PathBuf>,
    pub sample_root: Option<PathBuf>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            grid_rows: 16,
            columns_per_grid: MAX_COLS_PER_LAYER,
            sound_grids: 4,
            bpm: DEFAULT_BPM,
            reader_tries: MAX_TRIES,
            undo_depth: UNDO_MAX_HISTORY,
            region_path: None,
            sample_root: None,
        }
    }
}

impl SequencerConfig {
    /// Loads the user config if there is one, then applies environment overrides.
    /// A malformed file is logged and ignored.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(path) = user_config_path() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(user) => config = user,
                    Err(e) => {
                        log::warn!(target: "config", "ignoring config {}: {:#}", path.display(), e)
                    }
                }
            }
        }
        config.apply_env();
        config
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        let fallback = Self::default();
        let config = Self {
            grid_rows: file.grid.rows.unwrap_or(fallback.grid_rows).max(1),
            columns_per_grid: file
                .grid
                .columns_per_grid
                .unwrap_or(fallback.columns_per_grid)
                .clamp(1, MAX_COLS_PER_LAYER),
            sound_grids: file.grid.sound_grids.unwrap_or(fallback.sound_grids).max(1),
            bpm: file.engine.bpm.unwrap_or(fallback.bpm).clamp(MIN_BPM, MAX_BPM),
            reader_tries: file.engine.reader_tries.unwrap_or(fallback.reader_tries).max(1),
            undo_depth: file.engine.undo_depth.unwrap_or(fallback.undo_depth),
            region_path: file.paths.region,
            sample_root: file.paths.samples,
        };
        if config.sound_grids * config.columns_per_grid > MAX_SEQUENCER_COLS {
            anyhow::bail!(
                "{} sound grids of {} columns exceed the {} native columns",
                config.sound_grids,
                config.columns_per_grid,
                MAX_SEQUENCER_COLS
            );
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(path) = std::env::var_os(REGION_PATH_ENV) {
            self.region_path = Some(PathBuf::from(path));
        }
        if let Some(path) = std::env::var_os(SAMPLE_ROOT_ENV) {
            self.sample_root = Some(PathBuf::from(path));
        }
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.grid_rows, self.columns_per_grid, self.sound_grids)
    }
}

fn user_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("gridseq").join("config.toml"))
}
