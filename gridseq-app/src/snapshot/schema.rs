//! Typed form of the persisted snapshot document.

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SnapshotDocument {
    pub snapshot: Snapshot,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub schema_version: u32,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    pub version: String,
    pub source: SourceModules,
    #[serde(default)]
    pub renders: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SourceModules {
    pub table: TableModule,
    pub playback: PlaybackModule,
    pub sample_bank: SampleBankModule,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TableModule {
    pub sections_count: i32,
    pub sections: Vec<SectionEntry>,
    /// Column count per layer, per section. Short or missing rows take the default width.
    #[serde(default)]
    pub layers: Vec<Vec<i32>>,
    pub table_cells: Vec<Vec<CellEntry>>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SectionEntry {
    pub start_step: i32,
    pub num_steps: i32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub volume: f32,
    pub pitch: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CellEntry {
    pub sample_slot: i32,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlaybackModule {
    pub bpm: i32,
    pub region_start: i32,
    pub region_end: i32,
    pub song_mode: i32,
    pub current_section: i32,
    pub current_section_loop: i32,
    pub sections_loops_num: Vec<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SampleBankModule {
    pub max_slots: i32,
    pub samples: Vec<SampleEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SampleEntry {
    pub loaded: bool,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}
