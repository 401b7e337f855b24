use gridseq_bridge::layout::{
    DEFAULT_BPM, DEFAULT_SECTION_LOOPS, MAX_BPM, MAX_SAMPLE_SLOTS, MAX_SECTIONS,
    MAX_SECTION_LOOPS, MIN_BPM, MIN_SECTION_LOOPS,
};

use crate::engine::EngineControl;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleSettings {
    pub volume: f32,
    pub pitch: f32,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
        }
    }
}

/// Playback and sample-bank settings edited next to the table. Undo restores
/// them together with the table model.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub bpm: i32,
    pub song_mode: bool,
    pub section_loops: [i32; MAX_SECTIONS],
    pub samples: [SampleSettings; MAX_SAMPLE_SLOTS],
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            song_mode: false,
            section_loops: [DEFAULT_SECTION_LOOPS; MAX_SECTIONS],
            samples: [SampleSettings::default(); MAX_SAMPLE_SLOTS],
        }
    }
}

impl SessionSettings {
    pub fn clamp_bpm(bpm: i32) -> i32 {
        bpm.clamp(MIN_BPM, MAX_BPM)
    }

    pub fn clamp_loops(loops: i32) -> i32 {
        loops.clamp(MIN_SECTION_LOOPS, MAX_SECTION_LOOPS)
    }

    /// Writes the fields that differ from `previous`.
    pub fn push_changes<E: EngineControl>(&self, previous: &SessionSettings, engine: &mut E) {
        if self.bpm != previous.bpm {
            engine.set_sequencer_bpm(self.bpm);
        }
        if self.song_mode != previous.song_mode {
            engine.set_song_mode(self.song_mode);
        }
        for (section, (loops, old)) in self
            .section_loops
            .iter()
            .zip(previous.section_loops.iter())
            .enumerate()
        {
            if loops != old {
                engine.set_section_loops(section, *loops);
            }
        }
        for (slot, (settings, old)) in self.samples.iter().zip(previous.samples.iter()).enumerate() {
            if settings != old {
                engine.set_sample_settings(slot, settings.volume, settings.pitch);
            }
        }
    }
}
