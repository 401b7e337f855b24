mod common;

use common::{recording_table, Call};
use gridseq_app::engine::EngineControl;
use gridseq_app::snapshot::{self, DirSampleLibrary, ImportErrorKind, ImportStep};
use gridseq_app::TableError;
use serde_json::{json, Value};

fn document(sections: &[i32], cells: &[(usize, usize, i32)], samples: Value) -> String {
    document_at(sections, cells, samples, 0)
}

fn document_at(
    sections: &[i32],
    cells: &[(usize, usize, i32)],
    samples: Value,
    current_section: usize,
) -> String {
    let total: i32 = sections.iter().sum();
    let mut start = 0;
    let section_entries: Vec<Value> = sections
        .iter()
        .map(|steps| {
            let entry = json!({"start_step": start, "num_steps": steps});
            start += steps;
            entry
        })
        .collect();
    let mut rows = vec![vec![json!({"sample_slot": -1}); 16]; total as usize];
    for (step, column, slot) in cells {
        rows[*step][*column] = json!({"sample_slot": slot, "settings": {"volume": 0.8, "pitch": 1.2}});
    }
    json!({"snapshot": {
        "schema_version": 1,
        "id": "6553f1000000000000000001",
        "name": "fixture",
        "created_at": "2023-11-14T22:13:20.000Z",
        "version": "0.1.0",
        "source": {
            "table": {
                "sections_count": sections.len(),
                "sections": section_entries,
                "table_cells": rows,
            },
            "playback": {
                "bpm": 140,
                "region_start": 0,
                "region_end": total,
                "song_mode": 1,
                "current_section": current_section,
                "current_section_loop": 2,
                "sections_loops_num": [2, 3],
            },
            "sample_bank": {"max_slots": 26, "samples": samples},
        },
    }})
    .to_string()
}

fn empty_bank() -> Value {
    Value::Array(vec![json!({"loaded": false}); 26])
}

#[test]
fn playback_stops_before_any_grid_write() {
    let (mut table, _bridge) = recording_table();
    table.engine_mut().start_sequencer(120, 16, 0);
    table.engine_mut().calls.clear();

    let library = DirSampleLibrary::new(std::env::temp_dir());
    let json = document(&[8, 16], &[(3, 0, 5), (20, 9, 2)], empty_bank());
    let report = snapshot::import(&mut table, &library, &json, |_| {}).unwrap();
    assert_eq!(report.sections, 2);
    assert_eq!(report.populated_cells, 2);

    let engine = table.engine();
    assert_eq!(engine.calls.first(), Some(&Call::Stop));
    let reset = engine.position(&Call::ResetPatterns).unwrap();
    let clear_all = engine.position(&Call::ClearAllGridCells).unwrap();
    let first_write = engine
        .first_matching(|call| matches!(call, Call::SetGridCell(..)))
        .unwrap();
    assert!(reset < clear_all && clear_all < first_write);
    assert!(!engine.is_sequencer_playing());
    assert!(engine.position(&Call::Start).is_none());
    assert_eq!(engine.inner.cell(20, 9).map(|cell| cell.sample_slot), Some(2));
    assert!(engine.position(&Call::SetRegion(0, 24)).is_some());
}

#[test]
fn progress_reports_every_step_in_order() {
    let (mut table, _bridge) = recording_table();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    let mut seen = Vec::new();
    snapshot::import(
        &mut table,
        &library,
        &document(&[16], &[], empty_bank()),
        |step| seen.push(step),
    )
    .unwrap();
    assert_eq!(seen, ImportStep::ALL.to_vec());
}

#[test]
fn failed_table_step_reenables_sync() {
    let (mut table, _bridge) = recording_table();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    let json = document(&[16], &[(40, 0, 1)], empty_bank());

    let err = snapshot::import(&mut table, &library, &json, |_| {}).unwrap_err();
    assert_eq!(err.step, ImportStep::ImportTable);
    assert!(table.is_sync_enabled());

    // Edits after the failure reach the engine again.
    table.engine_mut().calls.clear();
    table
        .set_cell(0, 0, gridseq_bridge::Cell::new(1, 1.0, 1.0))
        .unwrap();
    assert!(table.engine().position(&Call::SetGridCell(0, 0)).is_some());
}

#[test]
fn too_many_sections_fail_in_table_step() {
    let (mut table, _bridge) = recording_table();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    let sections = vec![1; 65];
    let err = snapshot::import(&mut table, &library, &document(&sections, &[], empty_bank()), |_| {})
        .unwrap_err();
    assert_eq!(err.step, ImportStep::ImportTable);
    assert!(matches!(
        err.kind,
        ImportErrorKind::Table(TableError::TooManySections { max: 64 })
    ));
    assert!(table.is_sync_enabled());
    assert!(err.to_string().starts_with("snapshot import failed at import table"));
}

#[test]
fn parse_failure_leaves_engine_untouched() {
    let (mut table, _bridge) = recording_table();
    table.engine_mut().calls.clear();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    let err = snapshot::import(&mut table, &library, "{\"snapshot\": {}}", |_| {}).unwrap_err();
    assert_eq!(err.step, ImportStep::Parse);
    assert!(table.engine().calls.is_empty());
    assert!(!snapshot::import_from_json(&mut table, &library, "[]", |_| {}));
}

#[test]
fn missing_sample_is_skipped_and_settings_still_apply() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("clap.wav"), b"RIFF").unwrap();
    let mut samples = vec![json!({"loaded": false}); 26];
    samples[0] = json!({
        "loaded": true,
        "settings": {"volume": 0.5, "pitch": 0.75},
        "sample_id": "gone",
        "file_path": "/nowhere/gone.wav",
        "display_name": "gone",
    });
    samples[1] = json!({
        "loaded": true,
        "settings": {"volume": 0.9, "pitch": 1.0},
        "file_path": "/old/machine/clap.wav",
    });

    let (mut table, bridge) = recording_table();
    let library = DirSampleLibrary::new(dir.path());
    let report = snapshot::import(
        &mut table,
        &library,
        &document(&[16], &[], Value::Array(samples)),
        |_| {},
    )
    .unwrap();
    assert_eq!(report.loaded_slots, vec![1]);
    assert_eq!(report.failed_slots, vec![0]);

    let bank = bridge.sample_bank().value;
    assert!(!bank.samples[0].is_loaded());
    assert_eq!(bank.samples[0].volume, 0.5);
    assert_eq!(bank.samples[0].pitch, 0.75);
    assert!(bank.samples[1].is_loaded());
    assert_eq!(bank.samples[1].display_name(), Some("clap"));
}

#[test]
fn playback_settings_are_restored() {
    let (mut table, bridge) = recording_table();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    snapshot::import(&mut table, &library, &document(&[8, 16], &[], empty_bank()), |_| {})
        .unwrap();
    let playback = bridge.playback().value;
    assert_eq!(playback.bpm, 140);
    assert!(playback.song_mode());
    assert_eq!(playback.sections_loops_num[0], 2);
    assert_eq!(playback.sections_loops_num[1], 3);
    assert_eq!(playback.sections_loops_num[2], 4);
    assert_eq!((playback.region_start, playback.region_end), (0, 24));
    assert_eq!(table.geometry().grid_rows, 8);
    assert!(!table.can_undo());
}

#[test]
fn no_grid_writes_follow_the_final_section_switch() {
    let (mut table, _bridge) = recording_table();
    table.engine_mut().calls.clear();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    let json = document_at(&[8, 16], &[(3, 0, 5), (20, 9, 2)], empty_bank(), 1);
    snapshot::import(&mut table, &library, &json, |_| {}).unwrap();

    let engine = table.engine();
    let last_switch = engine
        .calls
        .iter()
        .rposition(|call| matches!(call, Call::SetCurrentSection(_)))
        .unwrap();
    assert_eq!(engine.calls[last_switch], Call::SetCurrentSection(1));
    assert!(engine.calls[last_switch..].iter().all(|call| !matches!(
        call,
        Call::SetGridCell(..) | Call::ClearGridCell(..) | Call::ClearAllGridCells
    )));
    assert_eq!(table.current_section(), 1);
    assert_eq!(table.geometry().grid_rows, 16);
    assert_eq!(engine.inner.cell(20, 9).map(|cell| cell.sample_slot), Some(2));
    assert_eq!(engine.inner.playback().current_section, 1);
}
