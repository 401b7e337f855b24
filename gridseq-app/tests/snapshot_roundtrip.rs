mod common;

use common::native_table;
use gridseq_app::snapshot::{self, DirSampleLibrary, SnapshotDocument, SCHEMA_VERSION};
use gridseq_bridge::layout::Cell;

fn parse(json: &str) -> SnapshotDocument {
    serde_json::from_str(json).unwrap()
}

#[test]
fn export_import_export_keeps_table() {
    let (mut table, bridge) = native_table();
    table.set_section_step_count(0, 8).unwrap();
    table.append_section(None).unwrap();
    table.set_cell(3, 0, Cell::new(5, 0.8, 1.2)).unwrap();
    table.set_cell(12, 7, Cell::new(0, 1.0, 0.5)).unwrap();

    let first = snapshot::export_json(&bridge, "session", Some("two sections")).unwrap();
    assert!(snapshot::validate_json(&first));
    let first_doc = parse(&first);
    assert_eq!(first_doc.snapshot.schema_version, SCHEMA_VERSION);
    assert_eq!(first_doc.snapshot.description.as_deref(), Some("two sections"));
    let sections = &first_doc.snapshot.source.table.sections;
    assert_eq!(sections.len(), 2);
    assert_eq!((sections[0].start_step, sections[0].num_steps), (0, 8));
    assert_eq!((sections[1].start_step, sections[1].num_steps), (8, 16));

    let (mut fresh, fresh_bridge) = native_table();
    let library = DirSampleLibrary::new(std::env::temp_dir());
    snapshot::import(&mut fresh, &library, &first, |_| {}).unwrap();
    let second = parse(&snapshot::export_json(&fresh_bridge, "session", None).unwrap());

    let before = &first_doc.snapshot.source.table;
    let after = &second.snapshot.source.table;
    assert_eq!(after.sections, before.sections);
    assert_eq!(after.sections_count, 2);
    assert_eq!(after.table_cells, before.table_cells);
    let cell = after.table_cells[3][0];
    assert_eq!(cell.sample_slot, 5);
    assert_eq!(cell.settings.volume, 0.8);
    assert_eq!(cell.settings.pitch, 1.2);
    assert_eq!(fresh.cell(12, 7), Some(Cell::new(0, 1.0, 0.5)));
    assert_ne!(second.snapshot.id, first_doc.snapshot.id);
}

#[test]
fn export_covers_every_step_and_column() {
    let (mut table, bridge) = native_table();
    table.append_section(None).unwrap();
    let document = snapshot::export(&bridge, "grid", None);
    let module = &document.snapshot.source.table;
    assert_eq!(module.table_cells.len(), 32);
    assert!(module.table_cells.iter().all(|row| row.len() == 16));
    assert!(module
        .table_cells
        .iter()
        .flatten()
        .all(|cell| cell.sample_slot == -1));
    assert_eq!(document.snapshot.source.sample_bank.samples.len(), 26);
    assert_eq!(document.snapshot.source.playback.sections_loops_num.len(), 64);
}

#[test]
fn validation_accepts_only_schema_one_with_all_modules() {
    let (_table, bridge) = native_table();
    let json = snapshot::export_json(&bridge, "v", None).unwrap();
    assert!(snapshot::validate_json(&json));

    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["snapshot"]["schema_version"] = serde_json::json!(2);
    assert!(!snapshot::validate_json(&value.to_string()));

    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["snapshot"]["source"]
        .as_object_mut()
        .unwrap()
        .remove("sample_bank");
    assert!(!snapshot::validate_json(&value.to_string()));

    assert!(!snapshot::validate_json("{\"snapshot\": 3"));
}
