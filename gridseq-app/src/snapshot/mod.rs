//! JSON export and import of the full sequencer state.
//!
//! Export reads the engine through the shared region; import replays a
//! document through the table sync engine in a fixed step order.

pub mod codec;
pub mod error;
pub mod library;
pub mod meta;
pub mod schema;

pub use codec::{
    check_document, export, export_json, import, import_from_json, import_snapshot,
    parse_document, slot_letter, validate_json, ImportReport, APP_VERSION,
};
pub use error::{ImportError, ImportErrorKind, ImportStep};
pub use library::{DirSampleLibrary, SampleLibrary, MANIFEST_FILE};
pub use meta::{new_snapshot_id, now_rfc3339, rfc3339, snapshot_id_at};
pub use schema::{SnapshotDocument, SCHEMA_VERSION};
