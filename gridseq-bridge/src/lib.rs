//! Shared state between the sequencer engine and its UI clients.
//!
//! ```text
//!   engine control thread          shared region           UI / other processes
//!   SeqlockWriter<Playback>   -->  [header        ]  <--   SeqlockReader<Playback>
//!   SeqlockWriter<SampleBank> -->  [v | playback  ]  <--   SeqlockReader<SampleBank>
//!   SeqlockWriter<Table>      -->  [v | samples   ]  <--   SeqlockReader<Table>
//!                                  [v | table     ]
//! ```
//!
//! Each block is a version counter followed by a fixed `#[repr(C)]` payload.
//! Writers never block; readers retry a bounded number of times and then fall
//! back to a documented default instead of waiting on the engine.

pub mod error;
pub mod layout;
pub mod reader;
pub mod region;
pub mod writer;

pub use error::{BridgeError, Result};
pub use layout::{
    BlockPayload, Cell, PlaybackState, RegionLayout, SampleBankState, SampleSlot, Section,
    StackPayload, TableState,
};
pub use reader::{ReadStatus, SeqRead, SeqlockReader, MAX_TRIES};
pub use region::{RegionReaders, RegionWriters, SharedRegion};
pub use writer::{SeqlockWriter, WriteGuard};
