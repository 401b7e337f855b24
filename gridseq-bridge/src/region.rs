use std::fs::{File, OpenOptions};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{BridgeError, Result};
use crate::layout::{
    BlockPayload, PlaybackState, RegionHeader, RegionLayout, SampleBankState, TableState,
    LAYOUT_VERSION, REGION_MAGIC,
};
use crate::reader::SeqlockReader;
use crate::writer::SeqlockWriter;

enum Backing {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

impl Backing {
    fn as_ptr(&self) -> *const u8 {
        match self {
            Backing::Writable(map) => map.as_ptr(),
            Backing::ReadOnly(map) => map.as_ptr(),
        }
    }
}

/// Memory holding the playback, sample-bank and table blocks.
///
/// Allocated once at engine init and unmapped when the last handle drops.
pub struct SharedRegion {
    backing: Backing,
    path: Option<PathBuf>,
    writers_claimed: AtomicBool,
}

pub struct RegionWriters {
    pub playback: SeqlockWriter<PlaybackState>,
    pub sample_bank: SeqlockWriter<SampleBankState>,
    pub table: SeqlockWriter<TableState>,
}

#[derive(Clone)]
pub struct RegionReaders {
    pub playback: SeqlockReader<PlaybackState>,
    pub sample_bank: SeqlockReader<SampleBankState>,
    pub table: SeqlockReader<TableState>,
}

impl RegionReaders {
    pub fn with_max_tries(self, max_tries: u32) -> Self {
        Self {
            playback: self.playback.with_max_tries(max_tries),
            sample_bank: self.sample_bank.with_max_tries(max_tries),
            table: self.table.with_max_tries(max_tries),
        }
    }
}

impl SharedRegion {
    pub const SIZE: usize = size_of::<RegionLayout>();

    /// Process-private region; what tests inject in place of the engine's block.
    pub fn anonymous() -> Result<Arc<Self>> {
        let mut map = MmapMut::map_anon(Self::SIZE)?;
        initialize(&mut map);
        Ok(Arc::new(Self {
            backing: Backing::Writable(map),
            path: None,
            writers_claimed: AtomicBool::new(false),
        }))
    }

    /// File-backed region created by the engine so other processes can attach.
    pub fn create_file(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(Self::SIZE as u64)?;
        let mut map = unsafe { MmapOptions::new().len(Self::SIZE).map_mut(&file)? };
        initialize(&mut map);
        log::info!("shared region created at {} ({} bytes)", path.display(), Self::SIZE);
        Ok(Arc::new(Self {
            backing: Backing::Writable(map),
            path: Some(path.to_path_buf()),
            writers_claimed: AtomicBool::new(false),
        }))
    }

    /// Read-only attach to a region another process created.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size < Self::SIZE as u64 {
            return Err(BridgeError::RegionTooSmall {
                expected: Self::SIZE,
                got: size,
            });
        }
        let map = unsafe { MmapOptions::new().len(Self::SIZE).map(&file)? };
        let header = unsafe { &*(map.as_ptr() as *const RegionHeader) };
        if header.magic != REGION_MAGIC {
            return Err(BridgeError::BadMagic {
                found: header.magic,
            });
        }
        if header.layout_version != LAYOUT_VERSION {
            return Err(BridgeError::LayoutVersionMismatch {
                expected: LAYOUT_VERSION,
                got: header.layout_version,
            });
        }
        // Writers are never handed out for a read-only mapping.
        Ok(Arc::new(Self {
            backing: Backing::ReadOnly(map),
            path: Some(path.to_path_buf()),
            writers_claimed: AtomicBool::new(true),
        }))
    }

    pub fn layout(&self) -> &RegionLayout {
        unsafe { &*(self.backing.as_ptr() as *const RegionLayout) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.backing, Backing::Writable(_))
    }

    /// Hands out the writers once; later calls (and read-only regions) get `None`.
    pub fn claim_writers(self: &Arc<Self>) -> Option<RegionWriters> {
        if self.writers_claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(RegionWriters {
            playback: SeqlockWriter::new(self.clone()),
            sample_bank: SeqlockWriter::new(self.clone()),
            table: SeqlockWriter::new(self.clone()),
        })
    }

    pub fn readers(self: &Arc<Self>) -> RegionReaders {
        RegionReaders {
            playback: SeqlockReader::new(self.clone()),
            sample_bank: SeqlockReader::new(self.clone()),
            table: SeqlockReader::new(self.clone()),
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let Backing::Writable(map) = &self.backing {
            map.flush()?;
        }
        Ok(())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        match &self.path {
            Some(path) => log::debug!("shared region at {} unmapped", path.display()),
            None => log::debug!("anonymous shared region unmapped"),
        }
    }
}

fn initialize(map: &mut MmapMut) {
    let layout = unsafe { &mut *(map.as_mut_ptr() as *mut RegionLayout) };
    layout.header = RegionHeader::new();
    layout.playback.version = AtomicU32::new(0);
    layout.sample_bank.version = AtomicU32::new(0);
    layout.table.version = AtomicU32::new(0);
    PlaybackState::write_initial(layout.playback.payload.get_mut());
    SampleBankState::write_initial(layout.sample_bank.payload.get_mut());
    TableState::write_initial(layout.table.payload.get_mut());
}
