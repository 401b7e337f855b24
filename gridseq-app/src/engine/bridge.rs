use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context as AnyhowContext, Result};

use gridseq_bridge::layout::{BlockPayload, PlaybackState, SampleBankState, TableState};
use gridseq_bridge::reader::{ReadStatus, SeqRead};
use gridseq_bridge::{RegionReaders, SharedRegion};

const FALLBACK_LOG_INTERVAL_MS: u64 = 1000;

#[derive(Default)]
struct ReadCounters {
    reads: AtomicU64,
    retries: AtomicU64,
    fallbacks: AtomicU64,
    fallback_log_ms: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeCounters {
    pub reads: u64,
    /// Attempts beyond the first, i.e. reads that hit an open write or a torn copy.
    pub retries: u64,
    pub fallbacks: u64,
}

/// Client-side view of the engine's shared region.
///
/// Every read is bounded; a read that exhausts its tries returns the block's
/// fallback, bumps a counter and logs at most once a second.
#[derive(Clone)]
pub struct EngineBridge {
    region: Arc<SharedRegion>,
    readers: RegionReaders,
    counters: Arc<ReadCounters>,
}

impl EngineBridge {
    pub fn new(region: &Arc<SharedRegion>) -> Self {
        Self {
            region: region.clone(),
            readers: region.readers(),
            counters: Arc::new(ReadCounters::default()),
        }
    }

    /// Attaches to a region file published by an engine in another process.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let region = SharedRegion::open_file(path)
            .with_context(|| format!("failed to attach to region {}", path.display()))?;
        log::info!("attached to engine region {}", path.display());
        Ok(Self::new(&region))
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.readers = self.readers.with_max_tries(max_tries);
        self
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn playback(&self) -> SeqRead<PlaybackState> {
        let read = self.readers.playback.read();
        self.record::<PlaybackState>(ReadStatus {
            ok: read.ok,
            attempts: read.attempts,
        });
        read
    }

    pub fn sample_bank(&self) -> SeqRead<SampleBankState> {
        let read = self.readers.sample_bank.read();
        self.record::<SampleBankState>(ReadStatus {
            ok: read.ok,
            attempts: read.attempts,
        });
        read
    }

    pub fn table(&self) -> SeqRead<Box<TableState>> {
        let read = self.readers.table.read_boxed();
        self.record::<TableState>(ReadStatus {
            ok: read.ok,
            attempts: read.attempts,
        });
        read
    }

    pub fn counters(&self) -> BridgeCounters {
        BridgeCounters {
            reads: self.counters.reads.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
        }
    }

    pub fn reset_counters(&self) {
        self.counters.reads.store(0, Ordering::Relaxed);
        self.counters.retries.store(0, Ordering::Relaxed);
        self.counters.fallbacks.store(0, Ordering::Relaxed);
        self.counters.fallback_log_ms.store(0, Ordering::Relaxed);
    }

    fn record<P: BlockPayload>(&self, status: ReadStatus) {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        self.counters
            .retries
            .fetch_add(status.attempts.saturating_sub(1) as u64, Ordering::Relaxed);
        if status.ok {
            return;
        }
        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        self.log_fallback(P::NAME);
    }

    fn log_fallback(&self, block: &str) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let last = self.counters.fallback_log_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) >= FALLBACK_LOG_INTERVAL_MS {
            self.counters.fallback_log_ms.store(now_ms, Ordering::Relaxed);
            let counters = self.counters();
            log::warn!(
                "{} read fell back to defaults (reads {}, retries {}, fallbacks {})",
                block,
                counters.reads,
                counters.retries,
                counters.fallbacks
            );
        }
    }
}
