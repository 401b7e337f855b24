use std::marker::PhantomData;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::layout::{BlockPayload, SeqlockBlock, StackPayload};
use crate::region::SharedRegion;

/// Read attempts before a reader gives up and returns the fallback payload.
pub const MAX_TRIES: u32 = 3;

/// Outcome of a bounded seqlock read.
#[derive(Clone, Copy, Debug)]
pub struct SeqRead<T> {
    pub value: T,
    /// `false` when every attempt hit a writer and `value` is the fallback.
    pub ok: bool,
    pub attempts: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadStatus {
    pub ok: bool,
    pub attempts: u32,
}

/// Wait-free reader for one block of the shared region.
pub struct SeqlockReader<P: BlockPayload> {
    region: Arc<SharedRegion>,
    max_tries: u32,
    _payload: PhantomData<fn() -> P>,
}

impl<P: BlockPayload> Clone for SeqlockReader<P> {
    fn clone(&self) -> Self {
        Self {
            region: self.region.clone(),
            max_tries: self.max_tries,
            _payload: PhantomData,
        }
    }
}

impl<P: BlockPayload> SeqlockReader<P> {
    pub fn new(region: Arc<SharedRegion>) -> Self {
        Self {
            region,
            max_tries: MAX_TRIES,
            _payload: PhantomData,
        }
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    fn block(&self) -> &SeqlockBlock<P> {
        P::block(self.region.layout())
    }

    pub fn version(&self) -> u32 {
        self.block().version()
    }

    /// First half of a read: the current version, or `None` while a write is open.
    pub fn start_read(&self) -> Option<u32> {
        let v1 = self.block().version.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return None;
        }
        Some(v1)
    }

    /// Copies the payload as it currently sits in memory. The copy may be torn;
    /// it is only meaningful once `validate` accepts the version it started from.
    pub fn copy_payload(&self, out: &mut P) {
        let src = self.block().payload.get() as *const P;
        unsafe {
            std::ptr::copy_nonoverlapping(src, out as *mut P, 1);
        }
    }

    /// Second half of a read: true when no write began since `v1` was loaded.
    pub fn validate(&self, v1: u32) -> bool {
        fence(Ordering::Acquire);
        let v2 = self.block().version.load(Ordering::Relaxed);
        v1 == v2
    }

    /// Bounded-retry read into caller-owned storage.
    ///
    /// Retries on an odd version (writer active) and on a version change across
    /// the copy (torn read). After `max_tries` attempts `out` is overwritten with
    /// the payload's fallback and the status reports `ok == false`.
    pub fn read_into(&self, out: &mut P) -> ReadStatus {
        let mut attempts = 0;
        while attempts < self.max_tries {
            attempts += 1;
            let Some(v1) = self.start_read() else {
                std::hint::spin_loop();
                continue;
            };
            self.copy_payload(out);
            if self.validate(v1) {
                return ReadStatus { ok: true, attempts };
            }
            std::hint::spin_loop();
        }
        P::write_fallback(out);
        ReadStatus {
            ok: false,
            attempts,
        }
    }

    /// Bounded-retry read with the copy on the heap. Works for every block;
    /// the table block can only be read this way.
    pub fn read_boxed(&self) -> SeqRead<Box<P>> {
        let mut value: Box<P> = unsafe { Box::<P>::new_zeroed().assume_init() };
        let status = self.read_into(&mut value);
        SeqRead {
            value,
            ok: status.ok,
            attempts: status.attempts,
        }
    }
}

impl<P: StackPayload> SeqlockReader<P> {
    /// Bounded-retry read returning the copy by value.
    pub fn read(&self) -> SeqRead<P> {
        let mut value: P = unsafe { std::mem::zeroed() };
        let status = self.read_into(&mut value);
        SeqRead {
            value,
            ok: status.ok,
            attempts: status.attempts,
        }
    }
}
