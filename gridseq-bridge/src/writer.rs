//! Single-writer side of the seqlock protocol (engine control thread).

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::layout::{BlockPayload, SeqlockBlock};
use crate::region::SharedRegion;

/// Writer for one block of the shared region.
///
/// Only [`SharedRegion::claim_writers`] constructs writers, and it does so once
/// per region, so there is exactly one writer per block. Writing never blocks,
/// allocates or takes a lock.
pub struct SeqlockWriter<P: BlockPayload> {
    region: Arc<SharedRegion>,
    _payload: PhantomData<fn() -> P>,
}

impl<P: BlockPayload> SeqlockWriter<P> {
    pub(crate) fn new(region: Arc<SharedRegion>) -> Self {
        Self {
            region,
            _payload: PhantomData,
        }
    }

    fn block(&self) -> &SeqlockBlock<P> {
        P::block(self.region.layout())
    }

    pub fn version(&self) -> u32 {
        self.block().version()
    }

    /// Moves the version to odd and hands out the payload for mutation.
    /// Dropping the guard moves the version to the next even value.
    pub fn begin_write(&mut self) -> WriteGuard<'_, P> {
        let block = self.block();
        let previous = block.version.fetch_add(1, Ordering::Release);
        debug_assert!(previous & 1 == 0, "seqlock writer re-entered on {}", P::NAME);
        fence(Ordering::Release);
        WriteGuard { writer: self }
    }

    pub fn update<R>(&mut self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut guard = self.begin_write();
        f(&mut guard)
    }

    /// The payload as last published. Sound because this writer is the only
    /// mutator and it cannot be mid-write while borrowed immutably.
    pub fn payload(&self) -> &P {
        unsafe { &*self.block().payload.get() }
    }
}

pub struct WriteGuard<'a, P: BlockPayload> {
    writer: &'a mut SeqlockWriter<P>,
}

impl<P: BlockPayload> WriteGuard<'_, P> {
    pub fn end_write(self) {}
}

impl<P: BlockPayload> Deref for WriteGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        unsafe { &*self.writer.block().payload.get() }
    }
}

impl<P: BlockPayload> DerefMut for WriteGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        unsafe { &mut *self.writer.block().payload.get() }
    }
}

impl<P: BlockPayload> Drop for WriteGuard<'_, P> {
    fn drop(&mut self) {
        fence(Ordering::Release);
        self.writer.block().version.fetch_add(1, Ordering::Release);
    }
}
