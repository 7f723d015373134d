/// Frame sync manager - per-slot semaphores and fences
///
/// Each frame-in-flight slot owns one acquire semaphore (signaled by the
/// swapchain), one present semaphore (signaled by the frame's submission)
/// and one fence (signaled when the submission completes).

use crate::error::{Error, Result};
use crate::{engine_debug, engine_warn};
use crate::graphics_device::{RenderContext, FenceHandle, SemaphoreHandle, WAIT_FOREVER};

const SOURCE: &str = "cluster3d::FrameSyncManager";

/// Number of frames the CPU may record ahead of the GPU
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Index of a frame-in-flight slot, always `< FRAMES_IN_FLIGHT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameSlot(usize);

impl FrameSlot {
    pub const FIRST: FrameSlot = FrameSlot(0);

    /// Slot for an index, `None` past the last slot
    pub fn new(index: usize) -> Option<Self> {
        (index < FRAMES_IN_FLIGHT).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0
    }

    /// `(current + 1) mod FRAMES_IN_FLIGHT`
    pub fn next(self) -> Self {
        Self((self.0 + 1) % FRAMES_IN_FLIGHT)
    }

    /// Every slot in order
    pub fn all() -> impl Iterator<Item = FrameSlot> {
        (0..FRAMES_IN_FLIGHT).map(FrameSlot)
    }
}

struct SlotSync {
    acquire: SemaphoreHandle,
    present: SemaphoreHandle,
    fence: FenceHandle,
}

pub struct FrameSyncManager {
    context: RenderContext,
    slots: Vec<SlotSync>,
}

impl FrameSyncManager {
    /// Create the sync objects of every slot
    ///
    /// The first slot's fence starts unsignaled, the others signaled: the
    /// loop records slot 0 straight away and waits on the next slot's fence
    /// only after each submission.
    pub fn new(context: RenderContext) -> Result<Self> {
        let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT);
        {
            let mut device = context.device()?;
            for slot in FrameSlot::all() {
                slots.push(SlotSync {
                    acquire: device.create_semaphore()?,
                    present: device.create_semaphore()?,
                    fence: device.create_fence(slot != FrameSlot::FIRST)?,
                });
            }
        }
        engine_debug!(SOURCE, "created sync objects for {} frames in flight", FRAMES_IN_FLIGHT);
        Ok(Self { context, slots })
    }

    pub fn acquire_semaphore(&self, slot: FrameSlot) -> SemaphoreHandle {
        self.slots[slot.index()].acquire
    }

    pub fn present_semaphore(&self, slot: FrameSlot) -> SemaphoreHandle {
        self.slots[slot.index()].present
    }

    pub fn fence(&self, slot: FrameSlot) -> FenceHandle {
        self.slots[slot.index()].fence
    }

    /// Block until the slot's last submission has completed
    pub fn wait(&self, slot: FrameSlot) -> Result<()> {
        let signaled = self.context.device()?.wait_for_fence(self.fence(slot), WAIT_FOREVER)?;
        if !signaled {
            return Err(Error::BackendError(format!(
                "fence of frame slot {} never signaled", slot.index()
            )));
        }
        Ok(())
    }

    /// Return the slot's fence to the unsignaled state before it is submitted again
    pub fn reset(&self, slot: FrameSlot) -> Result<()> {
        self.context.device()?.reset_fence(self.fence(slot))
    }

    /// Swap in a fresh acquire semaphore
    ///
    /// Needed when an image was acquired but the frame was abandoned: the old
    /// semaphore is left signaled with nothing waiting on it. Call after the
    /// swapchain that signaled it has been recreated; `wait_idle` does not
    /// cover a signal still pending in the presentation engine.
    pub fn replace_acquire_semaphore(&mut self, slot: FrameSlot) -> Result<()> {
        let mut device = self.context.device()?;
        device.wait_idle()?;
        let fresh = device.create_semaphore()?;
        let old = std::mem::replace(&mut self.slots[slot.index()].acquire, fresh);
        device.destroy_semaphore(old);
        engine_debug!(SOURCE, "replaced acquire semaphore of slot {}", slot.index());
        Ok(())
    }
}

impl Drop for FrameSyncManager {
    fn drop(&mut self) {
        match self.context.device() {
            Ok(mut device) => {
                for slot in self.slots.drain(..) {
                    device.destroy_semaphore(slot.acquire);
                    device.destroy_semaphore(slot.present);
                    device.destroy_fence(slot.fence);
                }
            }
            Err(e) => engine_warn!(SOURCE, "sync objects leaked: {}", e),
        }
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
