/// Command recorder - per-slot command lists and the one-shot region
///
/// Frame slots record into their own list; uploads go through
/// `record_immediate`, a scoped region that always ends, submits and waits
/// before returning, even when the recording closure fails.

use crate::error::{Error, Result};
use crate::{engine_trace, engine_warn};
use crate::graphics_device::{
    RenderContext, CommandList, FenceHandle, SubmitDesc, WAIT_FOREVER,
};
use crate::frame::{FrameSlot, FRAMES_IN_FLIGHT};

const SOURCE: &str = "cluster3d::CommandRecorder";

pub struct CommandRecorder {
    context: RenderContext,
    frame_lists: Vec<Box<dyn CommandList>>,
    immediate: Box<dyn CommandList>,
    immediate_fence: FenceHandle,
    immediate_submits: u64,
}

impl CommandRecorder {
    pub fn new(context: RenderContext) -> Result<Self> {
        let (frame_lists, immediate, immediate_fence) = {
            let mut device = context.device()?;
            let frame_lists = (0..FRAMES_IN_FLIGHT)
                .map(|_| device.create_command_list())
                .collect::<Result<Vec<_>>>()?;
            let immediate = device.create_command_list()?;
            let immediate_fence = device.create_fence(false)?;
            (frame_lists, immediate, immediate_fence)
        };
        Ok(Self {
            context,
            frame_lists,
            immediate,
            immediate_fence,
            immediate_submits: 0,
        })
    }

    pub fn frame_list(&self, slot: FrameSlot) -> &dyn CommandList {
        self.frame_lists[slot.index()].as_ref()
    }

    pub fn frame_list_mut(&mut self, slot: FrameSlot) -> &mut dyn CommandList {
        self.frame_lists[slot.index()].as_mut()
    }

    /// Reset a slot's list; its previous submission must have completed
    pub fn reset_frame(&mut self, slot: FrameSlot) -> Result<()> {
        self.frame_lists[slot.index()].reset()
    }

    /// One-shot submissions made so far
    pub fn immediate_submits(&self) -> u64 {
        self.immediate_submits
    }

    /// Record, submit and wait for one-shot GPU work
    ///
    /// The list is begun before `record` runs. Whatever `record` returns, the
    /// list is ended, submitted and waited on before this returns, so no
    /// resource referenced by the recording is still in use afterwards.
    /// An error from `record` is returned after that cleanup.
    ///
    /// # Example
    ///
    /// ```ignore
    /// recorder.record_immediate(|cmd| cmd.copy_buffer(staging, destination, size))?;
    /// ```
    pub fn record_immediate<R, F>(&mut self, record: F) -> Result<R>
    where
        F: FnOnce(&mut dyn CommandList) -> Result<R>,
    {
        self.immediate.reset()?;
        self.immediate.begin()?;

        let recorded = record(self.immediate.as_mut());
        if recorded.is_err() {
            engine_warn!(SOURCE, "one-shot recording failed, submitting what was recorded");
        }

        let flushed = self.flush_immediate();
        match (recorded, flushed) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
        }
    }

    fn flush_immediate(&mut self) -> Result<()> {
        if self.immediate.is_recording() {
            self.immediate.end()?;
        }

        let mut device = self.context.device()?;
        let lists: [&dyn CommandList; 1] = [self.immediate.as_ref()];
        device.submit(&SubmitDesc {
            command_lists: &lists,
            wait_semaphores: &[],
            signal_semaphores: &[],
            fence: Some(self.immediate_fence),
        })?;
        self.immediate_submits += 1;

        if !device.wait_for_fence(self.immediate_fence, WAIT_FOREVER)? {
            return Err(Error::BackendError("one-shot submission never completed".to_string()));
        }
        device.reset_fence(self.immediate_fence)?;
        engine_trace!(SOURCE, "one-shot submission {} complete", self.immediate_submits);
        Ok(())
    }
}

impl Drop for CommandRecorder {
    fn drop(&mut self) {
        match self.context.device() {
            Ok(mut device) => device.destroy_fence(self.immediate_fence),
            Err(e) => engine_warn!(SOURCE, "one-shot fence leaked: {}", e),
        }
    }
}

#[cfg(test)]
#[path = "command_recorder_tests.rs"]
mod tests;
