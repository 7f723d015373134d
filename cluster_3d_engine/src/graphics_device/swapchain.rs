/// Swapchain trait - for window presentation

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Texture, TextureFormat, SemaphoreHandle};

/// Outcome of an image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image acquired, the semaphore will be signaled
    Acquired(u32),
    /// Image acquired but the surface no longer matches exactly;
    /// the semaphore will still be signaled
    Suboptimal(u32),
    /// Surface changed, nothing acquired, the semaphore is untouched
    OutOfDate,
}

/// Outcome of a present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Swapchain for presenting rendered images to a window
pub trait Swapchain: Send + Sync {
    /// Acquire the next image, signaling `signal` when it becomes available
    fn acquire_next_image(&mut self, signal: SemaphoreHandle) -> Result<AcquireResult>;

    /// Queue the image for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<PresentResult>;

    /// Recreate the swapchain (e.g., after window resize or a vsync toggle)
    ///
    /// Waits for the device to go idle first. Image handles obtained before
    /// the call are invalid afterwards.
    fn recreate(&mut self, width: u32, height: u32, vsync: bool) -> Result<()>;

    /// Swapchain image as a color attachment texture
    fn image(&self, index: u32) -> Option<Arc<dyn Texture>>;

    /// Get the number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Current extent (width, height) in pixels
    fn extent(&self) -> (u32, u32);

    /// Get the pixel format of the swapchain images
    fn format(&self) -> TextureFormat;

    /// True when presenting with FIFO
    fn vsync(&self) -> bool;
}
