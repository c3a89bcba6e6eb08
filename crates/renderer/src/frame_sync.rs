//! Frame synchronization.
//!
//! Implements the acquire -> record -> submit -> present protocol with
//! [`MAX_FRAMES_IN_FLIGHT`] frame slots.
//!
//! Two separately sized collections carry the synchronization state, keyed
//! by different indices:
//!
//! - per **frame slot** (slot index): command buffer, acquire semaphore,
//!   in-flight fence. The fence wait in [`FrameSync::begin_frame`] bounds
//!   how far the CPU runs ahead.
//! - per **swap image** (image index): render-finished semaphore, plus a
//!   busy marker naming the slot whose fence last claimed the image.
//!
//! Present must wait on a primitive tied to the *image*, while slot reuse
//! is gated by a fence tied to the *slot*. Folding the two collections
//! into one breaks whenever the slot count differs from the image count:
//! either images are reused before their previous frame finished, or a
//! present waits on a semaphore no submission will signal.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use mirage_rhi::RhiResult;
use mirage_rhi::command::{CommandBuffer, CommandPool};
use mirage_rhi::device::Device;
use mirage_rhi::swapchain::Swapchain;
use mirage_rhi::sync::{Fence, Semaphore};

use crate::MAX_FRAMES_IN_FLIGHT;

/// One reusable recording context.
pub struct FrameSlot {
    /// Command buffer re-recorded each time the slot comes around.
    command_buffer: CommandBuffer,
    /// Signaled when the acquired image is actually available.
    acquire_semaphore: Semaphore,
    /// Signaled when this slot's submission finishes on the GPU.
    in_flight_fence: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(device.clone(), pool)?;
        let acquire_semaphore = Semaphore::new(device.clone())?;
        // Signaled so the first wait on this slot does not block.
        let in_flight_fence = Fence::new(device, true)?;

        Ok(Self {
            command_buffer,
            acquire_semaphore,
            in_flight_fence,
        })
    }

    /// The slot's command buffer.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }
}

/// Which frame slot last claimed each swap image.
///
/// Pure bookkeeping, factored out so the write-after-write protection is
/// testable: before a swap image is written again, the fence of the slot
/// recorded here must have been observed signaled.
#[derive(Debug, Default)]
pub struct BusyMarkers {
    markers: Vec<Option<usize>>,
}

impl BusyMarkers {
    /// Markers for `image_count` images, all clear.
    pub fn new(image_count: usize) -> Self {
        Self {
            markers: vec![None; image_count],
        }
    }

    /// Claims `image` for `slot`, returning the slot that previously held
    /// the image (whose fence must be waited on) if any.
    pub fn claim(&mut self, image: usize, slot: usize) -> Option<usize> {
        let previous = self.markers[image];
        self.markers[image] = Some(slot);
        previous
    }

    /// Resets to `image_count` clear markers. Called on surface
    /// recreation, when the image count may change.
    pub fn reset(&mut self, image_count: usize) {
        self.markers.clear();
        self.markers.resize(image_count, None);
    }

    /// Number of tracked images.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether no images are tracked.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Result of [`FrameSync::begin_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` requests recovery after present.
    Acquired {
        /// Index of the acquired swap image.
        image_index: u32,
        /// The surface still works but no longer matches the window.
        suboptimal: bool,
    },
    /// The surface is stale; abort this frame and run recovery. Nothing
    /// was submitted and the slot's fence is still signaled.
    OutOfDate,
}

/// Frame synchronization controller.
///
/// Not thread-safe; the single render thread drives it.
pub struct FrameSync {
    device: Arc<Device>,
    slots: Vec<FrameSlot>,
    /// Per swap image, signaled by the submission that wrote the image.
    render_finished: Vec<Semaphore>,
    /// Per swap image, the claiming slot.
    busy: BusyMarkers,
    current_slot: usize,
    image_index: u32,
}

impl FrameSync {
    /// Creates slots and per-image primitives for `image_count` images.
    ///
    /// # Errors
    ///
    /// Synchronization-object creation failures are fatal.
    pub fn new(device: Arc<Device>, pool: &CommandPool, image_count: usize) -> RhiResult<Self> {
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for i in 0..MAX_FRAMES_IN_FLIGHT {
            slots.push(FrameSlot::new(device.clone(), pool)?);
            debug!("Created frame slot {}", i);
        }

        let render_finished = Self::create_render_finished(&device, image_count)?;

        info!(
            "Frame sync ready: {} slots, {} swap images",
            MAX_FRAMES_IN_FLIGHT, image_count
        );

        Ok(Self {
            device,
            slots,
            render_finished,
            busy: BusyMarkers::new(image_count),
            current_slot: 0,
            image_index: 0,
        })
    }

    fn create_render_finished(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Semaphore>> {
        (0..count).map(|_| Semaphore::new(device.clone())).collect()
    }

    /// Index of the active frame slot.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Image index acquired by the last `begin_frame`.
    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// The active slot's command buffer.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        self.slots[self.current_slot].command_buffer()
    }

    /// Begins a frame on the current slot.
    ///
    /// Blocks until the slot's previous submission completed, acquires the
    /// next swap image, gates on the image's previous user, and only then
    /// resets the slot fence. The fence must not be reset earlier: on the
    /// out-of-date path no submission will re-signal it, and the busy-wait
    /// above may still be observing it.
    ///
    /// # Errors
    ///
    /// Propagates non-recoverable acquire failures.
    pub fn begin_frame(&mut self, swapchain: &Swapchain) -> RhiResult<AcquireOutcome> {
        let slot = &self.slots[self.current_slot];

        slot.in_flight_fence.wait(u64::MAX)?;

        let (image_index, suboptimal) =
            match swapchain.acquire_next_image(slot.acquire_semaphore.handle()) {
                Ok(result) => result,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("Surface out of date during acquire");
                    return Ok(AcquireOutcome::OutOfDate);
                }
                Err(e) => return Err(e.into()),
            };

        // An older, slower frame may still be rendering into this image
        // when more slots than images exist. Wait out its fence first.
        if let Some(previous_slot) = self.busy.claim(image_index as usize, self.current_slot)
            && previous_slot != self.current_slot
        {
            self.slots[previous_slot].in_flight_fence.wait(u64::MAX)?;
        }

        self.slots[self.current_slot].in_flight_fence.reset()?;
        self.image_index = image_index;

        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        })
    }

    /// Submits the recorded command buffer on the graphics queue.
    ///
    /// Waits on the slot's acquire semaphore at the color-output stage and
    /// signals the acquired image's render-finished semaphore plus the
    /// slot's fence.
    ///
    /// # Errors
    ///
    /// Returns an error if queue submission fails.
    pub fn submit(&self) -> RhiResult<()> {
        let slot = &self.slots[self.current_slot];

        let wait_semaphores = [slot.acquire_semaphore.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[self.image_index as usize].handle()];
        let command_buffers = [slot.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                slot.in_flight_fence.handle(),
            )?;
        }

        Ok(())
    }

    /// Presents the acquired image, waiting on its render-finished
    /// semaphore.
    ///
    /// Returns whether recovery should run (out-of-date or suboptimal);
    /// recovery after present keeps the already-rendered frame.
    ///
    /// # Errors
    ///
    /// Propagates non-recoverable present failures.
    pub fn present(&self, swapchain: &Swapchain) -> RhiResult<bool> {
        let render_finished = &self.render_finished[self.image_index as usize];

        match swapchain.present(
            self.device.present_queue(),
            self.image_index,
            render_finished.handle(),
        ) {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Surface out of date during present");
                Ok(true)
            }
            Err(vk::Result::SUBOPTIMAL_KHR) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Advances to the next frame slot, strict round-robin.
    pub fn advance(&mut self) {
        self.current_slot = (self.current_slot + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Rebuilds the per-image collections for a recreated surface.
    ///
    /// The new image count may differ from the old one. Only legal after a
    /// full device idle: the old semaphores may otherwise still be
    /// referenced by an in-flight present.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn rebuild_per_image(&mut self, image_count: usize) -> RhiResult<()> {
        self.render_finished = Self::create_render_finished(&self.device, image_count)?;
        self.busy.reset(image_count);

        debug!("Rebuilt per-image sync for {} images", image_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_markers_track_previous_claimer() {
        let mut markers = BusyMarkers::new(3);

        // First claim: nobody to wait for.
        assert_eq!(markers.claim(0, 0), None);
        // Second claim of the same image by another slot returns the
        // previous claimer, whose fence gates the write.
        assert_eq!(markers.claim(0, 1), Some(0));
        // And the marker now names the new claimer.
        assert_eq!(markers.claim(0, 0), Some(1));
    }

    #[test]
    fn test_busy_markers_are_per_image() {
        let mut markers = BusyMarkers::new(2);
        assert_eq!(markers.claim(0, 0), None);
        assert_eq!(markers.claim(1, 1), None);
        assert_eq!(markers.claim(0, 1), Some(0));
    }

    #[test]
    fn test_busy_markers_reset_resizes_and_clears() {
        let mut markers = BusyMarkers::new(2);
        markers.claim(0, 0);
        markers.claim(1, 1);

        markers.reset(4);
        assert_eq!(markers.len(), 4);
        for image in 0..4 {
            assert_eq!(markers.claim(image, 0), None);
        }
    }

    #[test]
    fn test_slot_round_robin_order() {
        let mut current = 0usize;
        let mut seen = Vec::new();
        for _ in 0..(MAX_FRAMES_IN_FLIGHT * 3) {
            seen.push(current);
            current = (current + 1) % MAX_FRAMES_IN_FLIGHT;
        }

        // Strict cycle: every window of MAX_FRAMES_IN_FLIGHT covers each
        // slot exactly once, no skips, no repeats.
        for window in seen.chunks(MAX_FRAMES_IN_FLIGHT) {
            let mut sorted = window.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..MAX_FRAMES_IN_FLIGHT).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_max_frames_in_flight_is_bounded() {
        assert!(MAX_FRAMES_IN_FLIGHT >= 1);
        assert!(MAX_FRAMES_IN_FLIGHT <= 4);
    }
}
