//! Frame loop driver.
//!
//! One [`FrameLoop::run_frame`] call is one iteration of the state machine:
//!
//! ```text
//! drain events -> (Idle while minimized)
//!              -> WaitGuard -> apply latched rebuild -> Acquire
//!              -> Record+Submit -> Present -> finish frame
//! ```
//!
//! Resize is an event, not a state. It is latched when drained and applied
//! at the top of the next iteration, after a device-idle wait, so an
//! in-progress frame is never interrupted and no submission ever references
//! a stale framebuffer.
//!
//! A failed acquire is a skipped frame, not an error. Nothing was submitted,
//! so the next iteration does not wait the guard again; the guard is only
//! waited when the previous iteration actually armed it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use prism_platform::{EventQueue, WindowEvent};
use prism_rhi::device::Device;
use prism_rhi::swapchain::PresentState;
use prism_rhi::sync::Fence;
use prism_rhi::{RhiError, RhiResult};

/// Bounded wait for the in-flight fence (4 seconds).
///
/// Steady-state waits finish in milliseconds; hitting this bound means the
/// GPU is wedged and the condition is fatal.
const GUARD_TIMEOUT_NS: u64 = 4_000_000_000;

/// How long to sleep per iteration while the window is minimized.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Bounds how far the CPU runs ahead of the GPU.
///
/// Wraps the single in-flight fence. The reset-after-wait ordering is the
/// correctness invariant: the fence starts signaled, `wait` observes the
/// previous submission, and `reset` happens only once the loop has committed
/// to submitting again.
pub struct InFlightGuard {
    fence: Fence,
}

impl InFlightGuard {
    /// Creates the guard with its fence signaled so the first wait returns
    /// immediately.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let fence = Fence::new(device, true)?;
        Ok(Self { fence })
    }

    /// Blocks until the last submission completed.
    ///
    /// A wait that exceeds the bound is surfaced as a fatal
    /// [`RhiError::GpuTimeout`], not retried.
    pub fn wait(&self) -> RhiResult<()> {
        self.fence.wait(GUARD_TIMEOUT_NS).map_err(|e| match e {
            RhiError::VulkanError(ash::vk::Result::TIMEOUT) => {
                RhiError::GpuTimeout("In-flight fence wait exceeded bound".to_string())
            }
            other => other,
        })
    }

    /// Resets the fence for the next submission.
    ///
    /// Call only after [`InFlightGuard::wait`] returned and a new submission
    /// is committed; resetting with no submission to follow deadlocks the
    /// next wait.
    pub fn reset(&self) -> RhiResult<()> {
        self.fence.reset()
    }

    /// Fence handle to pass to the queue submission.
    #[inline]
    pub fn fence(&self) -> ash::vk::Fence {
        self.fence.handle()
    }
}

/// What a single loop iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was recorded, submitted, and presented.
    Rendered,
    /// The frame was skipped (failed acquire or degenerate overlay size).
    Skipped,
    /// The window is minimized; no GPU call was made.
    Idle,
    /// A close was requested; the caller should stop the loop.
    Exit,
}

/// GPU-side operations the frame loop drives.
///
/// The production implementation is the Vulkan renderer; tests substitute a
/// recording fake to verify ordering.
pub trait FrameBackend {
    /// Blocks until the previous submission completed.
    fn wait_guard(&mut self) -> RhiResult<()>;

    /// Acquires the next presentable image, or `None` to skip this frame.
    fn acquire_image(&mut self) -> RhiResult<Option<u32>>;

    /// Overlay display size, checked before acquiring an image.
    fn overlay_size(&self) -> (f32, f32);

    /// Resets the guard, records the frame, and submits it.
    ///
    /// Only called after a successful acquire; the submission signals the
    /// image's render-finished semaphore and the guard fence.
    fn record_and_submit(&mut self, image_index: u32) -> RhiResult<()>;

    /// Presents the image, waiting on its render-finished semaphore.
    fn present_image(&mut self, image_index: u32) -> RhiResult<PresentState>;

    /// Waits for device idle and rebuilds swapchain-dependent resources.
    fn rebuild(&mut self, width: u32, height: u32) -> RhiResult<()>;

    /// Per-frame cleanup after present (transient arena reset).
    fn finish_frame(&mut self);
}

/// Drives one frame per call, tracking resize latching and guard state.
pub struct FrameLoop {
    events: EventQueue,
    pending_resize: Option<(u32, u32)>,
    rebuild_needed: bool,
    guard_armed: bool,
    close_requested: bool,
    idle_sleep: Duration,
    frames_rendered: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            events: EventQueue::new(),
            pending_resize: None,
            rebuild_needed: false,
            guard_armed: false,
            close_requested: false,
            idle_sleep: IDLE_SLEEP,
            frames_rendered: 0,
        }
    }

    /// Queue the window callbacks push into; drained once per iteration.
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Total frames presented so far.
    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    #[cfg(test)]
    fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Runs one frame iteration.
    ///
    /// `current_extent` is the window's pixel size this iteration; a zero
    /// dimension means minimized. Recoverable conditions are absorbed here;
    /// any returned error is fatal and should unwind to the process boundary.
    pub fn run_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        current_extent: (u32, u32),
    ) -> RhiResult<FrameOutcome> {
        self.drain_events();

        // Close is honored only between full frame cycles
        if self.close_requested {
            info!("Close requested, exiting frame loop");
            return Ok(FrameOutcome::Exit);
        }

        let (width, height) = current_extent;
        if width == 0 || height == 0 {
            std::thread::sleep(self.idle_sleep);
            return Ok(FrameOutcome::Idle);
        }

        // The previous submission must be fully retired before anything
        // else touches the GPU, a rebuild included.
        if self.guard_armed {
            backend.wait_guard()?;
            self.guard_armed = false;
        }

        // Latched resize (or a suboptimal present) is applied here, before
        // acquire; the guard wait above plus the backend's device-idle wait
        // guarantee nothing in flight references the old resources.
        if self.pending_resize.is_some() || self.rebuild_needed {
            let (w, h) = self.pending_resize.take().unwrap_or((width, height));
            backend.rebuild(w, h)?;
            self.rebuild_needed = false;
        }

        // Checked before acquire: acquiring arms a binary semaphore that
        // only a submission can consume, so a frame that will be skipped
        // must not acquire at all.
        let (overlay_w, overlay_h) = backend.overlay_size();
        if overlay_w <= 0.0 || overlay_h <= 0.0 {
            warn!(
                "Overlay reports degenerate display size {}x{}, skipping frame",
                overlay_w, overlay_h
            );
            return Ok(FrameOutcome::Skipped);
        }

        let image_index = match backend.acquire_image()? {
            Some(index) => index,
            None => {
                debug!("Acquire yielded no image, skipping frame");
                return Ok(FrameOutcome::Skipped);
            }
        };

        backend.record_and_submit(image_index)?;
        self.guard_armed = true;

        if backend.present_image(image_index)? == PresentState::Suboptimal {
            debug!("Present was suboptimal, scheduling rebuild");
            self.rebuild_needed = true;
        }

        backend.finish_frame();
        self.frames_rendered += 1;

        Ok(FrameOutcome::Rendered)
    }

    fn drain_events(&mut self) {
        for event in self.events.drain() {
            match event {
                WindowEvent::Resized { width, height } => {
                    if width > 0 && height > 0 {
                        debug!("Resize latched: {}x{}", width, height);
                        self.pending_resize = Some((width, height));
                    }
                }
                WindowEvent::CloseRequested => {
                    self.close_requested = true;
                }
                WindowEvent::Focused(focused) => {
                    debug!("Window focus changed: {}", focused);
                }
                WindowEvent::ScaleFactorChanged(scale) => {
                    // The compositor sends a pixel resize right after this
                    debug!("Scale factor changed: {}", scale);
                }
            }
        }
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Records every backend call in order so tests can assert on the
    /// protocol, and tracks outstanding submissions to catch rebuilds that
    /// race in-flight work.
    struct FakeBackend {
        ops: Vec<String>,
        acquire_results: VecDeque<Option<u32>>,
        present_results: VecDeque<PresentState>,
        overlay_size: (f32, f32),
        framebuffer_extent: (u32, u32),
        outstanding_submissions: u32,
        rebuilds_with_outstanding_work: u32,
    }

    impl FakeBackend {
        fn new(extent: (u32, u32)) -> Self {
            Self {
                ops: Vec::new(),
                acquire_results: VecDeque::new(),
                present_results: VecDeque::new(),
                overlay_size: (extent.0 as f32, extent.1 as f32),
                framebuffer_extent: extent,
                outstanding_submissions: 0,
                rebuilds_with_outstanding_work: 0,
            }
        }

        fn next_acquire(&mut self) -> Option<u32> {
            self.acquire_results.pop_front().unwrap_or(Some(0))
        }

        fn next_present(&mut self) -> PresentState {
            self.present_results
                .pop_front()
                .unwrap_or(PresentState::Optimal)
        }

        fn gpu_ops(&self) -> Vec<&str> {
            self.ops
                .iter()
                .map(String::as_str)
                .filter(|op| *op != "finish_frame")
                .collect()
        }
    }

    impl FrameBackend for FakeBackend {
        fn wait_guard(&mut self) -> RhiResult<()> {
            self.ops.push("wait_guard".to_string());
            self.outstanding_submissions = 0;
            Ok(())
        }

        fn acquire_image(&mut self) -> RhiResult<Option<u32>> {
            self.ops.push("acquire".to_string());
            Ok(self.next_acquire())
        }

        fn overlay_size(&self) -> (f32, f32) {
            self.overlay_size
        }

        fn record_and_submit(&mut self, image_index: u32) -> RhiResult<()> {
            self.ops.push(format!("submit:{}", image_index));
            self.outstanding_submissions += 1;
            Ok(())
        }

        fn present_image(&mut self, image_index: u32) -> RhiResult<PresentState> {
            self.ops.push(format!("present:{}", image_index));
            Ok(self.next_present())
        }

        fn rebuild(&mut self, width: u32, height: u32) -> RhiResult<()> {
            if self.outstanding_submissions > 0 {
                self.rebuilds_with_outstanding_work += 1;
            }
            // rebuild implies a device-idle wait
            self.outstanding_submissions = 0;
            self.ops.push(format!("rebuild:{}x{}", width, height));
            self.framebuffer_extent = (width, height);
            self.overlay_size = (width as f32, height as f32);
            Ok(())
        }

        fn finish_frame(&mut self) {
            self.ops.push("finish_frame".to_string());
        }
    }

    #[test]
    fn test_steady_state_renders_three_frames() {
        let mut backend = FakeBackend::new((800, 600));
        backend.acquire_results = VecDeque::from([Some(0), Some(1), Some(2)]);
        let mut frame_loop = FrameLoop::new();

        for _ in 0..3 {
            let outcome = frame_loop.run_frame(&mut backend, (800, 600)).unwrap();
            assert_eq!(outcome, FrameOutcome::Rendered);
        }

        assert_eq!(frame_loop.frames_rendered(), 3);
        assert_eq!(backend.framebuffer_extent, (800, 600));
        assert_eq!(
            backend.gpu_ops(),
            vec![
                "acquire",
                "submit:0",
                "present:0",
                "wait_guard",
                "acquire",
                "submit:1",
                "present:1",
                "wait_guard",
                "acquire",
                "submit:2",
                "present:2",
            ]
        );
    }

    #[test]
    fn test_resize_rebuilds_before_next_acquire() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new();

        frame_loop.run_frame(&mut backend, (800, 600)).unwrap();
        frame_loop.run_frame(&mut backend, (800, 600)).unwrap();

        frame_loop.events_mut().push(WindowEvent::Resized {
            width: 1024,
            height: 768,
        });
        let outcome = frame_loop.run_frame(&mut backend, (1024, 768)).unwrap();

        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(backend.framebuffer_extent, (1024, 768));
        // Rebuild implies device idle, so no rebuild ever raced a submission
        assert_eq!(backend.rebuilds_with_outstanding_work, 0);

        // The rebuild must precede frame 3's acquire
        let ops = backend.gpu_ops();
        let rebuild_pos = ops.iter().position(|op| *op == "rebuild:1024x768").unwrap();
        let third_acquire_pos = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| **op == "acquire")
            .map(|(i, _)| i)
            .nth(2)
            .unwrap();
        assert!(rebuild_pos < third_acquire_pos);
    }

    #[test]
    fn test_minimized_window_makes_no_gpu_calls() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new().with_idle_sleep(Duration::ZERO);

        for _ in 0..5 {
            let outcome = frame_loop.run_frame(&mut backend, (0, 0)).unwrap();
            assert_eq!(outcome, FrameOutcome::Idle);
        }
        assert!(backend.ops.is_empty());

        // Loop resumes normally on a positive extent
        let outcome = frame_loop.run_frame(&mut backend, (800, 600)).unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
    }

    #[test]
    fn test_failed_acquire_skips_without_rewaiting_guard() {
        let mut backend = FakeBackend::new((800, 600));
        backend.acquire_results = VecDeque::from([Some(0), None, Some(1)]);
        let mut frame_loop = FrameLoop::new();

        assert_eq!(
            frame_loop.run_frame(&mut backend, (800, 600)).unwrap(),
            FrameOutcome::Rendered
        );
        assert_eq!(
            frame_loop.run_frame(&mut backend, (800, 600)).unwrap(),
            FrameOutcome::Skipped
        );
        assert_eq!(
            frame_loop.run_frame(&mut backend, (800, 600)).unwrap(),
            FrameOutcome::Rendered
        );

        // The skipped frame submitted nothing, so the third iteration must
        // not wait the guard a second time.
        assert_eq!(
            backend.gpu_ops(),
            vec![
                "acquire",
                "submit:0",
                "present:0",
                "wait_guard",
                "acquire",
                "acquire",
                "submit:1",
                "present:1",
            ]
        );
    }

    #[test]
    fn test_repeated_failed_acquires_are_safe() {
        let mut backend = FakeBackend::new((800, 600));
        backend.acquire_results = VecDeque::from([None, None, None]);
        let mut frame_loop = FrameLoop::new();

        for _ in 0..3 {
            assert_eq!(
                frame_loop.run_frame(&mut backend, (800, 600)).unwrap(),
                FrameOutcome::Skipped
            );
        }
        assert_eq!(backend.gpu_ops(), vec!["acquire", "acquire", "acquire"]);
    }

    #[test]
    fn test_degenerate_overlay_size_skips_frame() {
        let mut backend = FakeBackend::new((800, 600));
        backend.overlay_size = (0.0, 600.0);
        let mut frame_loop = FrameLoop::new();

        let outcome = frame_loop.run_frame(&mut backend, (800, 600)).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped);
        // A skipped frame must not acquire either: a consumed acquire with
        // no submission would leave its semaphore signaled forever.
        assert!(backend.ops.is_empty());
    }

    #[test]
    fn test_frame_after_overlay_skip_acquires_normally() {
        let mut backend = FakeBackend::new((800, 600));
        backend.overlay_size = (0.0, 0.0);
        let mut frame_loop = FrameLoop::new();

        assert_eq!(
            frame_loop.run_frame(&mut backend, (800, 600)).unwrap(),
            FrameOutcome::Skipped
        );

        backend.overlay_size = (800.0, 600.0);
        assert_eq!(
            frame_loop.run_frame(&mut backend, (800, 600)).unwrap(),
            FrameOutcome::Rendered
        );
        assert_eq!(backend.gpu_ops(), vec!["acquire", "submit:0", "present:0"]);
    }

    #[test]
    fn test_close_request_exits_without_gpu_calls() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new();

        frame_loop.events_mut().push(WindowEvent::CloseRequested);
        let outcome = frame_loop.run_frame(&mut backend, (800, 600)).unwrap();

        assert_eq!(outcome, FrameOutcome::Exit);
        assert!(backend.ops.is_empty());
    }

    #[test]
    fn test_suboptimal_present_triggers_rebuild_next_frame() {
        let mut backend = FakeBackend::new((800, 600));
        backend.present_results = VecDeque::from([PresentState::Suboptimal]);
        let mut frame_loop = FrameLoop::new();

        frame_loop.run_frame(&mut backend, (800, 600)).unwrap();
        frame_loop.run_frame(&mut backend, (800, 600)).unwrap();

        // The rebuild lands at the top of the second iteration, after the
        // guard wait and before its acquire, using the current window extent.
        let ops = backend.gpu_ops();
        assert_eq!(
            ops,
            vec![
                "acquire",
                "submit:0",
                "present:0",
                "wait_guard",
                "rebuild:800x600",
                "acquire",
                "submit:0",
                "present:0",
            ]
        );
    }

    #[test]
    fn test_rebuild_waits_for_prior_submission() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new();

        frame_loop.run_frame(&mut backend, (800, 600)).unwrap();
        frame_loop.events_mut().push(WindowEvent::Resized {
            width: 640,
            height: 480,
        });
        frame_loop.run_frame(&mut backend, (640, 480)).unwrap();

        assert_eq!(backend.rebuilds_with_outstanding_work, 0);
        let ops = backend.gpu_ops();
        let wait_pos = ops.iter().position(|op| *op == "wait_guard").unwrap();
        let rebuild_pos = ops.iter().position(|op| *op == "rebuild:640x480").unwrap();
        assert!(wait_pos < rebuild_pos);
    }

    #[test]
    fn test_zero_size_resize_events_are_ignored() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new();

        frame_loop.events_mut().push(WindowEvent::Resized {
            width: 0,
            height: 600,
        });
        frame_loop.run_frame(&mut backend, (800, 600)).unwrap();

        assert!(!backend.ops.iter().any(|op| op.starts_with("rebuild")));
    }

    #[test]
    fn test_resize_while_minimized_applies_on_restore() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new().with_idle_sleep(Duration::ZERO);

        frame_loop.events_mut().push(WindowEvent::Resized {
            width: 1280,
            height: 720,
        });
        assert_eq!(
            frame_loop.run_frame(&mut backend, (0, 0)).unwrap(),
            FrameOutcome::Idle
        );

        let outcome = frame_loop.run_frame(&mut backend, (1280, 720)).unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(backend.framebuffer_extent, (1280, 720));
    }

    #[test]
    fn test_latest_resize_wins() {
        let mut backend = FakeBackend::new((800, 600));
        let mut frame_loop = FrameLoop::new();

        frame_loop.events_mut().push(WindowEvent::Resized {
            width: 900,
            height: 700,
        });
        frame_loop.events_mut().push(WindowEvent::Resized {
            width: 1024,
            height: 768,
        });
        frame_loop.run_frame(&mut backend, (1024, 768)).unwrap();

        assert_eq!(backend.framebuffer_extent, (1024, 768));
        assert_eq!(
            backend
                .ops
                .iter()
                .filter(|op| op.starts_with("rebuild"))
                .count(),
            1
        );
    }
}
