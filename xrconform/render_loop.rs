/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Frame loops: `RenderLoop` drives a per-frame callback, `FrameIterator`
//! steps a bare session through its states by submitting minimal frames.

use crate::error::RuntimeResultExt;
use crate::stopwatch::CountdownTimer;
use crate::ConformanceOptions;
use crate::HarnessError;
use crate::Result;

use xrconform_api::CompositionLayer;
use xrconform_api::CompositionLayerFlags;
use xrconform_api::CompositionLayerProjection;
use xrconform_api::EnvironmentBlendMode;
use xrconform_api::Event;
use xrconform_api::FrameEndInfo;
use xrconform_api::FrameState;
use xrconform_api::ProjectionView;
use xrconform_api::ReferenceSpaceType;
use xrconform_api::RuntimeAPI;
use xrconform_api::SessionState;
use xrconform_api::SpaceId;
use xrconform_api::SwapchainCreateInfo;
use xrconform_api::SwapchainId;
use xrconform_api::SwapchainSubImage;
use xrconform_api::Time;
use xrconform_api::View;
use xrconform_api::ViewConfigurationType;

use euclid::RigidTransform3D;

use log::debug;
use log::error;
use log::warn;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Waits for and begins frames, handing each frame state to `end_frame`
/// until it returns `false`. `end_frame` must end the frame it was given.
pub struct RenderLoop<F> {
    runtime: Arc<dyn RuntimeAPI>,
    end_frame: F,
    last_predicted_display_time: Arc<AtomicI64>,
}

impl<F> RenderLoop<F>
where
    F: FnMut(&FrameState) -> Result<bool>,
{
    pub fn new(runtime: Arc<dyn RuntimeAPI>, end_frame: F) -> RenderLoop<F> {
        RenderLoop {
            runtime,
            end_frame,
            last_predicted_display_time: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Runs one frame. Returns whether the loop should continue.
    pub fn iterate_frame(&mut self) -> Result<bool> {
        let frame_state = self.runtime.wait_frame().call("xrWaitFrame")?;
        self.last_predicted_display_time
            .store(frame_state.predicted_display_time.as_nanos(), Ordering::SeqCst);
        self.runtime.begin_frame().call("xrBeginFrame")?;
        (self.end_frame)(&frame_state)
    }

    pub fn run(&mut self) -> Result<()> {
        while self.iterate_frame()? {}
        Ok(())
    }

    pub fn last_predicted_display_time(&self) -> Time {
        Time::from_nanos(self.last_predicted_display_time.load(Ordering::SeqCst))
    }
}

impl<F> RenderLoop<F>
where
    F: FnMut(&FrameState) -> Result<bool> + Send + 'static,
{
    /// Moves the loop onto its own thread.
    pub fn spawn(mut self) -> RenderLoopThread {
        let running = Arc::new(AtomicBool::new(true));
        let last_predicted_display_time = self.last_predicted_display_time.clone();
        let keep_running = running.clone();
        let handle = thread::spawn(move || -> Result<()> {
            while keep_running.load(Ordering::SeqCst) {
                if !self.iterate_frame()? {
                    break;
                }
            }
            Ok(())
        });
        RenderLoopThread {
            running,
            last_predicted_display_time,
            handle: Some(handle),
        }
    }
}

/// A `RenderLoop` running on another thread. Dropping it stops the loop
/// after the current frame and joins the thread.
pub struct RenderLoopThread {
    running: Arc<AtomicBool>,
    last_predicted_display_time: Arc<AtomicI64>,
    handle: Option<thread::JoinHandle<Result<()>>>,
}

impl RenderLoopThread {
    pub fn last_predicted_display_time(&self) -> Time {
        Time::from_nanos(self.last_predicted_display_time.load(Ordering::SeqCst))
    }

    /// Asks the loop to stop once the current frame is done.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Waits for the loop to finish on its own, returning how it ended.
    pub fn wait_for_end(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or(Err(HarnessError::ThreadPanicked("render loop"))),
            None => Ok(()),
        }
    }
}

impl Drop for RenderLoopThread {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("render loop failed: {}", e),
                Err(_) => error!("render loop panicked"),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickResult {
    SessionStateUnchanged,
    SessionStateChanged,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunResult {
    Success,
    Timeout,
    Error,
}

/// Owns a local space and one swapchain, and submits a projection layer
/// showing whatever that swapchain holds.
pub struct FrameIterator {
    runtime: Arc<dyn RuntimeAPI>,
    view_configuration: ViewConfigurationType,
    space: SpaceId,
    swapchain: SwapchainId,
    swapchain_info: SwapchainCreateInfo,
    environment_blend_mode: EnvironmentBlendMode,
    image_wait_timeout: Duration,
    session_state: SessionState,
    frame_state: Option<FrameState>,
    views: Vec<View>,
    projection: CompositionLayerProjection,
    countdown: CountdownTimer,
    last_error: Option<HarnessError>,
}

impl FrameIterator {
    pub fn new(runtime: Arc<dyn RuntimeAPI>, options: &ConformanceOptions) -> Result<FrameIterator> {
        let view_configuration = options.view_configuration;
        let views = runtime
            .view_configuration_views(view_configuration)
            .call("xrEnumerateViewConfigurationViews")?;
        let environment_blend_mode = runtime
            .environment_blend_modes(view_configuration)
            .call("xrEnumerateEnvironmentBlendModes")?
            .first()
            .copied()
            .ok_or(HarnessError::UnexpectedResult {
                call: "xrEnumerateEnvironmentBlendModes",
                expected: "at least one blend mode".into(),
                actual: "none".into(),
            })?;
        let format = runtime
            .swapchain_formats()
            .call("xrEnumerateSwapchainFormats")?
            .first()
            .copied()
            .ok_or(HarnessError::UnexpectedResult {
                call: "xrEnumerateSwapchainFormats",
                expected: "at least one format".into(),
                actual: "none".into(),
            })?;
        let (width, height) = views.first().map_or((64, 64), |view| {
            (view.recommended_image_rect_width, view.recommended_image_rect_height)
        });
        let swapchain_info = SwapchainCreateInfo::color(format, width, height);
        let space = runtime
            .create_reference_space(ReferenceSpaceType::Local, RigidTransform3D::identity())
            .call("xrCreateReferenceSpace")?;
        let swapchain = match runtime.create_swapchain(&swapchain_info) {
            Ok(swapchain) => swapchain,
            Err(source) => {
                if let Err(e) = runtime.destroy_space(space) {
                    warn!("failed to destroy {:?}: {}", space, e);
                }
                return Err(HarnessError::Runtime {
                    call: "xrCreateSwapchain",
                    source,
                });
            }
        };
        Ok(FrameIterator {
            runtime,
            view_configuration,
            space,
            swapchain,
            swapchain_info,
            environment_blend_mode,
            image_wait_timeout: Duration::from_secs(2),
            session_state: SessionState::Unknown,
            frame_state: None,
            views: Vec::new(),
            projection: CompositionLayerProjection {
                layer_flags: CompositionLayerFlags::empty(),
                space,
                views: Vec::new(),
            },
            countdown: CountdownTimer::new(Duration::from_secs(0)),
            last_error: None,
        })
    }

    /// The session state as of the last event this iterator polled.
    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn frame_state(&self) -> Option<FrameState> {
        self.frame_state
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// Why the last `RunResult::Error` was returned.
    pub fn take_error(&mut self) -> Option<HarnessError> {
        self.last_error.take()
    }

    fn fail(&mut self, error: HarnessError) -> RunResult {
        warn!("frame iterator: {}", error);
        self.last_error = Some(error);
        RunResult::Error
    }

    pub fn poll_event(&mut self) -> TickResult {
        match self.runtime.poll_event() {
            Some(Event::SessionStateChanged(state)) => {
                debug!("frame iterator saw {:?}", state);
                self.session_state = state;
                TickResult::SessionStateChanged
            }
            Some(_) | None => TickResult::SessionStateUnchanged,
        }
    }

    /// Acquires, waits for and releases the next image of the swapchain.
    pub fn cycle_to_next_swapchain_image(&mut self) -> RunResult {
        if let Err(source) = self.runtime.acquire_swapchain_image(self.swapchain) {
            return self.fail(HarnessError::Runtime {
                call: "xrAcquireSwapchainImage",
                source,
            });
        }
        match self
            .runtime
            .wait_swapchain_image(self.swapchain, self.image_wait_timeout)
        {
            Ok(()) => {}
            Err(xrconform_api::Error::TimeoutExpired) => return RunResult::Timeout,
            Err(source) => {
                return self.fail(HarnessError::Runtime {
                    call: "xrWaitSwapchainImage",
                    source,
                })
            }
        }
        match self.runtime.release_swapchain_image(self.swapchain) {
            Ok(()) => RunResult::Success,
            Err(source) => self.fail(HarnessError::Runtime {
                call: "xrReleaseSwapchainImage",
                source,
            }),
        }
    }

    /// Waits for a frame, locates the views for it, and begins it.
    pub fn wait_and_begin_frame(&mut self) -> RunResult {
        match self.try_wait_and_begin_frame() {
            Ok(()) => RunResult::Success,
            Err(error) => self.fail(error),
        }
    }

    fn try_wait_and_begin_frame(&mut self) -> Result<()> {
        let frame_state = self.runtime.wait_frame().call("xrWaitFrame")?;
        self.frame_state = Some(frame_state);
        let (_, views) = self
            .runtime
            .locate_views(
                self.view_configuration,
                frame_state.predicted_display_time,
                self.space,
            )
            .call("xrLocateViews")?;
        self.views = views;
        self.runtime.begin_frame().call("xrBeginFrame")?;
        Ok(())
    }

    /// Fills the projection layer from the located views. Every view shows
    /// the same swapchain image.
    fn prepare_frame_end_info(&mut self) {
        let sub_image = SwapchainSubImage {
            swapchain: self.swapchain,
            image_rect: self.swapchain_info.full_rect(),
            image_array_index: 0,
        };
        self.projection.views = self
            .views
            .iter()
            .map(|view| ProjectionView {
                pose: view.pose,
                fov: view.fov,
                sub_image: Some(sub_image),
            })
            .collect();
    }

    fn prepare_submit_frame(&mut self) -> RunResult {
        let result = self.wait_and_begin_frame();
        if result != RunResult::Success {
            return result;
        }
        let result = self.cycle_to_next_swapchain_image();
        if result != RunResult::Success {
            return result;
        }
        self.prepare_frame_end_info();
        RunResult::Success
    }

    /// Runs a whole frame, ending it with a single projection layer.
    pub fn submit_frame(&mut self) -> RunResult {
        let result = self.prepare_submit_frame();
        if result != RunResult::Success {
            return result;
        }
        let display_time = match self.frame_state {
            Some(frame_state) => frame_state.predicted_display_time,
            None => return RunResult::Error,
        };
        let layer = CompositionLayer::Projection(self.projection.clone());
        let layers = [Some(&layer)];
        let info = FrameEndInfo::new(display_time, self.environment_blend_mode).with_layers(&layers);
        match self.runtime.end_frame(&info) {
            Ok(()) => RunResult::Success,
            Err(source) => self.fail(HarnessError::Runtime {
                call: "xrEndFrame",
                source,
            }),
        }
    }

    /// Polls events, begins the session on READY and submits frames, until
    /// the session reaches `target`. STOPPING, LOSS_PENDING and EXITING can
    /// only be reached this way when they are the target; otherwise they
    /// count as a timeout.
    pub fn run_to_session_state(&mut self, target: SessionState, timeout: Duration) -> RunResult {
        self.countdown.restart(timeout);
        while !self.countdown.is_time_up() {
            let tick = self.poll_event();
            if self.session_state == target {
                return RunResult::Success;
            }
            match self.session_state {
                SessionState::LossPending | SessionState::Exiting | SessionState::Stopping => {
                    return RunResult::Timeout;
                }
                SessionState::Unknown | SessionState::Idle => thread::yield_now(),
                SessionState::Ready
                | SessionState::Synchronized
                | SessionState::Visible
                | SessionState::Focused => {
                    if self.session_state == SessionState::Ready
                        && tick == TickResult::SessionStateChanged
                    {
                        if let Err(source) = self.runtime.begin_session(self.view_configuration) {
                            return self.fail(HarnessError::Runtime {
                                call: "xrBeginSession",
                                source,
                            });
                        }
                    }
                    // Frames must be submitted for the runtime to promote the
                    // session past READY.
                    if self.submit_frame() == RunResult::Error {
                        return RunResult::Error;
                    }
                }
            }
        }
        RunResult::Timeout
    }
}

impl Drop for FrameIterator {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.destroy_swapchain(self.swapchain) {
            warn!("failed to destroy {:?}: {}", self.swapchain, e);
        }
        if let Err(e) = self.runtime.destroy_space(self.space) {
            warn!("failed to destroy {:?}: {}", self.space, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::headless::HeadlessInit;
    use crate::headless::HeadlessMsg;
    use crate::headless::HeadlessRuntime;

    use xrconform_api::FramePhase;
    use xrconform_api::ViewConfigurationView;

    fn running_runtime() -> Arc<HeadlessRuntime> {
        let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit::default()));
        while runtime.poll_event().is_some() {}
        runtime.begin_session(ViewConfigurationType::PrimaryStereo).unwrap();
        runtime
    }

    #[test]
    fn failed_swapchain_creation_releases_the_space() {
        let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit {
            views: vec![ViewConfigurationView::new(0, 0); 2],
            ..Default::default()
        }));
        match FrameIterator::new(runtime.clone(), &ConformanceOptions::default()) {
            Err(HarnessError::Runtime { call, .. }) => assert_eq!(call, "xrCreateSwapchain"),
            Err(e) => panic!("unexpected {}", e),
            Ok(_) => panic!("created a swapchain with empty images"),
        }
        assert_eq!(runtime.space_count(), 0);
    }

    #[test]
    fn loop_stops_when_the_callback_says_so() {
        let runtime = running_runtime();
        let end_runtime = runtime.clone();
        let mut frames = 0;
        let mut render_loop = RenderLoop::new(runtime.clone(), |frame_state: &FrameState| {
            end_runtime
                .end_frame(&FrameEndInfo::new(
                    frame_state.predicted_display_time,
                    EnvironmentBlendMode::Opaque,
                ))
                .call("xrEndFrame")?;
            frames += 1;
            Ok(frames < 3)
        });
        render_loop.run().unwrap();
        assert!(render_loop.last_predicted_display_time().is_valid());
        drop(render_loop);
        assert_eq!(frames, 3);
        assert_eq!(runtime.submitted_frames(), 3);
    }

    #[test]
    fn callback_errors_end_the_loop() {
        let runtime = running_runtime();
        let mut render_loop = RenderLoop::new(runtime.clone(), |_: &FrameState| Err(HarnessError::UserFailed));
        assert!(matches!(render_loop.run(), Err(HarnessError::UserFailed)));
        assert_eq!(runtime.frame_phase(), FramePhase::Began);
    }

    #[test]
    fn spawned_loop_stops_on_request() {
        let runtime = running_runtime();
        let end_runtime = runtime.clone();
        let render_loop = RenderLoop::new(runtime.clone(), move |frame_state: &FrameState| {
            end_runtime
                .end_frame(&FrameEndInfo::new(
                    frame_state.predicted_display_time,
                    EnvironmentBlendMode::Opaque,
                ))
                .call("xrEndFrame")?;
            Ok(true)
        })
        .spawn();
        while runtime.submitted_frames() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(render_loop.last_predicted_display_time().is_valid());
        render_loop.stop();
        render_loop.wait_for_end().unwrap();
    }

    #[test]
    fn spawned_loop_reports_runtime_failures() {
        let runtime = running_runtime();
        let end_runtime = runtime.clone();
        let render_loop = RenderLoop::new(runtime.clone(), move |frame_state: &FrameState| {
            end_runtime
                .end_frame(&FrameEndInfo::new(
                    frame_state.predicted_display_time,
                    EnvironmentBlendMode::Opaque,
                ))
                .call("xrEndFrame")?;
            Ok(true)
        })
        .spawn();
        runtime.handle_msg(HeadlessMsg::LoseSession);
        match render_loop.wait_for_end() {
            Err(HarnessError::Runtime { source, .. }) => {
                assert_eq!(source, xrconform_api::Error::SessionLost);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn iterator_runs_a_fresh_session_to_focused() {
        let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit::default()));
        let mut iterator = FrameIterator::new(runtime.clone(), &ConformanceOptions::default()).unwrap();
        let result = iterator.run_to_session_state(SessionState::Focused, Duration::from_secs(5));
        assert_eq!(result, RunResult::Success);
        assert_eq!(iterator.session_state(), SessionState::Focused);
        assert!(runtime.submitted_frames() >= 1);
        assert_eq!(iterator.views().len(), 2);
    }

    #[test]
    fn iterator_does_not_pass_through_stopping() {
        let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit::default()));
        let mut iterator = FrameIterator::new(runtime.clone(), &ConformanceOptions::default()).unwrap();
        assert_eq!(
            iterator.run_to_session_state(SessionState::Focused, Duration::from_secs(5)),
            RunResult::Success
        );
        runtime.request_exit_session().unwrap();
        assert_eq!(
            iterator.run_to_session_state(SessionState::Idle, Duration::from_secs(5)),
            RunResult::Timeout
        );
        assert_eq!(iterator.session_state(), SessionState::Stopping);
    }

    #[test]
    fn iterator_surfaces_lost_sessions() {
        let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit::default()));
        let mut iterator = FrameIterator::new(runtime.clone(), &ConformanceOptions::default()).unwrap();
        assert_eq!(
            iterator.run_to_session_state(SessionState::Focused, Duration::from_secs(5)),
            RunResult::Success
        );
        runtime.handle_msg(HeadlessMsg::LoseSession);
        assert_eq!(iterator.submit_frame(), RunResult::Error);
        match iterator.take_error() {
            Some(HarnessError::Runtime { call, .. }) => assert_eq!(call, "xrWaitFrame"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
