/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! An in-process reference runtime.
//!
//! It throttles `wait_frame` on a vsync grid, walks sessions through their
//! state events, and validates frame submissions the way a conforming runtime
//! must, so the harness can be exercised without a device.

use crate::graphics::software;

use xrconform_api::ActionId;
use xrconform_api::ActionSetId;
use xrconform_api::ActionStateBoolean;
use xrconform_api::ActionType;
use xrconform_api::CompositionLayer;
use xrconform_api::EnvironmentBlendMode;
use xrconform_api::Error;
use xrconform_api::Event;
use xrconform_api::Fov;
use xrconform_api::FrameBegin;
use xrconform_api::FrameEndInfo;
use xrconform_api::FrameLifecycle;
use xrconform_api::FramePhase;
use xrconform_api::FrameState;
use xrconform_api::Pose;
use xrconform_api::Reference;
use xrconform_api::ReferenceSpaceType;
use xrconform_api::RuntimeAPI;
use xrconform_api::SessionState;
use xrconform_api::SpaceId;
use xrconform_api::SuggestedBinding;
use xrconform_api::SwapchainCreateInfo;
use xrconform_api::SwapchainId;
use xrconform_api::Time;
use xrconform_api::View;
use xrconform_api::ViewConfigurationType;
use xrconform_api::ViewConfigurationView;
use xrconform_api::ViewStateFlags;

use crossbeam_channel::Receiver;

use euclid::RigidTransform3D;
use euclid::Rotation3D;
use euclid::Vector3D;

use log::debug;
use log::warn;

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

const IPD: f32 = 0.064;
const STAGE_EYE_HEIGHT: f32 = 1.6;

/// How long a serialized `wait_frame` waits for an open frame to be ended
/// before giving up and throttling anyway.
const SERIALIZED_WAIT_LIMIT: Duration = Duration::from_secs(1);

const DEFAULT_DISPLAY_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / 90);

pub struct HeadlessInit {
    /// Must be nonzero; a zero period falls back to 90 Hz.
    pub display_period: Duration,
    pub blend_modes: Vec<EnvironmentBlendMode>,
    /// Per-view recommendations for the stereo configuration. Mono uses the
    /// first entry.
    pub views: Vec<ViewConfigurationView>,
    pub swapchain_formats: Vec<i64>,
    pub image_count: u32,
    pub max_layers: usize,
    /// Make `wait_frame` block until the previously begun frame is ended,
    /// like a runtime that cannot overlap app and render work.
    pub serialize_frame_calls: bool,
    /// When false, `wait_frame` hands out display slots without sleeping
    /// until they start.
    pub throttle_wait_frame: bool,
    /// Time `begin_frame` spends before it begins the frame.
    pub begin_frame_delay: Duration,
}

impl Default for HeadlessInit {
    fn default() -> Self {
        HeadlessInit {
            display_period: DEFAULT_DISPLAY_PERIOD,
            blend_modes: vec![EnvironmentBlendMode::Opaque],
            views: vec![ViewConfigurationView::new(512, 512); 2],
            swapchain_formats: vec![
                software::RGBA8,
                software::SRGB8_ALPHA8,
                software::DEPTH_COMPONENT32F,
            ],
            image_count: 3,
            max_layers: 16,
            serialize_frame_calls: false,
            throttle_wait_frame: true,
            begin_frame_delay: Duration::from_secs(0),
        }
    }
}

/// Simulated input and failures, applied with `HeadlessRuntime::handle_msg`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeadlessMsg {
    PressSelect,
    ReleaseSelect,
    PressMenu,
    ReleaseMenu,
    /// Acquired swapchain images never become ready, so image waits time out.
    StallSwapchainImages(bool),
    LoseSession,
    /// Ends a message loop started with `spawn_message_loop`.
    Quit,
}

/// What the runtime saw of a successful end-frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmittedFrame {
    pub display_time: Time,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub layers: Vec<CompositionLayer>,
}

struct HeadlessSwapchain {
    info: SwapchainCreateInfo,
    image_count: u32,
    next_image: u32,
    /// Acquired images in acquire order, with whether they were waited on.
    acquired: VecDeque<(u32, bool)>,
    ever_acquired: bool,
    ever_released: bool,
}

struct HeadlessAction {
    set: ActionSetId,
    kind: ActionType,
    bindings: Vec<String>,
    state: ActionStateBoolean,
}

struct HeadlessData {
    lifecycle: FrameLifecycle,
    state: SessionState,
    view_configuration: Option<ViewConfigurationType>,
    lost: bool,
    events: VecDeque<Event>,
    /// Grid index of the last predicted display time handed out.
    last_display_index: u64,
    spaces: HashMap<SpaceId, (ReferenceSpaceType, Pose)>,
    swapchains: HashMap<SwapchainId, HeadlessSwapchain>,
    next_id: u64,
    action_sets: HashMap<ActionSetId, String>,
    actions: HashMap<ActionId, HeadlessAction>,
    attached: Option<Vec<ActionSetId>>,
    select_pressed: bool,
    menu_pressed: bool,
    stall_images: bool,
    submitted_frames: u64,
    last_frame: Option<SubmittedFrame>,
}

pub struct HeadlessRuntime {
    data: Mutex<HeadlessData>,
    frame_progress: Condvar,
    origin_ns: u64,
    display_period: Duration,
    blend_modes: Vec<EnvironmentBlendMode>,
    views: Vec<ViewConfigurationView>,
    swapchain_formats: Vec<i64>,
    image_count: u32,
    serialize_frame_calls: bool,
    throttle_wait_frame: bool,
    begin_frame_delay: Duration,
}

impl HeadlessRuntime {
    /// Creates a runtime whose session has already been created, so the
    /// IDLE and READY events are waiting to be polled.
    pub fn new(init: HeadlessInit) -> HeadlessRuntime {
        let display_period = if init.display_period == Duration::from_secs(0) {
            warn!("headless display period is zero, using {:?}", DEFAULT_DISPLAY_PERIOD);
            DEFAULT_DISPLAY_PERIOD
        } else {
            init.display_period
        };
        let mut data = HeadlessData {
            lifecycle: FrameLifecycle::new(init.blend_modes.clone(), init.max_layers),
            state: SessionState::Unknown,
            view_configuration: None,
            lost: false,
            events: VecDeque::new(),
            last_display_index: 0,
            spaces: HashMap::new(),
            swapchains: HashMap::new(),
            next_id: 1,
            action_sets: HashMap::new(),
            actions: HashMap::new(),
            attached: None,
            select_pressed: false,
            menu_pressed: false,
            stall_images: false,
            submitted_frames: 0,
            last_frame: None,
        };
        data.transition(SessionState::Idle);
        data.transition(SessionState::Ready);
        HeadlessRuntime {
            data: Mutex::new(data),
            frame_progress: Condvar::new(),
            origin_ns: time::precise_time_ns(),
            display_period,
            blend_modes: init.blend_modes,
            views: init.views,
            swapchain_formats: init.swapchain_formats,
            image_count: init.image_count,
            serialize_frame_calls: init.serialize_frame_calls,
            throttle_wait_frame: init.throttle_wait_frame,
            begin_frame_delay: init.begin_frame_delay,
        }
    }

    pub fn handle_msg(&self, msg: HeadlessMsg) -> bool {
        let mut data = self.data.lock().unwrap();
        match msg {
            HeadlessMsg::PressSelect => data.select_pressed = true,
            HeadlessMsg::ReleaseSelect => data.select_pressed = false,
            HeadlessMsg::PressMenu => data.menu_pressed = true,
            HeadlessMsg::ReleaseMenu => data.menu_pressed = false,
            HeadlessMsg::StallSwapchainImages(stall) => data.stall_images = stall,
            HeadlessMsg::LoseSession => {
                warn!("headless session lost");
                data.lost = true;
                data.lifecycle.stop();
                data.transition(SessionState::LossPending);
                self.frame_progress.notify_all();
            }
            HeadlessMsg::Quit => return false,
        }
        true
    }

    /// The session state as of the most recently queued event.
    pub fn session_state(&self) -> SessionState {
        self.data.lock().unwrap().state
    }

    pub fn frame_phase(&self) -> FramePhase {
        self.data.lock().unwrap().lifecycle.phase()
    }

    pub fn space_count(&self) -> usize {
        self.data.lock().unwrap().spaces.len()
    }

    pub fn submitted_frames(&self) -> u64 {
        self.data.lock().unwrap().submitted_frames
    }

    pub fn last_submitted_frame(&self) -> Option<SubmittedFrame> {
        self.data.lock().unwrap().last_frame.clone()
    }

    fn display_time(&self, index: u64) -> Time {
        let offset = self.display_period.as_nanos() as u64 * index;
        Time::from_nanos((self.origin_ns + offset) as i64)
    }

    /// Blocks while `blocked` holds for the session's frame calls, for at
    /// most `limit`.
    fn block_while<P>(&self, blocked: P, limit: Duration)
    where
        P: Fn(&FrameLifecycle) -> bool,
    {
        let mut data = self.data.lock().unwrap();
        let mut remaining = limit;
        while blocked(&data.lifecycle) && remaining > Duration::from_secs(0) {
            let started = time::precise_time_ns();
            data = self.frame_progress.wait_timeout(data, remaining).unwrap().0;
            let waited = Duration::from_nanos(time::precise_time_ns() - started);
            remaining = remaining.checked_sub(waited).unwrap_or_default();
        }
    }
}

/// Forwards messages from `receiver` until it disconnects or sends `Quit`.
pub fn spawn_message_loop(
    runtime: Arc<HeadlessRuntime>,
    receiver: Receiver<HeadlessMsg>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(msg) = receiver.recv() {
            if !runtime.handle_msg(msg) {
                break;
            }
        }
    })
}

fn sleep_until_ns(deadline: u64) {
    const SPIN: u64 = 1_000_000;
    let now = time::precise_time_ns();
    if deadline > now + SPIN {
        thread::sleep(Duration::from_nanos(deadline - now - SPIN));
    }
    while time::precise_time_ns() < deadline {
        thread::yield_now();
    }
}

/// The pose of a point at `position` (identity orientation) relative to a
/// space whose origin sits at `space`.
fn pose_in_space(space: &Pose, position: Vector3D<f32, Reference>) -> Pose {
    let inverse = space.rotation.inverse();
    let local = inverse.transform_vector3d(position - space.translation);
    RigidTransform3D::new(
        Rotation3D::quaternion(inverse.i, inverse.j, inverse.k, inverse.r),
        Vector3D::new(local.x, local.y, local.z),
    )
}

impl HeadlessData {
    fn transition(&mut self, state: SessionState) {
        debug!("headless session {:?} -> {:?}", self.state, state);
        self.state = state;
        self.events.push_back(Event::SessionStateChanged(state));
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_alive(&self) -> Result<(), Error> {
        if self.lost {
            Err(Error::SessionLost)
        } else {
            Ok(())
        }
    }

    fn check_layers(&self, info: &FrameEndInfo, view_count: usize) -> Result<(), Error> {
        for layer in info.layers.iter().flatten() {
            if !self.spaces.contains_key(&layer.space()) {
                return Err(Error::HandleInvalid);
            }
            if let CompositionLayer::Projection(ref projection) = **layer {
                if projection.views.len() != view_count {
                    return Err(Error::ValidationFailure(format!(
                        "projection layer has {} views, expected {}",
                        projection.views.len(),
                        view_count
                    )));
                }
            }
            for sub_image in layer.sub_images() {
                let sub_image = sub_image.ok_or(Error::LayerInvalid)?;
                let swapchain = self
                    .swapchains
                    .get(&sub_image.swapchain)
                    .ok_or(Error::HandleInvalid)?;
                if !swapchain.ever_released {
                    return Err(Error::LayerInvalid);
                }
                let rect = sub_image.image_rect;
                if rect.is_empty()
                    || rect.origin.x < 0
                    || rect.origin.y < 0
                    || !swapchain.info.full_rect().contains_rect(&rect)
                {
                    return Err(Error::SwapchainRectInvalid);
                }
                if sub_image.image_array_index >= swapchain.info.array_size {
                    return Err(Error::ValidationFailure(format!(
                        "image array index {} out of range",
                        sub_image.image_array_index
                    )));
                }
            }
        }
        Ok(())
    }

    fn update_actions(&mut self, sets: &[ActionSetId]) {
        let focused = self.state == SessionState::Focused;
        let (select, menu) = (self.select_pressed, self.menu_pressed);
        for action in self.actions.values_mut() {
            if !sets.contains(&action.set) || action.kind != ActionType::BooleanInput {
                continue;
            }
            let bound = !action.bindings.is_empty();
            let pressed = action.bindings.iter().any(|binding| {
                (select && binding.ends_with("/input/select/click"))
                    || (menu && binding.ends_with("/input/menu/click"))
            });
            let active = bound && focused;
            let current = active && pressed;
            action.state = ActionStateBoolean {
                current_state: current,
                changed_since_last_sync: active && current != action.state.current_state,
                is_active: active,
            };
        }
    }
}

impl RuntimeAPI for HeadlessRuntime {
    fn wait_frame(&self) -> Result<FrameState, Error> {
        {
            let data = self.data.lock().unwrap();
            data.check_alive()?;
            if !data.lifecycle.is_running() {
                return Err(Error::SessionNotRunning);
            }
        }
        // A second wait holds off until the first wait's frame has begun,
        // then supersedes it.
        self.block_while(FrameLifecycle::has_pending_wait, self.display_period);
        if self.serialize_frame_calls {
            self.block_while(
                |lifecycle| lifecycle.phase() == FramePhase::Began,
                SERIALIZED_WAIT_LIMIT,
            );
        }

        // Hand out the next display slot that has not started yet, and block
        // until the slot before it begins.
        let period = self.display_period.as_nanos() as u64;
        let now = time::precise_time_ns() - self.origin_ns;
        let now_index = (now + period - 1) / period;
        let index = {
            let data = self.data.lock().unwrap();
            (data.last_display_index + 1).max(now_index + 1)
        };
        if self.throttle_wait_frame {
            sleep_until_ns(self.origin_ns + (index - 1) * period);
        }

        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        data.lifecycle.wait()?;
        data.last_display_index = data.last_display_index.max(index);
        let should_render = match data.state {
            SessionState::Visible | SessionState::Focused => true,
            _ => false,
        };
        Ok(FrameState {
            predicted_display_time: self.display_time(data.last_display_index),
            predicted_display_period: self.display_period,
            should_render,
        })
    }

    fn begin_frame(&self) -> Result<FrameBegin, Error> {
        if self.begin_frame_delay > Duration::from_secs(0) {
            thread::sleep(self.begin_frame_delay);
        }
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        let result = data.lifecycle.begin();
        self.frame_progress.notify_all();
        result
    }

    fn end_frame(&self, info: &FrameEndInfo) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        data.lifecycle.check_end(info)?;
        let view_count = data
            .view_configuration
            .map_or(0, ViewConfigurationType::view_count);
        data.check_layers(info, view_count)?;
        data.lifecycle.end(info)?;
        data.submitted_frames += 1;
        data.last_frame = Some(SubmittedFrame {
            display_time: info.display_time,
            environment_blend_mode: info.environment_blend_mode,
            layers: info.layers.iter().flatten().map(|&layer| layer.clone()).collect(),
        });
        self.frame_progress.notify_all();
        Ok(())
    }

    fn begin_session(&self, view_configuration: ViewConfigurationType) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        if data.lifecycle.phase() != FramePhase::NotRunning {
            return Err(Error::SessionRunning);
        }
        if data.state != SessionState::Ready {
            return Err(Error::SessionNotReady);
        }
        if view_configuration.view_count() > self.views.len() {
            return Err(Error::ViewConfigurationTypeUnsupported);
        }
        data.lifecycle.start()?;
        data.view_configuration = Some(view_configuration);
        data.transition(SessionState::Synchronized);
        data.transition(SessionState::Visible);
        data.transition(SessionState::Focused);
        Ok(())
    }

    fn request_exit_session(&self) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        if data.lifecycle.phase() == FramePhase::NotRunning {
            return Err(Error::SessionNotRunning);
        }
        if data.state == SessionState::Focused {
            data.transition(SessionState::Visible);
        }
        if data.state == SessionState::Visible {
            data.transition(SessionState::Synchronized);
        }
        if data.state != SessionState::Stopping {
            data.transition(SessionState::Stopping);
        }
        Ok(())
    }

    fn end_session(&self) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        if data.lifecycle.phase() == FramePhase::NotRunning {
            return Err(Error::SessionNotRunning);
        }
        if data.state != SessionState::Stopping {
            return Err(Error::SessionNotStopping);
        }
        data.lifecycle.stop();
        data.view_configuration = None;
        data.transition(SessionState::Idle);
        data.transition(SessionState::Exiting);
        self.frame_progress.notify_all();
        Ok(())
    }

    fn poll_event(&self) -> Option<Event> {
        let mut data = self.data.lock().unwrap();
        let event = data.events.pop_front()?;
        if event == Event::SessionStateChanged(SessionState::Stopping) {
            data.lifecycle.stopping();
        }
        Some(event)
    }

    fn now(&self) -> Time {
        Time::from_nanos(time::precise_time_ns() as i64)
    }

    fn environment_blend_modes(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> Result<Vec<EnvironmentBlendMode>, Error> {
        if view_configuration.view_count() > self.views.len() {
            return Err(Error::ViewConfigurationTypeUnsupported);
        }
        Ok(self.blend_modes.clone())
    }

    fn view_configuration_views(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> Result<Vec<ViewConfigurationView>, Error> {
        let count = view_configuration.view_count();
        if count > self.views.len() {
            return Err(Error::ViewConfigurationTypeUnsupported);
        }
        Ok(self.views[..count].to_vec())
    }

    fn locate_views(
        &self,
        view_configuration: ViewConfigurationType,
        display_time: Time,
        space: SpaceId,
    ) -> Result<(ViewStateFlags, Vec<View>), Error> {
        let data = self.data.lock().unwrap();
        data.check_alive()?;
        if !display_time.is_valid() {
            return Err(Error::TimeInvalid);
        }
        let &(kind, origin) = data.spaces.get(&space).ok_or(Error::HandleInvalid)?;
        let count = view_configuration.view_count();
        if count > self.views.len() {
            return Err(Error::ViewConfigurationTypeUnsupported);
        }
        let eye_height = match kind {
            ReferenceSpaceType::Stage => STAGE_EYE_HEIGHT,
            ReferenceSpaceType::View | ReferenceSpaceType::Local => 0.,
        };
        let offsets: &[f32] = if count == 1 { &[0.] } else { &[-IPD / 2., IPD / 2.] };
        let views = offsets
            .iter()
            .map(|&x| View {
                pose: pose_in_space(&origin, Vector3D::new(x, eye_height, 0.)),
                fov: Fov::symmetric(90f32.to_radians(), 90f32.to_radians()),
            })
            .collect();
        let flags = ViewStateFlags::ORIENTATION_VALID
            | ViewStateFlags::POSITION_VALID
            | ViewStateFlags::ORIENTATION_TRACKED
            | ViewStateFlags::POSITION_TRACKED;
        Ok((flags, views))
    }

    fn create_reference_space(&self, kind: ReferenceSpaceType, pose: Pose) -> Result<SpaceId, Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        let id = SpaceId(data.next_id());
        data.spaces.insert(id, (kind, pose));
        Ok(id)
    }

    fn destroy_space(&self, space: SpaceId) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.spaces.remove(&space).map(|_| ()).ok_or(Error::HandleInvalid)
    }

    fn swapchain_formats(&self) -> Result<Vec<i64>, Error> {
        Ok(self.swapchain_formats.clone())
    }

    fn create_swapchain(&self, info: &SwapchainCreateInfo) -> Result<SwapchainId, Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        if !self.swapchain_formats.contains(&info.format) {
            return Err(Error::ValidationFailure(format!("unsupported format {}", info.format)));
        }
        if info.width == 0 || info.height == 0 || info.array_size == 0 || info.face_count == 0 {
            return Err(Error::ValidationFailure("empty swapchain".into()));
        }
        let id = SwapchainId(data.next_id());
        let image_count = if info.is_static() { 1 } else { self.image_count };
        data.swapchains.insert(
            id,
            HeadlessSwapchain {
                info: *info,
                image_count,
                next_image: 0,
                acquired: VecDeque::new(),
                ever_acquired: false,
                ever_released: false,
            },
        );
        Ok(id)
    }

    fn destroy_swapchain(&self, swapchain: SwapchainId) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.swapchains
            .remove(&swapchain)
            .map(|_| ())
            .ok_or(Error::HandleInvalid)
    }

    fn swapchain_image_count(&self, swapchain: SwapchainId) -> Result<u32, Error> {
        let data = self.data.lock().unwrap();
        let swapchain = data.swapchains.get(&swapchain).ok_or(Error::HandleInvalid)?;
        Ok(swapchain.image_count)
    }

    fn acquire_swapchain_image(&self, swapchain: SwapchainId) -> Result<u32, Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        let swapchain = data.swapchains.get_mut(&swapchain).ok_or(Error::HandleInvalid)?;
        if swapchain.info.is_static() && swapchain.ever_acquired {
            return Err(Error::CallOrderInvalid);
        }
        if swapchain.acquired.len() as u32 >= swapchain.image_count {
            return Err(Error::CallOrderInvalid);
        }
        let index = swapchain.next_image;
        swapchain.next_image = (index + 1) % swapchain.image_count;
        swapchain.acquired.push_back((index, false));
        swapchain.ever_acquired = true;
        Ok(index)
    }

    fn wait_swapchain_image(&self, swapchain: SwapchainId, timeout: Duration) -> Result<(), Error> {
        let stalled = {
            let mut data = self.data.lock().unwrap();
            data.check_alive()?;
            let stalled = data.stall_images;
            let swapchain = data.swapchains.get_mut(&swapchain).ok_or(Error::HandleInvalid)?;
            let image = swapchain
                .acquired
                .iter_mut()
                .find(|image| !image.1)
                .ok_or(Error::CallOrderInvalid)?;
            if !stalled {
                image.1 = true;
            }
            stalled
        };
        if stalled {
            thread::sleep(timeout);
            return Err(Error::TimeoutExpired);
        }
        Ok(())
    }

    fn release_swapchain_image(&self, swapchain: SwapchainId) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        let swapchain = data.swapchains.get_mut(&swapchain).ok_or(Error::HandleInvalid)?;
        match swapchain.acquired.front() {
            Some(&(_, true)) => {}
            _ => return Err(Error::CallOrderInvalid),
        }
        swapchain.acquired.pop_front();
        swapchain.ever_released = true;
        Ok(())
    }

    fn create_action_set(&self, name: &str, _priority: u32) -> Result<ActionSetId, Error> {
        let mut data = self.data.lock().unwrap();
        if data.action_sets.values().any(|existing| existing == name) {
            return Err(Error::ValidationFailure(format!("duplicate action set {}", name)));
        }
        let id = ActionSetId(data.next_id());
        data.action_sets.insert(id, name.into());
        Ok(id)
    }

    fn create_action(&self, set: ActionSetId, _name: &str, kind: ActionType) -> Result<ActionId, Error> {
        let mut data = self.data.lock().unwrap();
        if !data.action_sets.contains_key(&set) {
            return Err(Error::HandleInvalid);
        }
        if data.attached.as_ref().map_or(false, |sets| sets.contains(&set)) {
            return Err(Error::ActionSetsAlreadyAttached);
        }
        let id = ActionId(data.next_id());
        data.actions.insert(
            id,
            HeadlessAction {
                set,
                kind,
                bindings: Vec::new(),
                state: ActionStateBoolean::default(),
            },
        );
        Ok(id)
    }

    fn suggest_interaction_profile_bindings(
        &self,
        interaction_profile: &str,
        bindings: &[SuggestedBinding],
    ) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        if !interaction_profile.starts_with("/interaction_profiles/") {
            return Err(Error::PathUnsupported(interaction_profile.into()));
        }
        if data.attached.is_some() {
            return Err(Error::ActionSetsAlreadyAttached);
        }
        for binding in bindings {
            if !binding.binding.starts_with("/user/") {
                return Err(Error::PathUnsupported(binding.binding.clone()));
            }
            if !data.actions.contains_key(&binding.action) {
                return Err(Error::HandleInvalid);
            }
        }
        for binding in bindings {
            if let Some(action) = data.actions.get_mut(&binding.action) {
                if !action.bindings.contains(&binding.binding) {
                    action.bindings.push(binding.binding.clone());
                }
            }
        }
        Ok(())
    }

    fn attach_action_sets(&self, action_sets: &[ActionSetId]) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        if data.attached.is_some() {
            return Err(Error::ActionSetsAlreadyAttached);
        }
        if action_sets.iter().any(|set| !data.action_sets.contains_key(set)) {
            return Err(Error::HandleInvalid);
        }
        data.attached = Some(action_sets.to_vec());
        Ok(())
    }

    fn sync_actions(&self, action_sets: &[ActionSetId]) -> Result<(), Error> {
        let mut data = self.data.lock().unwrap();
        data.check_alive()?;
        let attached = data.attached.clone().ok_or(Error::ActionSetNotAttached)?;
        if action_sets.iter().any(|set| !attached.contains(set)) {
            return Err(Error::ActionSetNotAttached);
        }
        if !data.lifecycle.is_running() {
            return Err(Error::SessionNotRunning);
        }
        data.update_actions(action_sets);
        Ok(())
    }

    fn action_state_boolean(&self, action: ActionId) -> Result<ActionStateBoolean, Error> {
        let data = self.data.lock().unwrap();
        let action = data.actions.get(&action).ok_or(Error::HandleInvalid)?;
        let attached = data
            .attached
            .as_ref()
            .map_or(false, |sets| sets.contains(&action.set));
        if !attached {
            return Err(Error::ActionSetNotAttached);
        }
        Ok(action.state)
    }
}
