/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

/// Traits to be implemented by runtimes under test
use crate::ActionId;
use crate::ActionSetId;
use crate::ActionStateBoolean;
use crate::ActionType;
use crate::EnvironmentBlendMode;
use crate::Error;
use crate::Event;
use crate::FrameBegin;
use crate::FrameEndInfo;
use crate::FrameState;
use crate::Pose;
use crate::ReferenceSpaceType;
use crate::SpaceId;
use crate::SuggestedBinding;
use crate::SwapchainCreateInfo;
use crate::SwapchainId;
use crate::Time;
use crate::View;
use crate::ViewConfigurationType;
use crate::ViewConfigurationView;
use crate::ViewStateFlags;

use std::time::Duration;

/// A session of the runtime under test.
///
/// All methods take `&self`: wait-frame is called from one thread while
/// begin-frame and end-frame are called from another, and implementations
/// must allow that without the caller adding locks of its own.
pub trait RuntimeAPI: Send + Sync {
    /// Blocks until the runtime wants the next frame and returns its timing.
    fn wait_frame(&self) -> Result<FrameState, Error>;

    fn begin_frame(&self) -> Result<FrameBegin, Error>;

    fn end_frame(&self, info: &FrameEndInfo) -> Result<(), Error>;

    fn begin_session(&self, view_configuration: ViewConfigurationType) -> Result<(), Error>;

    fn request_exit_session(&self) -> Result<(), Error>;

    fn end_session(&self) -> Result<(), Error>;

    /// The next queued event, if any. Never blocks.
    fn poll_event(&self) -> Option<Event>;

    /// The runtime clock's current value.
    fn now(&self) -> Time;

    fn environment_blend_modes(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> Result<Vec<EnvironmentBlendMode>, Error>;

    fn view_configuration_views(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> Result<Vec<ViewConfigurationView>, Error>;

    fn locate_views(
        &self,
        view_configuration: ViewConfigurationType,
        display_time: Time,
        space: SpaceId,
    ) -> Result<(ViewStateFlags, Vec<View>), Error>;

    fn create_reference_space(&self, kind: ReferenceSpaceType, pose: Pose) -> Result<SpaceId, Error>;

    fn destroy_space(&self, space: SpaceId) -> Result<(), Error>;

    fn swapchain_formats(&self) -> Result<Vec<i64>, Error>;

    fn create_swapchain(&self, create_info: &SwapchainCreateInfo) -> Result<SwapchainId, Error>;

    fn destroy_swapchain(&self, swapchain: SwapchainId) -> Result<(), Error>;

    fn swapchain_image_count(&self, swapchain: SwapchainId) -> Result<u32, Error>;

    fn acquire_swapchain_image(&self, swapchain: SwapchainId) -> Result<u32, Error>;

    /// Fails with `TimeoutExpired` if the acquired image is not ready in time.
    fn wait_swapchain_image(&self, swapchain: SwapchainId, timeout: Duration) -> Result<(), Error>;

    fn release_swapchain_image(&self, swapchain: SwapchainId) -> Result<(), Error>;

    fn create_action_set(&self, name: &str, priority: u32) -> Result<ActionSetId, Error>;

    fn create_action(
        &self,
        action_set: ActionSetId,
        name: &str,
        kind: ActionType,
    ) -> Result<ActionId, Error>;

    fn suggest_interaction_profile_bindings(
        &self,
        interaction_profile: &str,
        bindings: &[SuggestedBinding],
    ) -> Result<(), Error>;

    fn attach_action_sets(&self, action_sets: &[ActionSetId]) -> Result<(), Error>;

    fn sync_actions(&self, action_sets: &[ActionSetId]) -> Result<(), Error>;

    fn action_state_boolean(&self, action: ActionId) -> Result<ActionStateBoolean, Error>;
}
