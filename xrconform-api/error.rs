/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Failure codes a runtime reports back to the harness.
///
/// Success codes that are not plain success (such as a discarded frame) are
/// carried in the `Ok` value of the call instead.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Error {
    #[error("session is not running")]
    SessionNotRunning,

    #[error("session is already running")]
    SessionRunning,

    #[error("session is not ready to begin")]
    SessionNotReady,

    #[error("session is not stopping")]
    SessionNotStopping,

    #[error("session was lost")]
    SessionLost,

    #[error("call order invalid")]
    CallOrderInvalid,

    #[error("time invalid")]
    TimeInvalid,

    #[error("environment blend mode unsupported")]
    EnvironmentBlendModeUnsupported,

    #[error("composition layer invalid")]
    LayerInvalid,

    #[error("too many composition layers")]
    LayerLimitExceeded,

    #[error("swapchain rect invalid")]
    SwapchainRectInvalid,

    #[error("handle invalid")]
    HandleInvalid,

    #[error("validation failure: {0}")]
    ValidationFailure(String),

    #[error("timeout expired")]
    TimeoutExpired,

    #[error("action sets already attached")]
    ActionSetsAlreadyAttached,

    #[error("action set not attached")]
    ActionSetNotAttached,

    #[error("path unsupported: {0}")]
    PathUnsupported(String),

    #[error("view configuration type unsupported")]
    ViewConfigurationTypeUnsupported,
}
