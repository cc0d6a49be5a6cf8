/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The legal wait-frame / begin-frame / end-frame call sequence of a session.

use crate::EnvironmentBlendMode;
use crate::Error;
use crate::FrameBegin;
use crate::FrameEndInfo;

use log::debug;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The externally visible frame-call state of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FramePhase {
    NotRunning,
    /// Running, with no outstanding wait-frame result and no open frame.
    Ready,
    /// A wait-frame result is waiting for its begin-frame.
    Waited,
    /// A frame has begun and has not been ended yet.
    Began,
    Stopping,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Running {
    No,
    Yes,
    Stopping,
}

/// Tracks one session's frame calls and decides the result code of each.
///
/// A runtime owns one of these per session and routes its frame calls
/// through it. Failed calls never change the state.
#[derive(Clone, Debug)]
pub struct FrameLifecycle {
    running: Running,
    pending_wait: bool,
    superseded: bool,
    frame_began: bool,
    supported_blend_modes: Vec<EnvironmentBlendMode>,
    max_layers: usize,
}

impl FrameLifecycle {
    pub fn new(supported_blend_modes: Vec<EnvironmentBlendMode>, max_layers: usize) -> Self {
        FrameLifecycle {
            running: Running::No,
            pending_wait: false,
            superseded: false,
            frame_began: false,
            supported_blend_modes,
            max_layers,
        }
    }

    pub fn phase(&self) -> FramePhase {
        match self.running {
            Running::No => FramePhase::NotRunning,
            Running::Stopping => FramePhase::Stopping,
            Running::Yes if self.frame_began => FramePhase::Began,
            Running::Yes if self.pending_wait => FramePhase::Waited,
            Running::Yes => FramePhase::Ready,
        }
    }

    /// Whether a wait-frame result has not been consumed by a begin-frame.
    pub fn has_pending_wait(&self) -> bool {
        self.pending_wait
    }

    pub fn is_running(&self) -> bool {
        self.running == Running::Yes
    }

    pub fn supported_blend_modes(&self) -> &[EnvironmentBlendMode] {
        &self.supported_blend_modes
    }

    pub fn max_layers(&self) -> usize {
        self.max_layers
    }

    /// The session has begun; frame calls become legal.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.running != Running::No {
            return Err(Error::SessionRunning);
        }
        self.reset(Running::Yes);
        Ok(())
    }

    /// The session reached the stopping state; frame calls are no longer legal.
    pub fn stopping(&mut self) {
        if self.running == Running::Yes {
            self.reset(Running::Stopping);
        }
    }

    /// The session has ended.
    pub fn stop(&mut self) {
        self.reset(Running::No);
    }

    pub fn wait(&mut self) -> Result<(), Error> {
        self.check_running()?;
        if self.pending_wait {
            debug!("wait-frame superseded an unconsumed wait result");
            self.superseded = true;
        }
        self.pending_wait = true;
        Ok(())
    }

    pub fn begin(&mut self) -> Result<FrameBegin, Error> {
        self.check_running()?;
        if !self.pending_wait {
            return Err(Error::CallOrderInvalid);
        }
        let discarded = self.frame_began || self.superseded;
        self.pending_wait = false;
        self.superseded = false;
        self.frame_began = true;
        if discarded {
            debug!("begin-frame discarded the previous frame");
            Ok(FrameBegin::FrameDiscarded)
        } else {
            Ok(FrameBegin::Success)
        }
    }

    /// Validates an end-frame call without consuming the open frame.
    ///
    /// Runtimes with further checks of their own (swapchain references and
    /// the like) run this first, then their checks, then `end`.
    pub fn check_end(&self, info: &FrameEndInfo) -> Result<(), Error> {
        self.check_running()?;
        if !self.frame_began {
            return Err(Error::CallOrderInvalid);
        }
        if !info.display_time.is_valid() {
            return Err(Error::TimeInvalid);
        }
        if !self
            .supported_blend_modes
            .contains(&info.environment_blend_mode)
        {
            return Err(Error::EnvironmentBlendModeUnsupported);
        }
        if info.layers.len() > self.max_layers {
            return Err(Error::LayerLimitExceeded);
        }
        if info.layers.iter().any(Option::is_none) {
            return Err(Error::LayerInvalid);
        }
        Ok(())
    }

    pub fn end(&mut self, info: &FrameEndInfo) -> Result<(), Error> {
        self.check_end(info)?;
        self.frame_began = false;
        Ok(())
    }

    fn check_running(&self) -> Result<(), Error> {
        match self.running {
            Running::Yes => Ok(()),
            Running::No | Running::Stopping => Err(Error::SessionNotRunning),
        }
    }

    fn reset(&mut self, running: Running) {
        self.running = running;
        self.pending_wait = false;
        self.superseded = false;
        self.frame_began = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Time;

    fn running() -> FrameLifecycle {
        let mut lifecycle = FrameLifecycle::new(vec![EnvironmentBlendMode::Opaque], 16);
        lifecycle.start().unwrap();
        lifecycle
    }

    fn end_info<'a>() -> FrameEndInfo<'a> {
        FrameEndInfo::new(Time(1_000), EnvironmentBlendMode::Opaque)
    }

    #[test]
    fn frame_calls_fail_before_the_session_runs() {
        let mut lifecycle = FrameLifecycle::new(vec![EnvironmentBlendMode::Opaque], 16);
        assert_eq!(lifecycle.phase(), FramePhase::NotRunning);
        assert_eq!(lifecycle.wait(), Err(Error::SessionNotRunning));
        assert_eq!(lifecycle.begin(), Err(Error::SessionNotRunning));
        assert_eq!(lifecycle.end(&end_info()), Err(Error::SessionNotRunning));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut lifecycle = running();
        assert_eq!(lifecycle.start(), Err(Error::SessionRunning));
    }

    #[test]
    fn plain_frame_moves_through_every_phase() {
        let mut lifecycle = running();
        assert_eq!(lifecycle.phase(), FramePhase::Ready);
        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.phase(), FramePhase::Waited);
        assert_eq!(lifecycle.begin(), Ok(FrameBegin::Success));
        assert_eq!(lifecycle.phase(), FramePhase::Began);
        lifecycle.end(&end_info()).unwrap();
        assert_eq!(lifecycle.phase(), FramePhase::Ready);
    }

    #[test]
    fn begin_without_wait_is_call_order_invalid() {
        let mut lifecycle = running();
        assert_eq!(lifecycle.begin(), Err(Error::CallOrderInvalid));

        lifecycle.wait().unwrap();
        lifecycle.begin().unwrap();
        assert_eq!(lifecycle.begin(), Err(Error::CallOrderInvalid));
        // The failed begin did not disturb the open frame.
        assert_eq!(lifecycle.end(&end_info()), Ok(()));
    }

    #[test]
    fn end_without_begin_is_call_order_invalid() {
        let mut lifecycle = running();
        assert_eq!(lifecycle.end(&end_info()), Err(Error::CallOrderInvalid));
        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.end(&end_info()), Err(Error::CallOrderInvalid));
    }

    #[test]
    fn begin_over_an_open_frame_reports_discarded() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        lifecycle.begin().unwrap();
        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.begin(), Ok(FrameBegin::FrameDiscarded));
        assert_eq!(lifecycle.end(&end_info()), Ok(()));
        assert_eq!(lifecycle.begin(), Err(Error::CallOrderInvalid));
    }

    #[test]
    fn superseded_wait_reports_discarded() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.begin(), Ok(FrameBegin::FrameDiscarded));
        lifecycle.end(&end_info()).unwrap();

        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.begin(), Ok(FrameBegin::Success));
    }

    #[test]
    fn second_wait_may_overlap_an_open_frame() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.begin(), Ok(FrameBegin::Success));
        lifecycle.wait().unwrap();
        assert_eq!(lifecycle.phase(), FramePhase::Began);
        lifecycle.end(&end_info()).unwrap();
        assert_eq!(lifecycle.phase(), FramePhase::Waited);
        assert_eq!(lifecycle.begin(), Ok(FrameBegin::Success));
        lifecycle.end(&end_info()).unwrap();
    }

    #[test]
    fn invalid_time_keeps_the_frame_open() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        lifecycle.begin().unwrap();
        let bad = FrameEndInfo::new(Time::ZERO, EnvironmentBlendMode::Opaque);
        assert_eq!(lifecycle.end(&bad), Err(Error::TimeInvalid));
        assert_eq!(lifecycle.phase(), FramePhase::Began);
        assert_eq!(lifecycle.end(&end_info()), Ok(()));
        assert_eq!(lifecycle.end(&end_info()), Err(Error::CallOrderInvalid));
    }

    #[test]
    fn unsupported_blend_mode_is_rejected() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        lifecycle.begin().unwrap();
        let additive = FrameEndInfo::new(Time(1_000), EnvironmentBlendMode::Additive);
        assert_eq!(
            lifecycle.end(&additive),
            Err(Error::EnvironmentBlendModeUnsupported)
        );
        assert!(lifecycle.is_running());
        assert_eq!(lifecycle.end(&end_info()), Ok(()));
    }

    #[test]
    fn null_layer_is_rejected() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        lifecycle.begin().unwrap();
        let layers = [None];
        let info = end_info().with_layers(&layers);
        assert_eq!(lifecycle.end(&info), Err(Error::LayerInvalid));
    }

    #[test]
    fn too_many_layers_is_rejected() {
        let mut lifecycle = FrameLifecycle::new(vec![EnvironmentBlendMode::Opaque], 0);
        lifecycle.start().unwrap();
        lifecycle.wait().unwrap();
        lifecycle.begin().unwrap();
        let layers = [None];
        let info = end_info().with_layers(&layers);
        assert_eq!(lifecycle.end(&info), Err(Error::LayerLimitExceeded));
    }

    #[test]
    fn stopping_and_stopped_sessions_reject_frame_calls() {
        let mut lifecycle = running();
        lifecycle.wait().unwrap();
        lifecycle.stopping();
        assert_eq!(lifecycle.phase(), FramePhase::Stopping);
        assert_eq!(lifecycle.wait(), Err(Error::SessionNotRunning));
        assert_eq!(lifecycle.begin(), Err(Error::SessionNotRunning));

        lifecycle.stop();
        assert_eq!(lifecycle.phase(), FramePhase::NotRunning);
        assert_eq!(lifecycle.wait(), Err(Error::SessionNotRunning));
        assert_eq!(lifecycle.begin(), Err(Error::SessionNotRunning));
    }
}
