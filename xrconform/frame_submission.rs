/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Frame submission cases: the result codes of wait-frame, begin-frame and
//! end-frame in and out of order. Each case is meant to be run with
//! `Report::run` against a freshly created session.

use crate::error::RuntimeResultExt;
use crate::CaseReport;
use crate::CompositionHelper;
use crate::FrameIterator;
use crate::Result;
use crate::RunResult;

use xrconform_api::CompositionLayer;
use xrconform_api::EnvironmentBlendMode;
use xrconform_api::Error;
use xrconform_api::FrameBegin;
use xrconform_api::FrameEndInfo;
use xrconform_api::RuntimeAPI;
use xrconform_api::SessionState;
use xrconform_api::Time;

use log::warn;

use std::time::Duration;

const STOPPING_TIMEOUT: Duration = Duration::from_secs(5);

fn waited(runtime: &dyn RuntimeAPI) -> std::result::Result<(), Error> {
    runtime.wait_frame().map(|_| ())
}

fn end_without_layers(
    runtime: &dyn RuntimeAPI,
    display_time: Time,
    blend_mode: EnvironmentBlendMode,
) -> std::result::Result<(), Error> {
    runtime.end_frame(&FrameEndInfo::new(display_time, blend_mode))
}

/// Frame calls on a session that has not been begun.
pub fn frame_calls_before_session_begins(case: &mut CaseReport, helper: &mut CompositionHelper) -> Result<()> {
    let runtime = helper.runtime().clone();
    case.check_eq("xrWaitFrame", Err(Error::SessionNotRunning), waited(&*runtime));
    case.check_eq("xrBeginFrame", Err(Error::SessionNotRunning), runtime.begin_frame());
    Ok(())
}

/// Begin-frame and end-frame out of order, and the discard policy.
pub fn frame_call_order(case: &mut CaseReport, helper: &mut CompositionHelper) -> Result<()> {
    helper.begin_session()?;
    let runtime = helper.runtime().clone();
    let blend_mode = helper.options().environment_blend_mode;

    case.check_eq("xrBeginFrame", Err(Error::CallOrderInvalid), runtime.begin_frame());
    case.check_eq(
        "xrEndFrame",
        Err(Error::CallOrderInvalid),
        end_without_layers(&*runtime, runtime.now(), blend_mode),
    );

    // A wait after begin-frame queues a second frame; beginning it discards
    // the first.
    let first = runtime.wait_frame().call("xrWaitFrame")?;
    case.require_eq("xrBeginFrame", Ok(FrameBegin::Success), runtime.begin_frame())?;
    let second = runtime.wait_frame().call("xrWaitFrame")?;
    case.check(
        second.predicted_display_time > first.predicted_display_time,
        "queued frame predicts a later display time",
    );
    case.require_eq("xrBeginFrame", Ok(FrameBegin::FrameDiscarded), runtime.begin_frame())?;
    case.require_eq(
        "xrEndFrame",
        Ok(()),
        end_without_layers(&*runtime, first.predicted_display_time, blend_mode),
    )?;
    case.check_eq("xrBeginFrame", Err(Error::CallOrderInvalid), runtime.begin_frame());

    // A second begin without a new wait is out of order and leaves the open
    // frame alone.
    let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
    case.require_eq("xrBeginFrame", Ok(FrameBegin::Success), runtime.begin_frame())?;
    case.check_eq("xrBeginFrame", Err(Error::CallOrderInvalid), runtime.begin_frame());
    case.require_eq(
        "xrEndFrame",
        Ok(()),
        end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode),
    )?;
    case.check_eq(
        "xrEndFrame",
        Err(Error::CallOrderInvalid),
        end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode),
    );

    // Two waits in a row supersede the first result.
    let first = runtime.wait_frame().call("xrWaitFrame")?;
    let second = runtime.wait_frame().call("xrWaitFrame")?;
    case.check(
        second.predicted_display_time > first.predicted_display_time,
        "second wait predicts a later display time",
    );
    case.require_eq("xrBeginFrame", Ok(FrameBegin::FrameDiscarded), runtime.begin_frame())?;
    case.require_eq(
        "xrEndFrame",
        Ok(()),
        end_without_layers(&*runtime, second.predicted_display_time, blend_mode),
    )?;
    Ok(())
}

/// End-frame with invalid times, null layers and every blend mode. A failed
/// end-frame must leave the frame open for a corrected call.
pub fn end_frame_info(case: &mut CaseReport, helper: &mut CompositionHelper) -> Result<()> {
    helper.begin_session()?;
    let runtime = helper.runtime().clone();
    let blend_mode = helper.options().environment_blend_mode;

    let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
    case.require_eq("xrBeginFrame", Ok(FrameBegin::Success), runtime.begin_frame())?;
    case.require_eq(
        "xrEndFrame",
        Ok(()),
        end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode),
    )?;
    // A frame ended without layers is still a submitted frame, so the next
    // begin is not a discard.
    let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
    case.require_eq("xrBeginFrame", Ok(FrameBegin::Success), runtime.begin_frame())?;

    case.check_eq(
        "xrEndFrame",
        Err(Error::TimeInvalid),
        end_without_layers(&*runtime, Time::ZERO, blend_mode),
    );
    case.require_eq(
        "xrEndFrame",
        Ok(()),
        end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode),
    )?;

    let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
    runtime.begin_frame().call("xrBeginFrame")?;
    let null_layer: [Option<&CompositionLayer>; 1] = [None];
    let info = FrameEndInfo::new(frame_state.predicted_display_time, blend_mode).with_layers(&null_layer);
    case.check_eq("xrEndFrame", Err(Error::LayerInvalid), runtime.end_frame(&info));
    case.require_eq(
        "xrEndFrame",
        Ok(()),
        end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode),
    )?;

    let supported = runtime
        .environment_blend_modes(helper.options().view_configuration)
        .call("xrEnumerateEnvironmentBlendModes")?;
    for &mode in &EnvironmentBlendMode::ALL {
        let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
        runtime.begin_frame().call("xrBeginFrame")?;
        let result = end_without_layers(&*runtime, frame_state.predicted_display_time, mode);
        if supported.contains(&mode) {
            case.check_eq("xrEndFrame", Ok(()), result);
        } else {
            case.check_eq("xrEndFrame", Err(Error::EnvironmentBlendModeUnsupported), result.clone());
            if result.is_err() {
                case.require_eq(
                    "xrEndFrame",
                    Ok(()),
                    end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode),
                )?;
            }
        }
    }
    Ok(())
}

/// Frame calls once the session has been ended.
pub fn frame_calls_after_session_ends(case: &mut CaseReport, helper: &mut CompositionHelper) -> Result<()> {
    helper.begin_session()?;
    let runtime = helper.runtime().clone();

    runtime.request_exit_session().call("xrRequestExitSession")?;
    let mut iterator = FrameIterator::new(runtime.clone(), helper.options())?;
    match iterator.run_to_session_state(SessionState::Stopping, STOPPING_TIMEOUT) {
        RunResult::Success => {}
        RunResult::Timeout => {
            case.require(false, "session reaches STOPPING after an exit request")?;
        }
        RunResult::Error => {
            if let Some(error) = iterator.take_error() {
                return Err(error);
            }
            case.require(false, "frames submit while the session stops")?;
        }
    }
    drop(iterator);

    runtime.end_session().call("xrEndSession")?;
    case.check_eq("xrWaitFrame", Err(Error::SessionNotRunning), waited(&*runtime));
    case.check_eq("xrBeginFrame", Err(Error::SessionNotRunning), runtime.begin_frame());
    Ok(())
}

/// Predicted display times strictly increase from one wait to the next.
pub fn display_times_increase(
    case: &mut CaseReport,
    helper: &mut CompositionHelper,
    frame_count: usize,
) -> Result<()> {
    helper.begin_session()?;
    let runtime = helper.runtime().clone();
    let blend_mode = helper.options().environment_blend_mode;

    let mut last: Option<Time> = None;
    for _ in 0..frame_count {
        let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
        if let Some(last) = last {
            if frame_state.predicted_display_time <= last {
                warn!(
                    "predicted display time {:?} does not follow {:?}",
                    frame_state.predicted_display_time, last
                );
            }
            case.check(
                frame_state.predicted_display_time > last,
                "predicted display time increases every frame",
            );
        }
        last = Some(frame_state.predicted_display_time);
        runtime.begin_frame().call("xrBeginFrame")?;
        end_without_layers(&*runtime, frame_state.predicted_display_time, blend_mode).call("xrEndFrame")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::graphics::software::SoftwarePlugin;
    use crate::headless::HeadlessInit;
    use crate::headless::HeadlessRuntime;
    use crate::ConformanceOptions;
    use crate::Report;

    use std::sync::Arc;

    fn helper_with(init: HeadlessInit) -> CompositionHelper {
        CompositionHelper::new(
            "Frame submission",
            Arc::new(HeadlessRuntime::new(init)),
            Box::new(SoftwarePlugin::new()),
            ConformanceOptions::default(),
        )
        .unwrap()
    }

    fn helper() -> CompositionHelper {
        helper_with(HeadlessInit::default())
    }

    #[test]
    fn headless_runtime_follows_the_frame_call_order() {
        let mut report = Report::new();
        assert!(report.run("before begin", |case| frame_calls_before_session_begins(
            case,
            &mut helper()
        )));
        assert!(report.run("call order", |case| frame_call_order(case, &mut helper())));
        assert!(report.run("after end", |case| frame_calls_after_session_ends(case, &mut helper())));
        assert!(report.passed(), "{:?}", report);
    }

    #[test]
    fn unsupported_blend_modes_are_refused() {
        let mut report = Report::new();
        let passed = report.run("end frame info", |case| {
            end_frame_info(
                case,
                &mut helper_with(HeadlessInit {
                    blend_modes: vec![EnvironmentBlendMode::Opaque, EnvironmentBlendMode::Additive],
                    ..Default::default()
                }),
            )
        });
        assert!(passed, "{:?}", report);
    }

    #[test]
    fn display_times_are_checked_every_frame() {
        let mut report = Report::new();
        assert!(report.run("display times", |case| display_times_increase(case, &mut helper(), 10)));
        assert!(report.cases[0].failures.is_empty());
    }
}
