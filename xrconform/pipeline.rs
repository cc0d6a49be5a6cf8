/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Pipelined frame submission timing.
//!
//! An app thread waits for frames and simulates a long simulation phase; the
//! calling thread begins, renders and ends them while the app thread already
//! waits for the next one. A runtime that lets these overlap sustains its
//! display rate; one that serializes the frame calls takes two periods per
//! frame.

use crate::error::RuntimeResultExt;
use crate::stopwatch::busy_wait;
use crate::CaseReport;
use crate::CompositionHelper;
use crate::HarnessError;
use crate::PipelineTimingConfig;
use crate::Result;
use crate::SimpleProjectionLayerHelper;
use crate::Stopwatch;
use crate::TimingResults;

use xrconform_api::FrameState;
use xrconform_api::RuntimeAPI;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;

use log::debug;
use log::error;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

const MS_PER_NS: f64 = 1e-6;

/// How a timing run missed its tolerances.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum TimingFailure {
    /// The frame calls were probably serialized.
    #[error(
        "Frame timing overhead in pipelined frame submission is too high \
         ({overhead:.3}, limit {max})"
    )]
    TooSlow { overhead: f64, max: f64 },

    /// Frames came faster than the predicted display period.
    #[error(
        "Frame timing overhead in pipelined frame submission is too low \
         ({overhead:.3}, limit {min})"
    )]
    TooFast { overhead: f64, min: f64 },

    #[error("xrBeginFrame blocked for {ratio:.3} of the display period (limit {max})")]
    BeginFrameBlocking { ratio: f64, max: f64 },
}

/// Sums collected over the measured frames.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineTotals {
    pub frame_count: u32,
    pub total_wait_time: Duration,
    pub total_display_period: Duration,
    pub total_begin_time: Duration,
    /// Wall clock from the first measured wait-frame to the last end-frame.
    pub frame_loop_time: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TimingStatistics {
    pub average_wait_time: Duration,
    pub average_app_frame_time: Duration,
    pub average_display_period: Duration,
    pub average_begin_time: Duration,
    /// Per-frame wall time over the display period, minus one. Zero is
    /// perfect pipelining at the display rate.
    pub overhead_factor: f64,
}

impl TimingStatistics {
    pub fn from_totals(totals: &PipelineTotals) -> TimingStatistics {
        let count = totals.frame_count.max(1);
        let average_app_frame_time = totals.frame_loop_time / count;
        let average_display_period = totals.total_display_period / count;
        let overhead_factor = if average_display_period == Duration::from_secs(0) {
            f64::INFINITY
        } else {
            average_app_frame_time.as_nanos() as f64 / average_display_period.as_nanos() as f64 - 1.
        };
        TimingStatistics {
            average_wait_time: totals.total_wait_time / count,
            average_app_frame_time,
            average_display_period,
            average_begin_time: totals.total_begin_time / count,
            overhead_factor,
        }
    }

    pub fn begin_ratio(&self) -> f64 {
        if self.average_display_period == Duration::from_secs(0) {
            return f64::INFINITY;
        }
        self.average_begin_time.as_nanos() as f64 / self.average_display_period.as_nanos() as f64
    }

    pub fn evaluate(&self, config: &PipelineTimingConfig) -> std::result::Result<(), TimingFailure> {
        if !(self.overhead_factor < config.max_overhead) {
            return Err(TimingFailure::TooSlow {
                overhead: self.overhead_factor,
                max: config.max_overhead,
            });
        }
        if !(self.overhead_factor > config.min_overhead) {
            return Err(TimingFailure::TooFast {
                overhead: self.overhead_factor,
                min: config.min_overhead,
            });
        }
        let ratio = self.begin_ratio();
        if !(ratio < config.max_begin_ratio) {
            return Err(TimingFailure::BeginFrameBlocking {
                ratio,
                max: config.max_begin_ratio,
            });
        }
        Ok(())
    }

    pub fn report_lines(&self) -> Vec<String> {
        let ms = |duration: Duration| duration.as_nanos() as f64 * MS_PER_NS;
        vec![
            format!("Average xrWaitFrame wait time    : {:.3}ms", ms(self.average_wait_time)),
            format!("Average time spent per frame     : {:.3}ms", ms(self.average_app_frame_time)),
            format!("Average predicted display period : {:.3}ms", ms(self.average_display_period)),
            format!("Average xrBeginFrame time        : {:.3}ms", ms(self.average_begin_time)),
            format!("Overhead score                   : {:.1}%", self.overhead_factor * 100.),
        ]
    }

    pub fn to_results(&self, test_name: &str) -> TimingResults {
        TimingResults {
            test_name: test_name.into(),
            average_wait_time: self.average_wait_time,
            average_app_frame_time: self.average_app_frame_time,
            average_display_period: self.average_display_period,
            average_begin_time: self.average_begin_time,
            overhead_factor: self.overhead_factor,
        }
    }
}

/// What the app thread hands to the render side.
enum Handoff {
    /// Warm-up is over; the stopwatch started with the first measured wait.
    MeasurementStarted(Stopwatch),
    Frame(FrameState),
}

struct AppTotals {
    total_wait_time: Duration,
    total_display_period: Duration,
}

fn scaled(period: Duration, fraction: f64) -> Duration {
    Duration::from_nanos((period.as_nanos() as f64 * fraction) as u64)
}

/// The app side: waits for frames, simulates work, queues them. Stops early
/// when the render side hangs up.
fn run_app_thread(
    runtime: Arc<dyn RuntimeAPI>,
    config: PipelineTimingConfig,
    sender: Sender<Handoff>,
) -> Result<AppTotals> {
    let mut totals = AppTotals {
        total_wait_time: Duration::from_secs(0),
        total_display_period: Duration::from_secs(0),
    };
    for _ in 0..config.warmup_frames {
        let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
        busy_wait(scaled(frame_state.predicted_display_period, config.wait_block_fraction));
        if sender.send(Handoff::Frame(frame_state)).is_err() {
            return Ok(totals);
        }
    }

    debug!("pipelined warm-up done after {} frames", config.warmup_frames);
    if sender.send(Handoff::MeasurementStarted(Stopwatch::started())).is_err() {
        return Ok(totals);
    }
    for _ in 0..config.measured_frames {
        let wait_timer = Stopwatch::started();
        let frame_state = runtime.wait_frame().call("xrWaitFrame")?;
        totals.total_wait_time += wait_timer.elapsed();
        totals.total_display_period += frame_state.predicted_display_period;
        busy_wait(scaled(frame_state.predicted_display_period, config.wait_block_fraction));
        if sender.send(Handoff::Frame(frame_state)).is_err() {
            break;
        }
    }
    // Dropping the sender tells the render side no more frames are coming.
    Ok(totals)
}

struct RenderTotals {
    total_begin_time: Duration,
    frame_loop: Stopwatch,
}

/// The render side: begins, renders and ends every queued frame, in order,
/// until the app side hangs up and the queue is drained.
fn run_render_side(
    helper: &mut CompositionHelper,
    projection: &SimpleProjectionLayerHelper,
    config: &PipelineTimingConfig,
    receiver: Receiver<Handoff>,
) -> Result<RenderTotals> {
    let runtime = helper.runtime().clone();
    let mut totals = RenderTotals {
        total_begin_time: Duration::from_secs(0),
        frame_loop: Stopwatch::new(),
    };
    let mut measuring = false;
    for handoff in receiver {
        let frame_state = match handoff {
            Handoff::MeasurementStarted(stopwatch) => {
                totals.frame_loop = stopwatch;
                measuring = true;
                continue;
            }
            Handoff::Frame(frame_state) => frame_state,
        };

        let begin_timer = Stopwatch::started();
        runtime.begin_frame().call("xrBeginFrame")?;
        if measuring {
            totals.total_begin_time += begin_timer.elapsed();
        }

        let render_timer = Stopwatch::started();
        projection.update_projection_layer(helper, &frame_state)?;
        let remaining = scaled(frame_state.predicted_display_period, config.render_block_fraction)
            .checked_sub(render_timer.elapsed());
        if let Some(remaining) = remaining {
            busy_wait(remaining);
        }
        helper.end_frame(frame_state.predicted_display_time, &[projection.layer()])?;
    }
    totals.frame_loop.stop();
    Ok(totals)
}

/// Runs the warm-up and measured frames on a begun session and returns the
/// measured statistics. Frame calls run concurrently on two threads.
pub fn run_pipelined_frames(
    helper: &mut CompositionHelper,
    projection: &SimpleProjectionLayerHelper,
    config: &PipelineTimingConfig,
) -> Result<TimingStatistics> {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let runtime = helper.runtime().clone();
    let app_config = *config;
    let app_thread = thread::spawn(move || run_app_thread(runtime, app_config, sender));

    let render_result = run_render_side(helper, projection, config, receiver);
    if let Err(ref e) = render_result {
        error!("pipelined render side failed: {}", e);
    }
    // The receiver is gone by now, so the app thread stops at its next send.
    let app_result = app_thread
        .join()
        .unwrap_or(Err(HarnessError::ThreadPanicked("pipelined app")));
    let render = render_result?;
    let app = app_result?;

    Ok(TimingStatistics::from_totals(&PipelineTotals {
        frame_count: config.measured_frames,
        total_wait_time: app.total_wait_time,
        total_display_period: app.total_display_period,
        total_begin_time: render.total_begin_time,
        frame_loop_time: render.frame_loop.elapsed(),
    }))
}

/// The timed pipelined frame submission case: renders a simple projection
/// layer while the app thread spends most of each period simulating.
pub fn timed_pipelined_frame_submission(
    case: &mut CaseReport,
    helper: &mut CompositionHelper,
    config: &PipelineTimingConfig,
) -> Result<TimingStatistics> {
    helper.interaction_manager().attach_action_sets()?;
    helper.begin_session()?;
    let projection = SimpleProjectionLayerHelper::new(helper)?;

    let statistics = run_pipelined_frames(helper, &projection, config)?;
    for line in statistics.report_lines() {
        case.line(line);
    }
    case.record_timing(statistics.to_results(&case.name));
    statistics.evaluate(config)?;
    Ok(statistics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(loop_ms: u64, period_ms: u64, begin_ms: u64) -> PipelineTotals {
        PipelineTotals {
            frame_count: 100,
            total_wait_time: Duration::from_millis(100),
            total_display_period: Duration::from_millis(period_ms * 100),
            total_begin_time: Duration::from_millis(begin_ms * 100),
            frame_loop_time: Duration::from_millis(loop_ms * 100),
        }
    }

    #[test]
    fn averages_divide_by_the_frame_count() {
        let statistics = TimingStatistics::from_totals(&totals(11, 11, 0));
        assert_eq!(statistics.average_wait_time, Duration::from_millis(1));
        assert_eq!(statistics.average_app_frame_time, Duration::from_millis(11));
        assert_eq!(statistics.average_display_period, Duration::from_millis(11));
        assert!(statistics.overhead_factor.abs() < 1e-9);
    }

    #[test]
    fn pipelined_runs_pass() {
        let statistics = TimingStatistics::from_totals(&totals(12, 11, 0));
        assert_eq!(statistics.evaluate(&PipelineTimingConfig::default()), Ok(()));
    }

    #[test]
    fn serialized_runs_are_too_slow() {
        let statistics = TimingStatistics::from_totals(&totals(22, 11, 0));
        assert!((statistics.overhead_factor - 1.).abs() < 1e-9);
        match statistics.evaluate(&PipelineTimingConfig::default()) {
            Err(failure @ TimingFailure::TooSlow { .. }) => assert!(failure
                .to_string()
                .starts_with("Frame timing overhead in pipelined frame submission is too high")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unthrottled_runs_are_too_fast() {
        let statistics = TimingStatistics::from_totals(&totals(5, 11, 0));
        assert!(matches!(
            statistics.evaluate(&PipelineTimingConfig::default()),
            Err(TimingFailure::TooFast { .. })
        ));
    }

    #[test]
    fn blocking_begin_frame_fails() {
        let statistics = TimingStatistics::from_totals(&totals(11, 11, 2));
        match statistics.evaluate(&PipelineTimingConfig::default()) {
            Err(TimingFailure::BeginFrameBlocking { ratio, max }) => {
                assert!((ratio - 2. / 11.).abs() < 1e-9);
                assert_eq!(max, 0.1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_display_period_never_passes() {
        let statistics = TimingStatistics::from_totals(&totals(11, 0, 0));
        assert!(statistics.evaluate(&PipelineTimingConfig::default()).is_err());
    }

    #[test]
    fn report_lines_use_milliseconds_and_percent() {
        let lines = TimingStatistics::from_totals(&totals(22, 11, 0)).report_lines();
        assert_eq!(lines[0], "Average xrWaitFrame wait time    : 1.000ms");
        assert_eq!(lines[1], "Average time spent per frame     : 22.000ms");
        assert_eq!(lines[2], "Average predicted display period : 11.000ms");
        assert_eq!(lines[4], "Overhead score                   : 100.0%");
    }
}
