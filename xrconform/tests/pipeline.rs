/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use xrconform::graphics::create_graphics_plugin;
use xrconform::headless::HeadlessInit;
use xrconform::headless::HeadlessRuntime;
use xrconform::pipeline::timed_pipelined_frame_submission;
use xrconform::CompositionHelper;
use xrconform::ConformanceOptions;
use xrconform::HarnessError;
use xrconform::PipelineTimingConfig;
use xrconform::Report;
use xrconform::TimingFailure;

use xrconform_api::ViewConfigurationView;

use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_views(init: HeadlessInit) -> HeadlessInit {
    HeadlessInit {
        views: vec![ViewConfigurationView::new(64, 64); 2],
        display_period: Duration::from_millis(20),
        ..init
    }
}

fn helper(init: HeadlessInit, options: ConformanceOptions) -> CompositionHelper {
    let graphics = create_graphics_plugin(&options.graphics_plugin).unwrap();
    CompositionHelper::new(
        "Timed pipelined frame submission",
        Arc::new(HeadlessRuntime::new(init)),
        graphics,
        options,
    )
    .unwrap()
}

fn relaxed() -> PipelineTimingConfig {
    PipelineTimingConfig {
        warmup_frames: 10,
        measured_frames: 40,
        max_overhead: 0.75,
        min_overhead: -0.5,
        max_begin_ratio: 0.5,
        ..Default::default()
    }
}

#[test]
fn pipelined_runtime_keeps_the_display_rate() {
    init_logging();
    let config = relaxed();
    let mut helper = helper(small_views(HeadlessInit::default()), ConformanceOptions::default());

    let mut report = Report::new();
    let passed = report.run("Timed pipelined frame submission", |case| {
        timed_pipelined_frame_submission(case, &mut helper, &config).map(|_| ())
    });
    assert!(passed, "{:?}", report);

    let case = &report.cases[0];
    assert_eq!(case.lines.len(), 5);
    assert!(case.lines[4].starts_with("Overhead score"));
    let timing = report.timing_results().next().unwrap();
    assert_eq!(timing.test_name, "Timed pipelined frame submission");
    assert_eq!(timing.average_display_period, Duration::from_millis(20));
}

#[test]
fn serialized_runtime_is_too_slow() {
    init_logging();
    let config = PipelineTimingConfig {
        warmup_frames: 5,
        measured_frames: 20,
        ..Default::default()
    };
    let mut helper = helper(
        small_views(HeadlessInit {
            serialize_frame_calls: true,
            ..Default::default()
        }),
        ConformanceOptions::default(),
    );

    let mut report = Report::new();
    let mut outcome = None;
    let passed = report.run("Timed pipelined frame submission", |case| {
        let result = timed_pipelined_frame_submission(case, &mut helper, &config);
        outcome = Some(result.as_ref().map(|_| ()).map_err(ToString::to_string));
        result.map(|_| ())
    });
    assert!(!passed);
    match outcome {
        Some(Err(message)) => assert!(
            message.starts_with("Frame timing overhead in pipelined frame submission is too high"),
            "{}",
            message
        ),
        other => panic!("unexpected {:?}", other),
    }
    // The numbers are reported even though the case failed.
    assert_eq!(report.cases[0].timing.len(), 1);
    assert!(report.cases[0].timing[0].overhead_factor > 0.5);
}

/// Runs the timed case and returns the timing failure it ended with.
fn timing_failure(init: HeadlessInit, config: PipelineTimingConfig) -> TimingFailure {
    let mut helper = helper(
        HeadlessInit {
            views: vec![ViewConfigurationView::new(64, 64); 2],
            display_period: Duration::from_millis(50),
            ..init
        },
        ConformanceOptions::default(),
    );
    let mut report = Report::new();
    let mut failure = None;
    let passed = report.run("Timed pipelined frame submission", |case| {
        match timed_pipelined_frame_submission(case, &mut helper, &config) {
            Err(HarnessError::TimingTolerance(timing)) => {
                failure = Some(timing.clone());
                Err(HarnessError::TimingTolerance(timing))
            }
            other => other.map(|_| ()),
        }
    });
    assert!(!passed, "{:?}", report);
    assert_eq!(report.cases[0].timing.len(), 1);
    failure.unwrap_or_else(|| panic!("no timing failure in {:?}", report))
}

#[test]
fn unthrottled_runtime_is_too_fast() {
    init_logging();
    let failure = timing_failure(
        HeadlessInit {
            throttle_wait_frame: false,
            ..Default::default()
        },
        PipelineTimingConfig {
            warmup_frames: 5,
            measured_frames: 20,
            wait_block_fraction: 0.1,
            render_block_fraction: 0.1,
            ..Default::default()
        },
    );
    match failure {
        TimingFailure::TooFast { overhead, min } => {
            assert!(overhead < -0.1, "{}", overhead);
            assert_eq!(min, -0.1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn slow_begin_frame_is_reported_as_blocking() {
    init_logging();
    let failure = timing_failure(
        HeadlessInit {
            begin_frame_delay: Duration::from_millis(15),
            ..Default::default()
        },
        PipelineTimingConfig {
            warmup_frames: 5,
            measured_frames: 10,
            // The wait result is handed over early enough that the delayed
            // begin-frame still lands before the next display slot.
            wait_block_fraction: 0.4,
            render_block_fraction: 0.2,
            ..Default::default()
        },
    );
    match failure {
        TimingFailure::BeginFrameBlocking { ratio, max } => {
            assert!(ratio >= 0.3, "{}", ratio);
            assert_eq!(max, 0.1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn failures_carry_the_timing_kind() {
    let error = HarnessError::from(TimingFailure::TooFast {
        overhead: -0.4,
        min: -0.1,
    });
    assert!(error
        .to_string()
        .starts_with("Frame timing overhead in pipelined frame submission is too low"));
}

#[test]
#[ignore]
fn pipelined_runtime_meets_strict_tolerances() {
    init_logging();
    let options = ConformanceOptions::from_env().unwrap();
    let config = options.pipeline;
    let mut helper = helper(HeadlessInit::default(), options);

    let mut report = Report::new();
    let passed = report.run("Timed pipelined frame submission", |case| {
        timed_pipelined_frame_submission(case, &mut helper, &config).map(|_| ())
    });
    assert!(passed, "{:?}", report);
}
