/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use xrconform::frame_submission;
use xrconform::graphics::create_graphics_plugin;
use xrconform::headless::spawn_message_loop;
use xrconform::headless::HeadlessInit;
use xrconform::headless::HeadlessMsg;
use xrconform::headless::HeadlessRuntime;
use xrconform::CaseReport;
use xrconform::CompositionHelper;
use xrconform::ConformanceOptions;
use xrconform::FrameIterator;
use xrconform::HarnessError;
use xrconform::InteractiveLayerManager;
use xrconform::RenderLoop;
use xrconform::Report;
use xrconform::Result;
use xrconform::RunResult;
use xrconform::SimpleProjectionLayerHelper;

use xrconform_api::Color;
use xrconform_api::EnvironmentBlendMode;
use xrconform_api::FrameState;
use xrconform_api::RuntimeAPI;
use xrconform_api::SessionState;

use euclid::RigidTransform3D;
use euclid::Vector3D;

use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn helper_for(name: &str, init: HeadlessInit) -> (Arc<HeadlessRuntime>, CompositionHelper) {
    let options = ConformanceOptions::default();
    let runtime = Arc::new(HeadlessRuntime::new(init));
    let graphics = create_graphics_plugin(&options.graphics_plugin).unwrap();
    let helper = CompositionHelper::new(name, runtime.clone(), graphics, options).unwrap();
    (runtime, helper)
}

fn run_case<F>(report: &mut Report, name: &str, case_fn: F) -> bool
where
    F: FnOnce(&mut CaseReport, &mut CompositionHelper) -> Result<()>,
{
    let (_, mut helper) = helper_for(name, HeadlessInit::default());
    report.run(name, |case| case_fn(case, &mut helper))
}

#[test]
fn frame_submission_suite_passes_on_the_headless_runtime() {
    init_logging();
    let mut report = Report::new();
    run_case(
        &mut report,
        "Frame calls before xrBeginSession",
        frame_submission::frame_calls_before_session_begins,
    );
    run_case(&mut report, "Frame call order", frame_submission::frame_call_order);
    run_case(&mut report, "xrEndFrame info", frame_submission::end_frame_info);
    run_case(
        &mut report,
        "Frame calls after xrEndSession",
        frame_submission::frame_calls_after_session_ends,
    );
    run_case(&mut report, "Predicted display times", |case, helper| {
        frame_submission::display_times_increase(case, helper, 20)
    });
    assert!(report.passed(), "{:?}", report);
    assert_eq!(report.cases.len(), 5);
}

#[test]
fn every_blend_mode_is_accepted_when_advertised() {
    let mut report = Report::new();
    let (_, mut helper) = helper_for(
        "xrEndFrame info",
        HeadlessInit {
            blend_modes: EnvironmentBlendMode::ALL.to_vec(),
            ..Default::default()
        },
    );
    assert!(report.run("xrEndFrame info", |case| frame_submission::end_frame_info(
        case,
        &mut helper
    )));
}

#[test]
fn lost_session_ends_the_case_with_the_runtime_error() {
    let mut report = Report::new();
    let (runtime, mut helper) = helper_for("Lost session", HeadlessInit::default());
    runtime.handle_msg(HeadlessMsg::LoseSession);
    assert!(!report.run("Lost session", |case| frame_submission::display_times_increase(
        case,
        &mut helper,
        3
    )));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "Lost session");
}

#[test]
fn projection_layer_renders_through_the_render_loop() {
    init_logging();
    let (runtime, mut helper) = helper_for("Projection", HeadlessInit::default());
    helper.begin_session().unwrap();
    let projection = SimpleProjectionLayerHelper::new(&mut helper).unwrap();

    let mut frames = 0;
    let mut render_loop = RenderLoop::new(runtime.clone(), |frame_state: &FrameState| {
        projection.update_projection_layer(&mut helper, frame_state)?;
        helper.end_frame(frame_state.predicted_display_time, &[projection.layer()])?;
        frames += 1;
        Ok(frames < 5)
    });
    render_loop.run().unwrap();
    let last_time = render_loop.last_predicted_display_time();
    drop(render_loop);

    assert_eq!(runtime.submitted_frames(), 5);
    let submitted = runtime.last_submitted_frame().unwrap();
    assert_eq!(submitted.display_time, last_time);
    // The projection layer and the title quad.
    assert_eq!(submitted.layers.len(), 2);
}

#[test]
fn operator_passes_an_interactive_case() {
    init_logging();
    let (runtime, mut helper) = helper_for("Quad", HeadlessInit::default());
    let mut manager = InteractiveLayerManager::new(&mut helper, None, "A red square in front of you").unwrap();
    let swapchain = helper.create_static_swapchain_solid_color(Color::RED).unwrap();
    let view_space = helper.view_space();
    let quad = helper
        .create_quad_layer(
            swapchain,
            view_space,
            0.5,
            RigidTransform3D::from_translation(Vector3D::new(0., 0., -2.)),
        )
        .unwrap();
    manager.add_layer(quad);
    helper.interaction_manager().attach_action_sets().unwrap();
    helper.begin_session().unwrap();

    let (sender, receiver) = crossbeam_channel::unbounded();
    let message_loop = spawn_message_loop(runtime.clone(), receiver);

    let mut frames = 0;
    let mut render_loop = RenderLoop::new(runtime.clone(), |frame_state: &FrameState| {
        frames += 1;
        if frames == 3 {
            let _ = sender.send(HeadlessMsg::PressSelect);
        }
        if frames > 300 {
            return Err(HarnessError::Timeout {
                what: "operator input",
                timeout: Duration::from_secs(3),
            });
        }
        manager.end_frame(&mut helper, frame_state, &[])
    });
    render_loop.run().unwrap();
    drop(render_loop);

    sender.send(HeadlessMsg::Quit).unwrap();
    message_loop.join().unwrap();
    assert!(runtime.submitted_frames() >= 3);
}

#[test]
fn frame_iterator_drives_a_session_to_stopping() {
    let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit::default()));
    let options = ConformanceOptions::default();
    let mut iterator = FrameIterator::new(runtime.clone(), &options).unwrap();

    assert_eq!(
        iterator.run_to_session_state(SessionState::Focused, Duration::from_secs(5)),
        RunResult::Success
    );
    runtime.request_exit_session().unwrap();
    assert_eq!(
        iterator.run_to_session_state(SessionState::Stopping, Duration::from_secs(5)),
        RunResult::Success
    );
    drop(iterator);
    runtime.end_session().unwrap();
    assert_eq!(runtime.session_state(), SessionState::Exiting);
}
