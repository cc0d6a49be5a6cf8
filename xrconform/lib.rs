/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! This crate drives an XR runtime through its session, frame and composition
//! layer lifecycle and checks the result codes and frame timing it reports.

mod composition;
mod error;
mod event_reader;
pub mod frame_submission;
pub mod graphics;
mod interactive;
mod options;
pub mod pipeline;
mod render_loop;
mod report;
mod stopwatch;

#[cfg(feature = "headless")]
pub mod headless;

pub use composition::CompositionHelper;
pub use composition::InteractionManager;
pub use composition::LayerId;
pub use composition::SimpleProjectionLayerHelper;
pub use composition::MIN_COMPOSITION_LAYERS_SUPPORTED;

pub use error::HarnessError;
pub use error::Result;

pub use event_reader::EventQueue;
pub use event_reader::EventReader;

pub use interactive::InteractiveLayerManager;
pub use interactive::LayerMode;

pub use options::ConformanceOptions;
pub use options::PipelineTimingConfig;

pub use pipeline::TimingFailure;
pub use pipeline::TimingStatistics;

pub use render_loop::FrameIterator;
pub use render_loop::RenderLoop;
pub use render_loop::RenderLoopThread;
pub use render_loop::RunResult;
pub use render_loop::TickResult;

pub use report::CaseReport;
pub use report::Report;
pub use report::TimingResults;

pub use stopwatch::busy_wait;
pub use stopwatch::wait_until_predicate_with_timeout;
pub use stopwatch::CountdownTimer;
pub use stopwatch::Stopwatch;
