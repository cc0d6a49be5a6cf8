/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::CompositionLayer;
use crate::Time;

use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The per-frame timing data returned by a successful wait-frame call.
///
/// Each frame state is consumed by exactly one begin-frame/end-frame pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct FrameState {
    pub predicted_display_time: Time,
    pub predicted_display_period: Duration,
    pub should_render: bool,
}

/// The successful outcomes of begin-frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FrameBegin {
    Success,
    /// The previously begun frame was never ended and has been dropped,
    /// or the wait result it was paired with was superseded.
    FrameDiscarded,
}

/// How the rendered frame is combined with the physical environment.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EnvironmentBlendMode {
    Opaque,
    Additive,
    AlphaBlend,
}

impl EnvironmentBlendMode {
    pub const ALL: [EnvironmentBlendMode; 3] = [
        EnvironmentBlendMode::Opaque,
        EnvironmentBlendMode::Additive,
        EnvironmentBlendMode::AlphaBlend,
    ];
}

/// The arguments to end-frame. A `None` entry in `layers` is a null layer
/// pointer, which a conforming runtime must reject.
#[derive(Clone, Copy, Debug)]
pub struct FrameEndInfo<'a> {
    pub display_time: Time,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub layers: &'a [Option<&'a CompositionLayer>],
}

impl<'a> FrameEndInfo<'a> {
    pub fn new(display_time: Time, environment_blend_mode: EnvironmentBlendMode) -> Self {
        FrameEndInfo {
            display_time,
            environment_blend_mode,
            layers: &[],
        }
    }

    pub fn with_layers(self, layers: &'a [Option<&'a CompositionLayer>]) -> Self {
        FrameEndInfo { layers, ..self }
    }
}
