/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::HarnessError;
use crate::Result;

use xrconform_api::EnvironmentBlendMode;
use xrconform_api::ViewConfigurationType;

use std::env;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Frame counts, simulated thread loads and pass bounds of the pipelined
/// frame timing measurement.
///
/// The bounds are empirical and may need recalibration on slow machines.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PipelineTimingConfig {
    pub warmup_frames: u32,
    pub measured_frames: u32,
    /// Fraction of the display period the app thread spends after wait-frame.
    pub wait_block_fraction: f64,
    /// Fraction of the display period the render thread spends between
    /// begin-frame and end-frame.
    pub render_block_fraction: f64,
    pub max_overhead: f64,
    pub min_overhead: f64,
    pub max_begin_ratio: f64,
}

impl Default for PipelineTimingConfig {
    fn default() -> Self {
        PipelineTimingConfig {
            warmup_frames: 180,
            measured_frames: 200,
            wait_block_fraction: 0.90,
            render_block_fraction: 0.70,
            max_overhead: 0.5,
            min_overhead: -0.1,
            max_begin_ratio: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ConformanceOptions {
    pub graphics_plugin: String,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub view_configuration: ViewConfigurationType,
    /// Bound on xrWaitSwapchainImage.
    pub image_wait_timeout: Duration,
    pub session_ready_timeout: Duration,
    pub poll_interval: Duration,
    pub pipeline: PipelineTimingConfig,
}

impl Default for ConformanceOptions {
    fn default() -> Self {
        ConformanceOptions {
            graphics_plugin: "software".into(),
            environment_blend_mode: EnvironmentBlendMode::Opaque,
            view_configuration: ViewConfigurationType::PrimaryStereo,
            image_wait_timeout: Duration::from_secs(1),
            session_ready_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(10),
            pipeline: PipelineTimingConfig::default(),
        }
    }
}

impl ConformanceOptions {
    /// Defaults overridden by `XRCONFORM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ConformanceOptions::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = ConformanceOptions::default();
        if let Some(plugin) = lookup("XRCONFORM_GRAPHICS_PLUGIN") {
            options.graphics_plugin = plugin;
        }
        if let Some(mode) = lookup("XRCONFORM_BLEND_MODE") {
            options.environment_blend_mode = parse_blend_mode(&mode)?;
        }
        if let Some(config) = lookup("XRCONFORM_VIEW_CONFIGURATION") {
            options.view_configuration = match &*config.to_ascii_lowercase() {
                "mono" | "primary_mono" => ViewConfigurationType::PrimaryMono,
                "stereo" | "primary_stereo" => ViewConfigurationType::PrimaryStereo,
                _ => return Err(invalid("XRCONFORM_VIEW_CONFIGURATION", &config)),
            };
        }
        if let Some(frames) = lookup("XRCONFORM_WARMUP_FRAMES") {
            options.pipeline.warmup_frames = parse("XRCONFORM_WARMUP_FRAMES", &frames)?;
        }
        if let Some(frames) = lookup("XRCONFORM_MEASURED_FRAMES") {
            options.pipeline.measured_frames = parse("XRCONFORM_MEASURED_FRAMES", &frames)?;
        }
        if let Some(bound) = lookup("XRCONFORM_MAX_OVERHEAD") {
            options.pipeline.max_overhead = parse("XRCONFORM_MAX_OVERHEAD", &bound)?;
        }
        if let Some(bound) = lookup("XRCONFORM_MIN_OVERHEAD") {
            options.pipeline.min_overhead = parse("XRCONFORM_MIN_OVERHEAD", &bound)?;
        }
        Ok(options)
    }
}

fn parse_blend_mode(value: &str) -> Result<EnvironmentBlendMode> {
    match &*value.to_ascii_lowercase() {
        "opaque" => Ok(EnvironmentBlendMode::Opaque),
        "additive" => Ok(EnvironmentBlendMode::Additive),
        "alpha_blend" | "alphablend" => Ok(EnvironmentBlendMode::AlphaBlend),
        _ => Err(invalid("XRCONFORM_BLEND_MODE", value)),
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &'static str, value: &str) -> HarnessError {
    HarnessError::InvalidOption {
        name,
        value: value.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn options(vars: &[(&str, &str)]) -> Result<ConformanceOptions> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConformanceOptions::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_the_calibrated_constants() {
        let options = options(&[]).unwrap();
        assert_eq!(options, ConformanceOptions::default());
        assert_eq!(options.pipeline.warmup_frames, 180);
        assert_eq!(options.pipeline.measured_frames, 200);
        assert_eq!(options.graphics_plugin, "software");
    }

    #[test]
    fn environment_overrides_apply() {
        let options = options(&[
            ("XRCONFORM_BLEND_MODE", "Additive"),
            ("XRCONFORM_VIEW_CONFIGURATION", "mono"),
            ("XRCONFORM_WARMUP_FRAMES", "10"),
            ("XRCONFORM_MAX_OVERHEAD", "0.75"),
        ])
        .unwrap();
        assert_eq!(options.environment_blend_mode, EnvironmentBlendMode::Additive);
        assert_eq!(options.view_configuration, ViewConfigurationType::PrimaryMono);
        assert_eq!(options.pipeline.warmup_frames, 10);
        assert_eq!(options.pipeline.max_overhead, 0.75);
        assert_eq!(options.pipeline.measured_frames, 200);
    }

    #[test]
    fn malformed_values_are_reported() {
        match options(&[("XRCONFORM_MEASURED_FRAMES", "many")]) {
            Err(HarnessError::InvalidOption { name, value }) => {
                assert_eq!(name, "XRCONFORM_MEASURED_FRAMES");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
