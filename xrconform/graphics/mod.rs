/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Graphics backends, selected by name when the harness starts.

pub mod software;

use crate::HarnessError;
use crate::Result;

use xrconform_api::GraphicsPlugin;

/// Creates the named backend. It still needs to be initialized.
pub fn create_graphics_plugin(name: &str) -> Result<Box<dyn GraphicsPlugin>> {
    match &*name.to_ascii_lowercase() {
        "software" => Ok(Box::new(software::SoftwarePlugin::new())),
        _ => Err(HarnessError::UnsupportedGraphicsApi(name.into())),
    }
}
