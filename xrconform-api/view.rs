/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! This crate uses `euclid`'s typed units to keep poses, viewports and layer
//! sizes from being mixed up.

use euclid::RigidTransform3D;
use euclid::Rotation3D;
use euclid::Vector3D;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The local coordinate space of a posed object (a view, a layer, a space origin).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Local {}

/// The coordinate space of a reference space created by the runtime.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Reference {}

/// Pixel coordinates within a swapchain image, from (0,0) to (w,h).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Viewport {}

/// A rigid pose, placing something local into a reference space.
pub type Pose = RigidTransform3D<f32, Local, Reference>;

pub fn pose_from_position(x: f32, y: f32, z: f32) -> Pose {
    RigidTransform3D::new(Rotation3D::identity(), Vector3D::new(x, y, z))
}

/// Field of view angles in radians. Left and down are normally negative.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    pub fn symmetric(horizontal: f32, vertical: f32) -> Fov {
        Fov {
            angle_left: -horizontal / 2.,
            angle_right: horizontal / 2.,
            angle_up: vertical / 2.,
            angle_down: -vertical / 2.,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ViewConfigurationType {
    PrimaryMono,
    PrimaryStereo,
}

impl ViewConfigurationType {
    pub fn view_count(self) -> usize {
        match self {
            ViewConfigurationType::PrimaryMono => 1,
            ViewConfigurationType::PrimaryStereo => 2,
        }
    }
}

/// Per-view recommendations for swapchain sizes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ViewConfigurationView {
    pub recommended_image_rect_width: u32,
    pub recommended_image_rect_height: u32,
    pub max_image_rect_width: u32,
    pub max_image_rect_height: u32,
    pub recommended_swapchain_sample_count: u32,
}

impl ViewConfigurationView {
    pub fn new(width: u32, height: u32) -> ViewConfigurationView {
        ViewConfigurationView {
            recommended_image_rect_width: width,
            recommended_image_rect_height: height,
            max_image_rect_width: width * 2,
            max_image_rect_height: height * 2,
            recommended_swapchain_sample_count: 1,
        }
    }
}

bitflags::bitflags! {
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct ViewStateFlags: u32 {
        const ORIENTATION_VALID =   0x1;
        const POSITION_VALID =      0x2;
        const ORIENTATION_TRACKED = 0x4;
        const POSITION_TRACKED =    0x8;
    }
}

impl ViewStateFlags {
    pub fn pose_valid(self) -> bool {
        self.contains(ViewStateFlags::ORIENTATION_VALID | ViewStateFlags::POSITION_VALID)
    }
}

/// A located view: where the eye is and what it sees.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct View {
    pub pose: Pose,
    pub fov: Fov,
}

impl Default for View {
    fn default() -> Self {
        View {
            pose: RigidTransform3D::identity(),
            fov: Fov::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ReferenceSpaceType {
    View,
    Local,
    Stage,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SpaceId(pub u64);
