/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Composition layers, the declarative description of what the runtime
//! should composite for a frame.

use crate::Fov;
use crate::Pose;
use crate::Reference;
use crate::SpaceId;
use crate::SwapchainSubImage;

use euclid::RigidTransform3D;
use euclid::Size2D;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct CompositionLayerFlags: u32 {
        const CORRECT_CHROMATIC_ABERRATION = 0x1;
        const BLEND_TEXTURE_SOURCE_ALPHA =   0x2;
        const UNPREMULTIPLIED_ALPHA =        0x4;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EyeVisibility {
    Both,
    Left,
    Right,
}

/// One view of a projection layer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ProjectionView {
    pub pose: Pose,
    pub fov: Fov,
    pub sub_image: Option<SwapchainSubImage>,
}

impl Default for ProjectionView {
    fn default() -> Self {
        ProjectionView {
            pose: RigidTransform3D::identity(),
            fov: Fov::default(),
            sub_image: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CompositionLayerProjection {
    pub layer_flags: CompositionLayerFlags,
    pub space: SpaceId,
    pub views: Vec<ProjectionView>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CompositionLayerQuad {
    pub layer_flags: CompositionLayerFlags,
    pub space: SpaceId,
    pub eye_visibility: EyeVisibility,
    pub sub_image: SwapchainSubImage,
    pub pose: Pose,
    /// Width and height of the quad in meters.
    pub size: Size2D<f32, Reference>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum CompositionLayer {
    Projection(CompositionLayerProjection),
    Quad(CompositionLayerQuad),
}

impl CompositionLayer {
    pub fn layer_flags(&self) -> CompositionLayerFlags {
        match *self {
            CompositionLayer::Projection(ref projection) => projection.layer_flags,
            CompositionLayer::Quad(ref quad) => quad.layer_flags,
        }
    }

    pub fn space(&self) -> SpaceId {
        match *self {
            CompositionLayer::Projection(ref projection) => projection.space,
            CompositionLayer::Quad(ref quad) => quad.space,
        }
    }

    /// Every swapchain region this layer samples from. A projection view
    /// without a sub-image yields `None`.
    pub fn sub_images(&self) -> Vec<Option<SwapchainSubImage>> {
        match *self {
            CompositionLayer::Projection(ref projection) => {
                projection.views.iter().map(|view| view.sub_image).collect()
            }
            CompositionLayer::Quad(ref quad) => vec![Some(quad.sub_image)],
        }
    }
}
