/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The contract between the harness and a graphics backend.
//!
//! The harness never talks to a graphics API directly. Swapchain images
//! created by the runtime are registered with the backend, which then owns
//! whatever per-image state it needs; the harness refers to them only through
//! `SwapchainImage` values and generation-counted handles.

use crate::Color;
use crate::GltfModelHandle;
use crate::GltfModelInstanceHandle;
use crate::HandleError;
use crate::Local;
use crate::MeshHandle;
use crate::Pose;
use crate::ProjectionView;
use crate::RgbaImage;
use crate::SwapchainCreateInfo;
use crate::SwapchainId;
use crate::SwapchainImage;

use euclid::Point3D;
use euclid::Rotation3D;
use euclid::RigidTransform3D;
use euclid::Vector3D;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum GraphicsError {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("graphics plugin is not initialized")]
    NotInitialized,

    #[error("swapchain {0:?} has no images registered with the graphics plugin")]
    UnknownSwapchain(SwapchainId),

    #[error("image {index} of swapchain {swapchain:?} does not exist")]
    ImageOutOfRange { swapchain: SwapchainId, index: u32 },

    #[error("array slice {slice} is out of range")]
    SliceOutOfRange { slice: u32 },

    #[error("swapchain format {0} is not known to this graphics plugin")]
    UnknownFormat(i64),

    #[error("source image is {actual:?} but the swapchain is {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("projection view has no swapchain sub-image")]
    MissingSubImage,

    #[error("mesh index {index} refers past the {vertex_count} vertices")]
    InvalidMesh { index: u16, vertex_count: usize },

    #[error("glTF data could not be loaded: {0}")]
    InvalidGltf(String),
}

/// A cube drawn into projection views. The default scale is 0.25 meters.
#[derive(Clone, Copy, Debug)]
pub struct Cube {
    pub pose: Pose,
    pub scale: Vector3D<f32, Local>,
}

impl Cube {
    pub fn at(x: f32, y: f32, z: f32) -> Cube {
        Cube::with_scale(x, y, z, 0.25)
    }

    pub fn with_scale(x: f32, y: f32, z: f32, scale: f32) -> Cube {
        Cube {
            pose: RigidTransform3D::new(Rotation3D::identity(), Vector3D::new(x, y, z)),
            scale: Vector3D::new(scale, scale, scale),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshVertex {
    pub position: Point3D<f32, Local>,
    pub color: Color,
}

#[derive(Clone, Copy, Debug)]
pub struct MeshDrawable {
    pub handle: MeshHandle,
    pub pose: Pose,
    pub scale: Vector3D<f32, Local>,
}

#[derive(Clone, Copy, Debug)]
pub struct GltfDrawable {
    pub handle: GltfModelInstanceHandle,
    pub pose: Pose,
    pub scale: Vector3D<f32, Local>,
}

/// Everything drawn into one projection view.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderParams<'a> {
    pub cubes: &'a [Cube],
    pub meshes: &'a [MeshDrawable],
    pub gltfs: &'a [GltfDrawable],
}

impl<'a> RenderParams<'a> {
    pub fn cubes(cubes: &'a [Cube]) -> Self {
        RenderParams {
            cubes,
            ..Default::default()
        }
    }
}

/// A graphics backend. One implementation exists per graphics API and is
/// picked by name when the harness starts.
pub trait GraphicsPlugin: Send {
    fn initialize(&mut self) -> Result<(), GraphicsError>;

    fn is_initialized(&self) -> bool;

    /// Releases every resource. Handles issued before this become stale.
    fn shutdown(&mut self);

    fn describe_graphics(&self) -> String;

    /// Drops device-level resources, invalidating mesh and glTF handles.
    fn shutdown_device(&mut self);

    fn image_format_name(&self, format: i64) -> Option<&'static str>;

    fn is_image_format_known(&self, format: i64) -> bool {
        self.image_format_name(format).is_some()
    }

    /// Picks the preferred color format out of those the runtime offers.
    fn select_color_swapchain_format(&self, formats: &[i64]) -> Option<i64>;

    fn select_depth_swapchain_format(&self, formats: &[i64]) -> Option<i64>;

    fn rgba8_format(&self, srgb: bool) -> i64;

    /// Registers the images the runtime created for `swapchain`.
    fn allocate_swapchain_images(
        &mut self,
        swapchain: SwapchainId,
        image_count: u32,
        create_info: &SwapchainCreateInfo,
    ) -> Result<(), GraphicsError>;

    /// Pairs a depth swapchain with a color swapchain so that rendering into
    /// a color image also writes the matching depth image.
    fn set_depth_swapchain(
        &mut self,
        color: SwapchainId,
        depth: SwapchainId,
    ) -> Result<(), GraphicsError>;

    /// Forgets all swapchain image data, as after the runtime destroyed them.
    fn clear_swapchain_cache(&mut self);

    fn clear_image_slice(
        &mut self,
        image: SwapchainImage,
        array_index: u32,
        color: Color,
    ) -> Result<(), GraphicsError>;

    fn render_view(
        &mut self,
        view: &ProjectionView,
        image: SwapchainImage,
        format: i64,
        params: &RenderParams,
    ) -> Result<(), GraphicsError>;

    fn copy_rgba_image(
        &mut self,
        image: SwapchainImage,
        array_index: u32,
        source: &RgbaImage,
    ) -> Result<(), GraphicsError>;

    fn make_simple_mesh(
        &mut self,
        indices: &[u16],
        vertices: &[MeshVertex],
    ) -> Result<MeshHandle, GraphicsError>;

    fn load_gltf(&mut self, data: &[u8]) -> Result<GltfModelHandle, GraphicsError>;

    fn create_gltf_model_instance(
        &mut self,
        model: GltfModelHandle,
    ) -> Result<GltfModelInstanceHandle, GraphicsError>;
}
