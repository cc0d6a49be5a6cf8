/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A CPU graphics backend.
//!
//! Swapchain images live in memory as `RgbaImage`s (or depth buffers), and
//! drawables are rendered as flat, depth-sorted squares at their projected
//! positions. That is enough to check that content lands in the right view
//! and sub-image without any graphics API.

use xrconform_api::Color;
use xrconform_api::GltfModel;
use xrconform_api::GltfModelHandle;
use xrconform_api::GltfModelInstance;
use xrconform_api::GltfModelInstanceHandle;
use xrconform_api::GraphicsError;
use xrconform_api::GraphicsPlugin;
use xrconform_api::Handle;
use xrconform_api::HandleVec;
use xrconform_api::Mesh;
use xrconform_api::MeshHandle;
use xrconform_api::MeshVertex;
use xrconform_api::ProjectionView;
use xrconform_api::Reference;
use xrconform_api::RenderParams;
use xrconform_api::RgbaImage;
use xrconform_api::SwapchainCreateInfo;
use xrconform_api::SwapchainId;
use xrconform_api::SwapchainImage;
use xrconform_api::SwapchainUsageFlags;
use xrconform_api::Viewport;

use euclid::Rect;
use euclid::Vector3D;

use log::debug;

use std::collections::HashMap;

/// Image formats, numbered like their OpenGL internal formats.
pub const RGBA8: i64 = 0x8058;
pub const SRGB8_ALPHA8: i64 = 0x8C43;
pub const DEPTH_COMPONENT32F: i64 = 0x8CAC;

const BACKGROUND: Color = Color::new(0.184, 0.31, 0.31, 1.);
const PALETTE: [Color; 4] = [Color::RED, Color::GREEN, Color::BLUE, Color::YELLOW];
const NEAR: f32 = 0.05;
/// Depth images hold normalized depth: 0 at the near plane, 1 at infinity.
const FAR_DEPTH: f32 = 1.;

fn normalized_depth(distance: f32) -> f32 {
    1. - NEAR / distance
}

/// Marker for handles into the swapchain image data collection.
pub enum SwapchainData {}

enum ImageSlice {
    Color(RgbaImage),
    Depth(Vec<f32>),
}

/// Everything the backend keeps for one runtime swapchain.
struct SwapchainImageData {
    create_info: SwapchainCreateInfo,
    image_count: u32,
    /// Indexed by image, then by array slice.
    images: Vec<Vec<ImageSlice>>,
    depth_swapchain: Option<SwapchainId>,
    /// The depth image each rendered color image was paired with.
    depth_for_color: HashMap<u32, u32>,
}

impl SwapchainImageData {
    fn new(create_info: SwapchainCreateInfo, image_count: u32) -> SwapchainImageData {
        let (width, height) = (create_info.width, create_info.height);
        let depth = create_info
            .usage_flags
            .contains(SwapchainUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        let images = (0..image_count)
            .map(|_| {
                (0..create_info.array_size)
                    .map(|_| {
                        if depth {
                            ImageSlice::Depth(vec![FAR_DEPTH; (width * height) as usize])
                        } else {
                            ImageSlice::Color(RgbaImage::new(width, height))
                        }
                    })
                    .collect()
            })
            .collect();
        SwapchainImageData {
            create_info,
            image_count,
            images,
            depth_swapchain: None,
            depth_for_color: HashMap::new(),
        }
    }

    fn is_depth(&self) -> bool {
        self.create_info
            .usage_flags
            .contains(SwapchainUsageFlags::DEPTH_STENCIL_ATTACHMENT)
    }

    fn slice(&self, image: SwapchainImage, slice: u32) -> Result<&ImageSlice, GraphicsError> {
        self.images
            .get(image.index as usize)
            .ok_or(GraphicsError::ImageOutOfRange {
                swapchain: image.swapchain,
                index: image.index,
            })?
            .get(slice as usize)
            .ok_or(GraphicsError::SliceOutOfRange { slice })
    }

    fn slice_mut(&mut self, image: SwapchainImage, slice: u32) -> Result<&mut ImageSlice, GraphicsError> {
        self.images
            .get_mut(image.index as usize)
            .ok_or(GraphicsError::ImageOutOfRange {
                swapchain: image.swapchain,
                index: image.index,
            })?
            .get_mut(slice as usize)
            .ok_or(GraphicsError::SliceOutOfRange { slice })
    }
}

struct SimpleMesh {
    vertices: Vec<MeshVertex>,
}

struct GltfModelData {
    node_count: usize,
    mesh_count: usize,
}

struct GltfInstanceData {
    model: GltfModelHandle,
}

/// A drawable reduced to a square facing the viewer.
struct ProjectedSquare {
    rect: Rect<i32, Viewport>,
    depth: f32,
    color: Color,
}

pub struct SoftwarePlugin {
    initialized: bool,
    swapchain_images: HandleVec<SwapchainImageData, SwapchainData>,
    swapchains: HashMap<SwapchainId, Handle<SwapchainData>>,
    meshes: HandleVec<SimpleMesh, Mesh>,
    gltf_models: HandleVec<GltfModelData, GltfModel>,
    gltf_instances: HandleVec<GltfInstanceData, GltfModelInstance>,
}

impl Default for SoftwarePlugin {
    fn default() -> Self {
        SoftwarePlugin::new()
    }
}

impl SoftwarePlugin {
    pub fn new() -> SoftwarePlugin {
        SoftwarePlugin {
            initialized: false,
            swapchain_images: HandleVec::new(),
            swapchains: HashMap::new(),
            meshes: HandleVec::new(),
            gltf_models: HandleVec::new(),
            gltf_instances: HandleVec::new(),
        }
    }

    pub fn read_pixel(
        &self,
        image: SwapchainImage,
        array_index: u32,
        x: u32,
        y: u32,
    ) -> Result<Option<[u8; 4]>, GraphicsError> {
        match *self.image_data(image.swapchain)?.slice(image, array_index)? {
            ImageSlice::Color(ref rgba) => Ok(rgba.pixel(x, y)),
            ImageSlice::Depth(..) => Ok(None),
        }
    }

    pub fn read_depth(
        &self,
        image: SwapchainImage,
        array_index: u32,
        x: u32,
        y: u32,
    ) -> Result<Option<f32>, GraphicsError> {
        let data = self.image_data(image.swapchain)?;
        let width = data.create_info.width;
        match *data.slice(image, array_index)? {
            ImageSlice::Depth(ref depth) if x < width => Ok(depth.get((y * width + x) as usize).copied()),
            _ => Ok(None),
        }
    }

    /// The depth image paired with a color image by its last render.
    pub fn depth_image_for(&self, color: SwapchainImage) -> Result<Option<SwapchainImage>, GraphicsError> {
        let data = self.image_data(color.swapchain)?;
        Ok(data.depth_swapchain.and_then(|swapchain| {
            data.depth_for_color
                .get(&color.index)
                .map(|&index| SwapchainImage { swapchain, index })
        }))
    }

    pub fn gltf_node_count(&self, instance: GltfModelInstanceHandle) -> Result<usize, GraphicsError> {
        let model = self.gltf_instances.get(instance)?.model;
        Ok(self.gltf_models.get(model)?.node_count)
    }

    fn check_initialized(&self) -> Result<(), GraphicsError> {
        if self.initialized {
            Ok(())
        } else {
            Err(GraphicsError::NotInitialized)
        }
    }

    fn image_data(&self, swapchain: SwapchainId) -> Result<&SwapchainImageData, GraphicsError> {
        let handle = *self
            .swapchains
            .get(&swapchain)
            .ok_or(GraphicsError::UnknownSwapchain(swapchain))?;
        Ok(self.swapchain_images.get(handle)?)
    }

    fn image_data_mut(&mut self, swapchain: SwapchainId) -> Result<&mut SwapchainImageData, GraphicsError> {
        let handle = *self
            .swapchains
            .get(&swapchain)
            .ok_or(GraphicsError::UnknownSwapchain(swapchain))?;
        Ok(self.swapchain_images.get_mut(handle)?)
    }

    fn project_params(
        &self,
        view: &ProjectionView,
        rect: Rect<i32, Viewport>,
        params: &RenderParams,
    ) -> Result<Vec<ProjectedSquare>, GraphicsError> {
        let mut squares = vec![];
        for (i, cube) in params.cubes.iter().enumerate() {
            squares.extend(project(view, rect, cube.pose.translation, cube.scale.x, PALETTE[i % PALETTE.len()]));
        }
        for mesh in params.meshes {
            let color = self
                .meshes
                .get(mesh.handle)?
                .vertices
                .first()
                .map_or(Color::WHITE, |vertex| vertex.color);
            squares.extend(project(view, rect, mesh.pose.translation, mesh.scale.x, color));
        }
        for gltf in params.gltfs {
            let model = self.gltf_instances.get(gltf.handle)?.model;
            if self.gltf_models.get(model)?.mesh_count == 0 {
                continue;
            }
            squares.extend(project(view, rect, gltf.pose.translation, gltf.scale.x, Color::MAGENTA));
        }
        // Far to near, so nearer squares are painted over farther ones.
        squares.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(std::cmp::Ordering::Equal));
        Ok(squares)
    }
}

fn project(
    view: &ProjectionView,
    viewport: Rect<i32, Viewport>,
    center: Vector3D<f32, Reference>,
    size: f32,
    color: Color,
) -> Option<ProjectedSquare> {
    let local = view
        .pose
        .rotation
        .inverse()
        .transform_vector3d(center - view.pose.translation);
    let depth = -local.z;
    if depth <= NEAR {
        return None;
    }
    let (left, right) = (view.fov.angle_left.tan(), view.fov.angle_right.tan());
    let (down, up) = (view.fov.angle_down.tan(), view.fov.angle_up.tan());
    if right <= left || up <= down {
        return None;
    }
    let (width, height) = (viewport.size.width as f32, viewport.size.height as f32);
    let x = viewport.origin.x as f32 + (local.x / depth - left) / (right - left) * width;
    let y = viewport.origin.y as f32 + (1. - (local.y / depth - down) / (up - down)) * height;
    let half_width = size / 2. / depth / (right - left) * width;
    let half_height = size / 2. / depth / (up - down) * height;
    let rect = euclid::rect(
        (x - half_width) as i32,
        (y - half_height) as i32,
        ((2. * half_width).ceil() as i32).max(1),
        ((2. * half_height).ceil() as i32).max(1),
    );
    Some(ProjectedSquare {
        rect: rect.intersection(&viewport)?,
        depth,
        color,
    })
}

impl GraphicsPlugin for SoftwarePlugin {
    fn initialize(&mut self) -> Result<(), GraphicsError> {
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn shutdown(&mut self) {
        self.shutdown_device();
        self.initialized = false;
    }

    fn describe_graphics(&self) -> String {
        "Software (CPU) rendering".into()
    }

    fn shutdown_device(&mut self) {
        debug!("software graphics device shut down");
        self.clear_swapchain_cache();
        self.meshes.clear();
        self.gltf_instances.clear();
        self.gltf_models.clear();
    }

    fn image_format_name(&self, format: i64) -> Option<&'static str> {
        match format {
            RGBA8 => Some("RGBA8"),
            SRGB8_ALPHA8 => Some("SRGB8_ALPHA8"),
            DEPTH_COMPONENT32F => Some("DEPTH_COMPONENT32F"),
            _ => None,
        }
    }

    fn select_color_swapchain_format(&self, formats: &[i64]) -> Option<i64> {
        [SRGB8_ALPHA8, RGBA8]
            .iter()
            .copied()
            .find(|format| formats.contains(format))
    }

    fn select_depth_swapchain_format(&self, formats: &[i64]) -> Option<i64> {
        formats.iter().copied().find(|&format| format == DEPTH_COMPONENT32F)
    }

    fn rgba8_format(&self, srgb: bool) -> i64 {
        if srgb {
            SRGB8_ALPHA8
        } else {
            RGBA8
        }
    }

    fn allocate_swapchain_images(
        &mut self,
        swapchain: SwapchainId,
        image_count: u32,
        create_info: &SwapchainCreateInfo,
    ) -> Result<(), GraphicsError> {
        self.check_initialized()?;
        if !self.is_image_format_known(create_info.format) {
            return Err(GraphicsError::UnknownFormat(create_info.format));
        }
        let handle = self
            .swapchain_images
            .push(SwapchainImageData::new(*create_info, image_count));
        self.swapchains.insert(swapchain, handle);
        Ok(())
    }

    fn set_depth_swapchain(&mut self, color: SwapchainId, depth: SwapchainId) -> Result<(), GraphicsError> {
        let depth_data = self.image_data(depth)?;
        if !depth_data.is_depth() {
            return Err(GraphicsError::UnknownFormat(depth_data.create_info.format));
        }
        let color_data = self.image_data_mut(color)?;
        color_data.depth_swapchain = Some(depth);
        color_data.depth_for_color.clear();
        Ok(())
    }

    fn clear_swapchain_cache(&mut self) {
        self.swapchains.clear();
        self.swapchain_images.clear();
    }

    fn clear_image_slice(
        &mut self,
        image: SwapchainImage,
        array_index: u32,
        color: Color,
    ) -> Result<(), GraphicsError> {
        self.check_initialized()?;
        let data = self.image_data_mut(image.swapchain)?;
        let (width, height) = (data.create_info.width, data.create_info.height);
        match *data.slice_mut(image, array_index)? {
            ImageSlice::Color(ref mut rgba) => *rgba = RgbaImage::solid(width, height, color),
            ImageSlice::Depth(ref mut depth) => depth.iter_mut().for_each(|d| *d = FAR_DEPTH),
        }
        Ok(())
    }

    fn render_view(
        &mut self,
        view: &ProjectionView,
        image: SwapchainImage,
        format: i64,
        params: &RenderParams,
    ) -> Result<(), GraphicsError> {
        self.check_initialized()?;
        if !self.is_image_format_known(format) {
            return Err(GraphicsError::UnknownFormat(format));
        }
        let sub_image = view.sub_image.ok_or(GraphicsError::MissingSubImage)?;
        let rect = sub_image.image_rect;
        let squares = self.project_params(view, rect, params)?;

        let data = self.image_data_mut(image.swapchain)?;
        let depth_swapchain = data.depth_swapchain;
        match *data.slice_mut(image, sub_image.image_array_index)? {
            ImageSlice::Color(ref mut rgba) => {
                let (x, y, w, h) = (rect.origin.x, rect.origin.y, rect.size.width, rect.size.height);
                rgba.draw_rect(x, y, w, h, BACKGROUND);
                for square in &squares {
                    let r = square.rect;
                    rgba.draw_rect(r.origin.x, r.origin.y, r.size.width, r.size.height, square.color);
                }
            }
            ImageSlice::Depth(..) => return Err(GraphicsError::UnknownFormat(format)),
        }

        if let Some(depth_swapchain) = depth_swapchain {
            let depth_data = self.image_data_mut(depth_swapchain)?;
            let depth_index = image.index % depth_data.image_count;
            let width = depth_data.create_info.width as i32;
            let depth_image = SwapchainImage {
                swapchain: depth_swapchain,
                index: depth_index,
            };
            if let ImageSlice::Depth(ref mut depth) = *depth_data.slice_mut(depth_image, sub_image.image_array_index)? {
                for square in &squares {
                    let r = square.rect;
                    let square_depth = normalized_depth(square.depth);
                    for row in r.origin.y..r.origin.y + r.size.height {
                        for col in r.origin.x..r.origin.x + r.size.width {
                            if let Some(d) = depth.get_mut((row * width + col) as usize) {
                                *d = d.min(square_depth);
                            }
                        }
                    }
                }
            }
            self.image_data_mut(image.swapchain)?
                .depth_for_color
                .insert(image.index, depth_index);
        }
        Ok(())
    }

    fn copy_rgba_image(
        &mut self,
        image: SwapchainImage,
        array_index: u32,
        source: &RgbaImage,
    ) -> Result<(), GraphicsError> {
        self.check_initialized()?;
        let data = self.image_data_mut(image.swapchain)?;
        let expected = (data.create_info.width, data.create_info.height);
        let actual = (source.width(), source.height());
        if expected != actual {
            return Err(GraphicsError::SizeMismatch { expected, actual });
        }
        let format = data.create_info.format;
        match *data.slice_mut(image, array_index)? {
            ImageSlice::Color(ref mut rgba) => {
                *rgba = source.clone();
                if format == SRGB8_ALPHA8 {
                    rgba.convert_to_srgb();
                }
                Ok(())
            }
            ImageSlice::Depth(..) => Err(GraphicsError::UnknownFormat(format)),
        }
    }

    fn make_simple_mesh(&mut self, indices: &[u16], vertices: &[MeshVertex]) -> Result<MeshHandle, GraphicsError> {
        self.check_initialized()?;
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(GraphicsError::InvalidMesh {
                index,
                vertex_count: vertices.len(),
            });
        }
        Ok(self.meshes.push(SimpleMesh {
            vertices: vertices.to_vec(),
        }))
    }

    fn load_gltf(&mut self, data: &[u8]) -> Result<GltfModelHandle, GraphicsError> {
        self.check_initialized()?;
        let gltf = gltf::Gltf::from_slice(data).map_err(|error| GraphicsError::InvalidGltf(error.to_string()))?;
        Ok(self.gltf_models.push(GltfModelData {
            node_count: gltf.nodes().count(),
            mesh_count: gltf.meshes().count(),
        }))
    }

    fn create_gltf_model_instance(
        &mut self,
        model: GltfModelHandle,
    ) -> Result<GltfModelInstanceHandle, GraphicsError> {
        self.gltf_models.get(model)?;
        Ok(self.gltf_instances.push(GltfInstanceData { model }))
    }
}
