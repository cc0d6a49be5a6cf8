/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A facade over session, space, swapchain and layer setup for cases that
//! composite layers and submit frames.

use crate::error::RuntimeResultExt;
use crate::stopwatch::wait_until_predicate_with_timeout;
use crate::ConformanceOptions;
use crate::EventQueue;
use crate::EventReader;
use crate::HarnessError;
use crate::Result;

use xrconform_api::pose_from_position;
use xrconform_api::ActionSetId;
use xrconform_api::Color;
use xrconform_api::CompositionLayer;
use xrconform_api::CompositionLayerFlags;
use xrconform_api::CompositionLayerProjection;
use xrconform_api::CompositionLayerQuad;
use xrconform_api::Cube;
use xrconform_api::Event;
use xrconform_api::EventKind;
use xrconform_api::EyeVisibility;
use xrconform_api::FrameEndInfo;
use xrconform_api::FrameState;
use xrconform_api::GraphicsError;
use xrconform_api::GraphicsPlugin;
use xrconform_api::Pose;
use xrconform_api::ProjectionView;
use xrconform_api::ReferenceSpaceType;
use xrconform_api::RenderParams;
use xrconform_api::RgbaImage;
use xrconform_api::RuntimeAPI;
use xrconform_api::SessionState;
use xrconform_api::SpaceId;
use xrconform_api::SuggestedBinding;
use xrconform_api::SwapchainCreateFlags;
use xrconform_api::SwapchainCreateInfo;
use xrconform_api::SwapchainId;
use xrconform_api::SwapchainImage;
use xrconform_api::SwapchainSubImage;
use xrconform_api::SwapchainUsageFlags;
use xrconform_api::Time;
use xrconform_api::View;
use xrconform_api::ViewConfigurationView;
use xrconform_api::ViewStateFlags;

use euclid::RigidTransform3D;
use euclid::Size2D;

use log::debug;
use log::warn;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// The number of layers every runtime must be able to composite in one frame.
pub const MIN_COMPOSITION_LAYERS_SUPPORTED: usize = 16;

const TITLE_FONT_HEIGHT: u32 = 32;
const TITLE_INSET: u32 = 4;
const TITLE_BORDER: i32 = 2;

/// Names a layer owned by a `CompositionHelper`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LayerId(usize);

/// Collects suggested bindings and action sets, then hands them to the
/// runtime in one go.
pub struct InteractionManager {
    runtime: Arc<dyn RuntimeAPI>,
    bindings: BTreeMap<String, Vec<SuggestedBinding>>,
    action_sets: Vec<ActionSetId>,
}

impl InteractionManager {
    fn new(runtime: Arc<dyn RuntimeAPI>) -> InteractionManager {
        InteractionManager {
            runtime,
            bindings: BTreeMap::new(),
            action_sets: Vec::new(),
        }
    }

    pub fn add_action_bindings(&mut self, interaction_profile: &str, bindings: Vec<SuggestedBinding>) {
        self.bindings
            .entry(interaction_profile.into())
            .or_insert_with(Vec::new)
            .extend(bindings);
    }

    pub fn add_action_set(&mut self, action_set: ActionSetId) {
        self.action_sets.push(action_set);
    }

    pub fn attach_action_sets(&self) -> Result<()> {
        for (profile, bindings) in &self.bindings {
            self.runtime
                .suggest_interaction_profile_bindings(profile, bindings)
                .call("xrSuggestInteractionProfileBindings")?;
        }
        self.runtime
            .attach_action_sets(&self.action_sets)
            .call("xrAttachSessionActionSets")
    }

    pub fn sync_actions(&self) -> Result<()> {
        self.runtime
            .sync_actions(&self.action_sets)
            .call("xrSyncActions")
    }
}

/// Releases an acquired, waited image unless it was released explicitly.
struct ReleaseGuard<'a> {
    runtime: &'a dyn RuntimeAPI,
    swapchain: SwapchainId,
    armed: bool,
}

impl<'a> ReleaseGuard<'a> {
    fn release(mut self) -> Result<()> {
        self.armed = false;
        self.runtime
            .release_swapchain_image(self.swapchain)
            .call("xrReleaseSwapchainImage")
    }
}

impl<'a> Drop for ReleaseGuard<'a> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(error) = self.runtime.release_swapchain_image(self.swapchain) {
                warn!("failed to release {:?} after an error: {}", self.swapchain, error);
            }
        }
    }
}

pub struct CompositionHelper {
    runtime: Arc<dyn RuntimeAPI>,
    graphics: Box<dyn GraphicsPlugin>,
    options: ConformanceOptions,
    event_queue: Arc<EventQueue>,
    event_reader: EventReader,
    interaction_manager: InteractionManager,
    projection_view_count: usize,
    default_color_format: i64,
    view_space: SpaceId,
    spaces: Vec<SpaceId>,
    swapchains: HashMap<SwapchainId, SwapchainCreateInfo>,
    layers: Vec<CompositionLayer>,
    title_quad: CompositionLayer,
}

impl CompositionHelper {
    /// Prepares a session for compositing. The graphics plugin is
    /// initialized here if it has not been already.
    pub fn new(
        test_name: &str,
        runtime: Arc<dyn RuntimeAPI>,
        mut graphics: Box<dyn GraphicsPlugin>,
        options: ConformanceOptions,
    ) -> Result<CompositionHelper> {
        if !graphics.is_initialized() {
            graphics.initialize()?;
        }
        debug!("composition helper for {:?} on {}", test_name, graphics.describe_graphics());

        let event_queue = EventQueue::new(runtime.clone());
        let event_reader = EventReader::new(event_queue.clone());
        let projection_view_count = runtime
            .view_configuration_views(options.view_configuration)
            .call("xrEnumerateViewConfigurationViews")?
            .len();
        let formats = runtime
            .swapchain_formats()
            .call("xrEnumerateSwapchainFormats")?;
        let default_color_format = graphics
            .select_color_swapchain_format(&formats)
            .ok_or(HarnessError::Graphics(GraphicsError::UnknownFormat(
                formats.first().copied().unwrap_or_default(),
            )))?;
        let view_space = runtime
            .create_reference_space(ReferenceSpaceType::View, RigidTransform3D::identity())
            .call("xrCreateReferenceSpace")?;

        // Until the title quad exists, this stands in for it.
        let placeholder = CompositionLayer::Projection(CompositionLayerProjection {
            layer_flags: CompositionLayerFlags::empty(),
            space: view_space,
            views: Vec::new(),
        });
        let mut helper = CompositionHelper {
            interaction_manager: InteractionManager::new(runtime.clone()),
            runtime,
            graphics,
            options,
            event_queue,
            event_reader,
            projection_view_count,
            default_color_format,
            view_space,
            spaces: vec![view_space],
            swapchains: HashMap::new(),
            layers: Vec::new(),
            title_quad: placeholder,
        };

        let width = 512;
        let height = TITLE_FONT_HEIGHT + TITLE_INSET * 2;
        let mut image = RgbaImage::new(width, height);
        image.draw_rect(0, 0, width as i32, height as i32, Color::new(0.5, 0.5, 0.5, 0.5));
        image.draw_rect_border(
            0,
            0,
            width as i32,
            height as i32,
            TITLE_BORDER,
            Color::new(0.5, 0.5, 0.5, 1.),
        );
        image.put_text(
            euclid::rect(
                TITLE_INSET as i32,
                TITLE_INSET as i32,
                (width - TITLE_INSET * 2) as i32,
                (height - TITLE_INSET * 2) as i32,
            ),
            test_name,
            TITLE_FONT_HEIGHT,
            Color::WHITE,
        );
        let swapchain = helper.create_static_swapchain_image(&image, false)?;
        let quad_width = 0.75;
        helper.title_quad = CompositionLayer::Quad(CompositionLayerQuad {
            layer_flags: CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA,
            space: view_space,
            eye_visibility: EyeVisibility::Both,
            sub_image: helper.make_default_sub_image(swapchain, 0)?,
            pose: pose_from_position(0., 0.4, -1.),
            size: Size2D::new(quad_width, quad_width * height as f32 / width as f32),
        });
        Ok(helper)
    }

    pub fn runtime(&self) -> &Arc<dyn RuntimeAPI> {
        &self.runtime
    }

    pub fn graphics(&self) -> &dyn GraphicsPlugin {
        &*self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut dyn GraphicsPlugin {
        &mut *self.graphics
    }

    pub fn options(&self) -> &ConformanceOptions {
        &self.options
    }

    pub fn event_queue(&self) -> &Arc<EventQueue> {
        &self.event_queue
    }

    pub fn interaction_manager(&self) -> &InteractionManager {
        &self.interaction_manager
    }

    pub fn interaction_manager_mut(&mut self) -> &mut InteractionManager {
        &mut self.interaction_manager
    }

    pub fn view_space(&self) -> SpaceId {
        self.view_space
    }

    pub fn enumerate_configuration_views(&self) -> Result<Vec<ViewConfigurationView>> {
        self.runtime
            .view_configuration_views(self.options.view_configuration)
            .call("xrEnumerateViewConfigurationViews")
    }

    /// Waits for the session to become READY, then begins it.
    pub fn begin_session(&mut self) -> Result<()> {
        let timeout = self.options.session_ready_timeout;
        let reader = &mut self.event_reader;
        let ready = wait_until_predicate_with_timeout(
            || {
                while let Some(event) = reader.try_read_until(EventKind::SessionStateChanged) {
                    if event == Event::SessionStateChanged(SessionState::Ready) {
                        return true;
                    }
                }
                false
            },
            timeout,
            self.options.poll_interval,
        );
        if !ready {
            return Err(HarnessError::Timeout {
                what: "session READY state",
                timeout,
            });
        }
        self.runtime
            .begin_session(self.options.view_configuration)
            .call("xrBeginSession")
    }

    pub fn locate_views(&self, space: SpaceId, display_time: Time) -> Result<(ViewStateFlags, Vec<View>)> {
        self.runtime
            .locate_views(self.options.view_configuration, display_time, space)
            .call("xrLocateViews")
    }

    /// Drains pending events. A session leaving the running states fails
    /// the case, since nothing a case does should cause that.
    pub fn poll_events(&mut self) -> Result<()> {
        while let Some(event) = self.event_reader.try_read_next() {
            if let Event::SessionStateChanged(state) = event {
                match state {
                    SessionState::Ready
                    | SessionState::Synchronized
                    | SessionState::Visible
                    | SessionState::Focused => {}
                    other => return Err(HarnessError::UnexpectedSessionState(other)),
                }
            }
        }
        Ok(())
    }

    /// Acquires the next image of `swapchain`, waits for it, passes it to
    /// `update` and releases it again, on the error path too.
    pub fn acquire_wait_release_image<F>(&mut self, swapchain: SwapchainId, update: F) -> Result<()>
    where
        F: FnOnce(&mut dyn GraphicsPlugin, SwapchainImage, i64) -> Result<()>,
    {
        let format = self
            .swapchains
            .get(&swapchain)
            .map(|info| info.format)
            .ok_or(HarnessError::Graphics(GraphicsError::UnknownSwapchain(swapchain)))?;
        let index = self
            .runtime
            .acquire_swapchain_image(swapchain)
            .call("xrAcquireSwapchainImage")?;
        let timeout = self.options.image_wait_timeout;
        match self.runtime.wait_swapchain_image(swapchain, timeout) {
            Ok(()) => {}
            Err(xrconform_api::Error::TimeoutExpired) => {
                return Err(HarnessError::Timeout {
                    what: "swapchain image",
                    timeout,
                })
            }
            Err(source) => {
                return Err(HarnessError::Runtime {
                    call: "xrWaitSwapchainImage",
                    source,
                })
            }
        }
        let guard = ReleaseGuard {
            runtime: &*self.runtime,
            swapchain,
            armed: true,
        };
        update(&mut *self.graphics, SwapchainImage { swapchain, index }, format)?;
        guard.release()
    }

    pub fn create_reference_space(&mut self, kind: ReferenceSpaceType, pose: Pose) -> Result<SpaceId> {
        let space = self
            .runtime
            .create_reference_space(kind, pose)
            .call("xrCreateReferenceSpace")?;
        self.spaces.push(space);
        Ok(space)
    }

    pub fn default_color_swapchain_create_info(&self, width: u32, height: u32) -> SwapchainCreateInfo {
        SwapchainCreateInfo::color(self.default_color_format, width, height)
    }

    pub fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> Result<SwapchainId> {
        let swapchain = self
            .runtime
            .create_swapchain(info)
            .call("xrCreateSwapchain")?;
        let image_count = self
            .runtime
            .swapchain_image_count(swapchain)
            .call("xrEnumerateSwapchainImages")?;
        self.graphics
            .allocate_swapchain_images(swapchain, image_count, info)?;
        self.swapchains.insert(swapchain, *info);
        Ok(swapchain)
    }

    pub fn destroy_swapchain(&mut self, swapchain: SwapchainId) -> Result<()> {
        if self.swapchains.remove(&swapchain).is_none() {
            return Err(HarnessError::Graphics(GraphicsError::UnknownSwapchain(swapchain)));
        }
        self.runtime
            .destroy_swapchain(swapchain)
            .call("xrDestroySwapchain")
    }

    /// Creates a single-image swapchain holding `image`. It is acquired and
    /// rendered here, once, and never again.
    pub fn create_static_swapchain_image(&mut self, image: &RgbaImage, srgb: bool) -> Result<SwapchainId> {
        let format = self.graphics.rgba8_format(srgb);
        let mut info = SwapchainCreateInfo::color(format, image.width(), image.height());
        info.create_flags = SwapchainCreateFlags::STATIC_IMAGE;
        info.usage_flags = SwapchainUsageFlags::SAMPLED | SwapchainUsageFlags::TRANSFER_DST;
        let swapchain = self.create_swapchain(&info)?;
        self.acquire_wait_release_image(swapchain, |graphics, swapchain_image, _| {
            Ok(graphics.copy_rgba_image(swapchain_image, 0, image)?)
        })?;
        Ok(swapchain)
    }

    pub fn create_static_swapchain_solid_color(&mut self, color: Color) -> Result<SwapchainId> {
        let image = RgbaImage::solid(256, 256, color);
        self.create_static_swapchain_image(&image, false)
    }

    /// A sub-image covering the whole of one array slice.
    pub fn make_default_sub_image(&self, swapchain: SwapchainId, array_index: u32) -> Result<SwapchainSubImage> {
        let info = self
            .swapchains
            .get(&swapchain)
            .ok_or(HarnessError::Graphics(GraphicsError::UnknownSwapchain(swapchain)))?;
        Ok(SwapchainSubImage {
            swapchain,
            image_rect: info.full_rect(),
            image_array_index: array_index,
        })
    }

    /// A quad `width` meters wide, with its height following the
    /// swapchain's aspect ratio.
    pub fn create_quad_layer(
        &mut self,
        swapchain: SwapchainId,
        space: SpaceId,
        width: f32,
        pose: Pose,
    ) -> Result<LayerId> {
        let sub_image = self.make_default_sub_image(swapchain, 0)?;
        let size = sub_image.image_rect.size;
        let height = width * size.height as f32 / size.width as f32;
        self.layers.push(CompositionLayer::Quad(CompositionLayerQuad {
            layer_flags: CompositionLayerFlags::empty(),
            space,
            eye_visibility: EyeVisibility::Both,
            sub_image,
            pose,
            size: Size2D::new(width, height),
        }));
        Ok(LayerId(self.layers.len() - 1))
    }

    /// A projection layer with one empty view per configured view.
    pub fn create_projection_layer(&mut self, space: SpaceId) -> LayerId {
        self.layers.push(CompositionLayer::Projection(CompositionLayerProjection {
            layer_flags: CompositionLayerFlags::empty(),
            space,
            views: vec![ProjectionView::default(); self.projection_view_count],
        }));
        LayerId(self.layers.len() - 1)
    }

    pub fn layer(&self, id: LayerId) -> &CompositionLayer {
        &self.layers[id.0]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut CompositionLayer {
        &mut self.layers[id.0]
    }

    pub fn projection_mut(&mut self, id: LayerId) -> Option<&mut CompositionLayerProjection> {
        match self.layers[id.0] {
            CompositionLayer::Projection(ref mut projection) => Some(projection),
            CompositionLayer::Quad(..) => None,
        }
    }

    pub fn quad_mut(&mut self, id: LayerId) -> Option<&mut CompositionLayerQuad> {
        match self.layers[id.0] {
            CompositionLayer::Quad(ref mut quad) => Some(quad),
            CompositionLayer::Projection(..) => None,
        }
    }

    /// Submits `layers` followed by the title quad.
    pub fn end_frame(&mut self, display_time: Time, layers: &[LayerId]) -> Result<()> {
        let count = layers.len() + 1;
        if count > MIN_COMPOSITION_LAYERS_SUPPORTED {
            return Err(HarnessError::TooManyLayers {
                count,
                max: MIN_COMPOSITION_LAYERS_SUPPORTED,
            });
        }
        let mut submitted: Vec<Option<&CompositionLayer>> =
            layers.iter().map(|id| Some(&self.layers[id.0])).collect();
        submitted.push(Some(&self.title_quad));
        let info = FrameEndInfo::new(display_time, self.options.environment_blend_mode)
            .with_layers(&submitted);
        self.runtime.end_frame(&info).call("xrEndFrame")
    }
}

impl Drop for CompositionHelper {
    fn drop(&mut self) {
        for space in self.spaces.drain(..) {
            if let Err(error) = self.runtime.destroy_space(space) {
                warn!("failed to destroy {:?}: {}", space, error);
            }
        }
        for (swapchain, _) in self.swapchains.drain() {
            if let Err(error) = self.runtime.destroy_swapchain(swapchain) {
                warn!("failed to destroy {:?}: {}", swapchain, error);
            }
        }
        if self.graphics.is_initialized() {
            self.graphics.shutdown_device();
        }
    }
}

/// A world-locked projection layer with one swapchain per view.
pub struct SimpleProjectionLayerHelper {
    local_space: SpaceId,
    layer: LayerId,
    swapchains: Vec<SwapchainId>,
}

impl SimpleProjectionLayerHelper {
    pub fn new(helper: &mut CompositionHelper) -> Result<SimpleProjectionLayerHelper> {
        let local_space =
            helper.create_reference_space(ReferenceSpaceType::Local, RigidTransform3D::identity())?;
        let views = helper.enumerate_configuration_views()?;
        let mut swapchains = Vec::with_capacity(views.len());
        for view in &views {
            let info = helper.default_color_swapchain_create_info(
                view.recommended_image_rect_width,
                view.recommended_image_rect_height,
            );
            swapchains.push(helper.create_swapchain(&info)?);
        }
        let layer = helper.create_projection_layer(local_space);
        for (index, &swapchain) in swapchains.iter().enumerate() {
            let sub_image = helper.make_default_sub_image(swapchain, 0)?;
            if let Some(projection) = helper.projection_mut(layer) {
                projection.views[index].sub_image = Some(sub_image);
            }
        }
        Ok(SimpleProjectionLayerHelper {
            local_space,
            layer,
            swapchains,
        })
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn local_space(&self) -> SpaceId {
        self.local_space
    }

    /// Renders four cubes around the viewer, left, right, below and above.
    pub fn update_projection_layer(&self, helper: &mut CompositionHelper, frame_state: &FrameState) -> Result<()> {
        let cubes = [
            Cube::at(-1., 0., -2.),
            Cube::at(1., 0., -2.),
            Cube::at(0., -1., -2.),
            Cube::at(0., 1., -2.),
        ];
        self.update_projection_layer_with(helper, frame_state, &cubes)
    }

    /// Locates the views for the frame and renders `cubes` into each. Views
    /// are left as they were when their pose is not valid.
    pub fn update_projection_layer_with(
        &self,
        helper: &mut CompositionHelper,
        frame_state: &FrameState,
        cubes: &[Cube],
    ) -> Result<()> {
        let (flags, views) = helper.locate_views(self.local_space, frame_state.predicted_display_time)?;
        if !flags.pose_valid() {
            return Ok(());
        }
        for (index, (view, &swapchain)) in views.iter().zip(&self.swapchains).enumerate() {
            let projection_view = match helper.projection_mut(self.layer) {
                Some(projection) => {
                    let projection_view = &mut projection.views[index];
                    projection_view.pose = view.pose;
                    projection_view.fov = view.fov;
                    projection_view.clone()
                }
                None => continue,
            };
            helper.acquire_wait_release_image(swapchain, |graphics, image, format| {
                graphics.clear_image_slice(image, 0, Color::new(0.1, 0.1, 0.12, 1.))?;
                graphics.render_view(&projection_view, image, format, &RenderParams::cubes(cubes))?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::graphics::software::SoftwarePlugin;
    use crate::headless::HeadlessInit;
    use crate::headless::HeadlessMsg;
    use crate::headless::HeadlessRuntime;

    use xrconform_api::FramePhase;

    fn new_helper(name: &str) -> (Arc<HeadlessRuntime>, CompositionHelper) {
        let runtime = Arc::new(HeadlessRuntime::new(HeadlessInit::default()));
        let helper = CompositionHelper::new(
            name,
            runtime.clone(),
            Box::new(SoftwarePlugin::new()),
            ConformanceOptions::default(),
        )
        .unwrap();
        (runtime, helper)
    }

    #[test]
    fn title_quad_is_submitted_with_every_frame() {
        let (runtime, mut helper) = new_helper("Title");
        helper.begin_session().unwrap();
        let frame_state = runtime.wait_frame().unwrap();
        runtime.begin_frame().unwrap();
        helper.end_frame(frame_state.predicted_display_time, &[]).unwrap();

        let frame = runtime.last_submitted_frame().unwrap();
        assert_eq!(frame.layers.len(), 1);
        match frame.layers[0] {
            CompositionLayer::Quad(ref quad) => {
                assert!(quad.layer_flags.contains(CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA));
                assert_eq!(quad.space, helper.view_space());
                assert_eq!(quad.size.width, 0.75);
                assert!((quad.size.height - 0.75 * 40. / 512.).abs() < 1e-6);
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn quad_height_follows_the_image_aspect() {
        let (_runtime, mut helper) = new_helper("Aspect");
        let image = RgbaImage::solid(200, 100, Color::GREEN);
        let swapchain = helper.create_static_swapchain_image(&image, false).unwrap();
        let space = helper.view_space();
        let layer = helper
            .create_quad_layer(swapchain, space, 1.0, pose_from_position(0., 0., -1.))
            .unwrap();
        let quad = helper.quad_mut(layer).unwrap();
        assert_eq!(quad.size, Size2D::new(1.0, 0.5));
        assert!(helper.projection_mut(layer).is_none());
    }

    #[test]
    fn projection_layers_have_one_view_per_configured_view() {
        let (_runtime, mut helper) = new_helper("Projection");
        let space = helper.view_space();
        let layer = helper.create_projection_layer(space);
        let projection = helper.projection_mut(layer).unwrap();
        assert_eq!(projection.views.len(), 2);
        assert!(projection.views.iter().all(|view| view.sub_image.is_none()));
    }

    #[test]
    fn too_many_layers_are_refused_before_reaching_the_runtime() {
        let (runtime, mut helper) = new_helper("Limit");
        helper.begin_session().unwrap();
        let swapchain = helper.create_static_swapchain_solid_color(Color::RED).unwrap();
        let space = helper.view_space();
        let layer = helper
            .create_quad_layer(swapchain, space, 0.5, pose_from_position(0., 0., -1.))
            .unwrap();
        let frame_state = runtime.wait_frame().unwrap();
        runtime.begin_frame().unwrap();
        let layers = vec![layer; MIN_COMPOSITION_LAYERS_SUPPORTED];
        match helper.end_frame(frame_state.predicted_display_time, &layers) {
            Err(HarnessError::TooManyLayers { count, max }) => {
                assert_eq!(count, MIN_COMPOSITION_LAYERS_SUPPORTED + 1);
                assert_eq!(max, MIN_COMPOSITION_LAYERS_SUPPORTED);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(runtime.frame_phase(), FramePhase::Began);
        helper
            .end_frame(frame_state.predicted_display_time, &layers[..15])
            .unwrap();
    }

    #[test]
    fn image_is_released_when_the_update_fails() {
        let (runtime, mut helper) = new_helper("Release");
        let info = helper.default_color_swapchain_create_info(64, 64);
        let swapchain = helper.create_swapchain(&info).unwrap();
        let result = helper.acquire_wait_release_image(swapchain, |_, _, _| Err(HarnessError::UserFailed));
        assert!(matches!(result, Err(HarnessError::UserFailed)));
        // A leaked image would make the third acquire of a 3-image chain fail.
        for _ in 0..3 {
            helper
                .acquire_wait_release_image(swapchain, |_, _, _| Ok(()))
                .unwrap();
        }
        assert_eq!(runtime.swapchain_image_count(swapchain).unwrap(), 3);
    }

    #[test]
    fn stalled_image_wait_times_out() {
        let (runtime, mut helper) = new_helper("Stall");
        let info = helper.default_color_swapchain_create_info(64, 64);
        let swapchain = helper.create_swapchain(&info).unwrap();
        runtime.handle_msg(HeadlessMsg::StallSwapchainImages(true));
        match helper.acquire_wait_release_image(swapchain, |_, _, _| Ok(())) {
            Err(HarnessError::Timeout { what, .. }) => assert_eq!(what, "swapchain image"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unexpected_session_states_fail_polling() {
        let (runtime, mut helper) = new_helper("Poll");
        helper.begin_session().unwrap();
        helper.poll_events().unwrap();
        runtime.request_exit_session().unwrap();
        match helper.poll_events() {
            Err(HarnessError::UnexpectedSessionState(SessionState::Stopping)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn projection_helper_renders_each_view() {
        let (runtime, mut helper) = new_helper("Cubes");
        helper.begin_session().unwrap();
        let projection = SimpleProjectionLayerHelper::new(&mut helper).unwrap();
        let frame_state = runtime.wait_frame().unwrap();
        runtime.begin_frame().unwrap();
        projection
            .update_projection_layer(&mut helper, &frame_state)
            .unwrap();
        helper
            .end_frame(frame_state.predicted_display_time, &[projection.layer()])
            .unwrap();

        let frame = runtime.last_submitted_frame().unwrap();
        assert_eq!(frame.layers.len(), 2);
        match frame.layers[0] {
            CompositionLayer::Projection(ref layer) => {
                assert_eq!(layer.space, projection.local_space());
                assert!(layer.views.iter().all(|view| view.sub_image.is_some()));
                assert!(layer.views[0].fov.angle_right > 0.);
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }
}
