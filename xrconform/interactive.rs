/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Operator-judged cases: the operator looks at the composited scene and
//! presses select to pass it, or opens the description and fails it.

use crate::error::RuntimeResultExt;
use crate::CompositionHelper;
use crate::HarnessError;
use crate::LayerId;
use crate::Result;

use xrconform_api::ActionId;
use xrconform_api::ActionType;
use xrconform_api::Color;
use xrconform_api::CompositionLayerFlags;
use xrconform_api::FrameState;
use xrconform_api::Pose;
use xrconform_api::RgbaImage;
use xrconform_api::SuggestedBinding;
use xrconform_api::SwapchainId;

use euclid::Angle;
use euclid::RigidTransform3D;
use euclid::Rotation3D;
use euclid::Vector3D;

use log::info;

const SIMPLE_CONTROLLER: &str = "/interaction_profiles/khr/simple_controller";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerMode {
    /// The case's own layers and the pass/description hint.
    Scene,
    /// The description and example image, with the fail hint.
    Help,
    Complete,
}

fn yawed_pose(degrees: f32, x: f32, y: f32, z: f32) -> Pose {
    RigidTransform3D::new(
        Rotation3D::around_y(Angle::degrees(degrees)),
        Vector3D::new(x, y, z),
    )
}

pub struct InteractiveLayerManager {
    select: ActionId,
    menu: ActionId,
    example_quad: LayerId,
    description_quad: LayerId,
    actions_quad: LayerId,
    scene_actions_swapchain: SwapchainId,
    help_actions_swapchain: SwapchainId,
    scene_layers: Vec<LayerId>,
}

impl InteractiveLayerManager {
    /// Creates the select and menu actions and the instructional quads.
    /// The helper's action sets still need attaching afterwards.
    pub fn new(
        helper: &mut CompositionHelper,
        example_image: Option<&RgbaImage>,
        description: &str,
    ) -> Result<InteractiveLayerManager> {
        let runtime = helper.runtime().clone();
        let action_set = runtime
            .create_action_set("interaction_test", 0)
            .call("xrCreateActionSet")?;
        let select = runtime
            .create_action(action_set, "interaction_manager_select", ActionType::BooleanInput)
            .call("xrCreateAction")?;
        let menu = runtime
            .create_action(action_set, "interaction_manager_menu", ActionType::BooleanInput)
            .call("xrCreateAction")?;
        let interaction_manager = helper.interaction_manager_mut();
        interaction_manager.add_action_set(action_set);
        interaction_manager.add_action_bindings(
            SIMPLE_CONTROLLER,
            vec![
                SuggestedBinding::new(select, "/user/hand/left/input/select/click"),
                SuggestedBinding::new(select, "/user/hand/right/input/select/click"),
                SuggestedBinding::new(menu, "/user/hand/left/input/menu/click"),
                SuggestedBinding::new(menu, "/user/hand/right/input/menu/click"),
            ],
        );

        let view_space = helper.view_space();

        let example_swapchain = match example_image {
            Some(image) => helper.create_static_swapchain_image(image, true)?,
            None => {
                let mut image = RgbaImage::new(256, 256);
                let (width, height) = (image.width() as i32, image.height() as i32);
                image.put_text(
                    euclid::rect(0, height / 2, width, height),
                    "Example Not Available",
                    64,
                    Color::RED,
                );
                helper.create_static_swapchain_image(&image, false)?
            }
        };
        let example_quad = helper.create_quad_layer(
            example_swapchain,
            view_space,
            1.25,
            yawed_pose(-15., 0.5, 0., -1.5),
        )?;

        let description_swapchain =
            helper.create_static_swapchain_image(&RgbaImage::text_panel(768, 768, description, 48), false)?;
        let description_quad = helper.create_quad_layer(
            description_swapchain,
            view_space,
            0.75,
            yawed_pose(15., -0.5, 0., -1.5),
        )?;

        let scene_actions_swapchain = helper.create_static_swapchain_image(
            &RgbaImage::text_panel(768, 128, "Press Select to PASS. Press Menu for description", 48),
            false,
        )?;
        let help_actions_swapchain = helper
            .create_static_swapchain_image(&RgbaImage::text_panel(768, 128, "Press select to FAIL", 48), false)?;
        let actions_quad = helper.create_quad_layer(
            scene_actions_swapchain,
            view_space,
            0.75,
            yawed_pose(0., 0., -0.4, -1.),
        )?;

        for &layer in &[description_quad, actions_quad] {
            if let Some(quad) = helper.quad_mut(layer) {
                quad.layer_flags |= CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA;
            }
        }

        Ok(InteractiveLayerManager {
            select,
            menu,
            example_quad,
            description_quad,
            actions_quad,
            scene_actions_swapchain,
            help_actions_swapchain,
            scene_layers: Vec::new(),
        })
    }

    /// Adds a layer shown in Scene mode on every frame.
    pub fn add_layer(&mut self, layer: LayerId) {
        self.scene_layers.push(layer);
    }

    /// Ends the frame with `layers` plus the layers of the current mode,
    /// then polls events. Returns whether the case should keep running.
    pub fn end_frame(
        &self,
        helper: &mut CompositionHelper,
        frame_state: &FrameState,
        layers: &[LayerId],
    ) -> Result<bool> {
        let mut layers = layers.to_vec();
        let keep_running = self.append_layers(helper, &mut layers)?;
        helper.end_frame(frame_state.predicted_display_time, &layers)?;
        helper.poll_events()?;
        Ok(keep_running)
    }

    fn append_layers(&self, helper: &mut CompositionHelper, layers: &mut Vec<LayerId>) -> Result<bool> {
        let actions_swapchain = match self.layer_mode(helper)? {
            LayerMode::Scene => self.scene_actions_swapchain,
            LayerMode::Help => {
                layers.push(self.description_quad);
                layers.push(self.example_quad);
                self.help_actions_swapchain
            }
            LayerMode::Complete => return Ok(false),
        };
        let sub_image = helper.make_default_sub_image(actions_swapchain, 0)?;
        if let Some(quad) = helper.quad_mut(self.actions_quad) {
            quad.sub_image = sub_image;
        }
        layers.push(self.actions_quad);
        if actions_swapchain == self.scene_actions_swapchain {
            layers.extend_from_slice(&self.scene_layers);
        }
        Ok(true)
    }

    fn layer_mode(&self, helper: &CompositionHelper) -> Result<LayerMode> {
        helper.interaction_manager().sync_actions()?;
        let runtime = helper.runtime();

        let mut mode = LayerMode::Scene;
        let menu = runtime
            .action_state_boolean(self.menu)
            .call("xrGetActionStateBoolean")?;
        if menu.current_state {
            mode = LayerMode::Help;
        }

        let select = runtime
            .action_state_boolean(self.select)
            .call("xrGetActionStateBoolean")?;
        if select.changed_since_last_sync && select.current_state {
            if mode != LayerMode::Scene {
                return Err(HarnessError::UserFailed);
            }
            info!("operator passed the case");
            mode = LayerMode::Complete;
        }
        Ok(mode)
    }
}
