/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! This crate defines the boundary of the XR conformance harness: the runtime
//! under test and the graphics backends it renders with. It is consumed by the
//! `xrconform` crate.

mod error;
mod events;
mod frame;
mod graphics;
mod handle;
mod image;
mod input;
mod layers;
mod lifecycle;
mod runtime;
mod swapchain;
mod time;
mod view;

pub use error::Error;

pub use events::Event;
pub use events::EventKind;
pub use events::SessionState;

pub use frame::EnvironmentBlendMode;
pub use frame::FrameBegin;
pub use frame::FrameEndInfo;
pub use frame::FrameState;

pub use graphics::Cube;
pub use graphics::GltfDrawable;
pub use graphics::GraphicsError;
pub use graphics::GraphicsPlugin;
pub use graphics::MeshDrawable;
pub use graphics::MeshVertex;
pub use graphics::RenderParams;

pub use handle::GltfModel;
pub use handle::GltfModelHandle;
pub use handle::GltfModelInstance;
pub use handle::GltfModelInstanceHandle;
pub use handle::Handle;
pub use handle::HandleError;
pub use handle::HandleVec;
pub use handle::Mesh;
pub use handle::MeshHandle;

pub use image::Caption;
pub use image::Color;
pub use image::RgbaImage;

pub use input::ActionId;
pub use input::ActionSetId;
pub use input::ActionStateBoolean;
pub use input::ActionType;
pub use input::SuggestedBinding;

pub use layers::CompositionLayer;
pub use layers::CompositionLayerFlags;
pub use layers::CompositionLayerProjection;
pub use layers::CompositionLayerQuad;
pub use layers::EyeVisibility;
pub use layers::ProjectionView;

pub use lifecycle::FrameLifecycle;
pub use lifecycle::FramePhase;

pub use runtime::RuntimeAPI;

pub use swapchain::SwapchainCreateFlags;
pub use swapchain::SwapchainCreateInfo;
pub use swapchain::SwapchainId;
pub use swapchain::SwapchainImage;
pub use swapchain::SwapchainSubImage;
pub use swapchain::SwapchainUsageFlags;

pub use time::Time;

pub use view::pose_from_position;
pub use view::Fov;
pub use view::Local;
pub use view::Pose;
pub use view::Reference;
pub use view::ReferenceSpaceType;
pub use view::SpaceId;
pub use view::View;
pub use view::ViewConfigurationType;
pub use view::ViewConfigurationView;
pub use view::ViewStateFlags;
pub use view::Viewport;
