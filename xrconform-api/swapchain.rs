/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::Viewport;

use euclid::Point2D;
use euclid::Rect;
use euclid::Size2D;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// An opaque swapchain handle issued by the runtime.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SwapchainId(pub u64);

bitflags::bitflags! {
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct SwapchainCreateFlags: u32 {
        const PROTECTED_CONTENT = 0x1;
        /// The swapchain has a single image which is acquired and released exactly once.
        const STATIC_IMAGE =      0x2;
    }
}

bitflags::bitflags! {
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct SwapchainUsageFlags: u32 {
        const COLOR_ATTACHMENT =         0x01;
        const DEPTH_STENCIL_ATTACHMENT = 0x02;
        const UNORDERED_ACCESS =         0x04;
        const TRANSFER_SRC =             0x08;
        const TRANSFER_DST =             0x10;
        const SAMPLED =                  0x20;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SwapchainCreateInfo {
    pub create_flags: SwapchainCreateFlags,
    pub usage_flags: SwapchainUsageFlags,
    pub format: i64,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
    pub face_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
}

impl SwapchainCreateInfo {
    /// A single-slice, single-sample color swapchain.
    pub fn color(format: i64, width: u32, height: u32) -> SwapchainCreateInfo {
        SwapchainCreateInfo {
            create_flags: SwapchainCreateFlags::empty(),
            usage_flags: SwapchainUsageFlags::COLOR_ATTACHMENT | SwapchainUsageFlags::SAMPLED,
            format,
            sample_count: 1,
            width,
            height,
            face_count: 1,
            array_size: 1,
            mip_count: 1,
        }
    }

    pub fn is_static(&self) -> bool {
        self.create_flags.contains(SwapchainCreateFlags::STATIC_IMAGE)
    }

    pub fn full_rect(&self) -> Rect<i32, Viewport> {
        Rect::new(
            Point2D::zero(),
            Size2D::new(self.width as i32, self.height as i32),
        )
    }
}

/// One image of a swapchain, as handed to a graphics backend between
/// acquire and release.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SwapchainImage {
    pub swapchain: SwapchainId,
    pub index: u32,
}

/// A region of one array slice of a swapchain.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SwapchainSubImage {
    pub swapchain: SwapchainId,
    pub image_rect: Rect<i32, Viewport>,
    pub image_array_index: u32,
}
