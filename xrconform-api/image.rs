/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! CPU-side RGBA8 images used for quad layer content.

use crate::Viewport;

use euclid::Rect;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A linear RGBA color with components in `0..=1`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const RED: Color = Color::new(1., 0., 0., 1.);
    pub const GREEN: Color = Color::new(0., 1., 0., 1.);
    pub const BLUE: Color = Color::new(0., 0., 1., 1.);
    pub const YELLOW: Color = Color::new(1., 1., 0., 1.);
    pub const MAGENTA: Color = Color::new(1., 0., 1., 1.);
    pub const CYAN: Color = Color::new(0., 1., 1., 1.);
    pub const WHITE: Color = Color::new(1., 1., 1., 1.);
    pub const BLACK: Color = Color::new(0., 0., 0., 1.);
    pub const TRANSPARENT: Color = Color::new(0., 0., 0., 0.);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let quantize = |c: f32| (c.max(0.).min(1.) * 255. + 0.5) as u8;
        [
            quantize(self.r),
            quantize(self.g),
            quantize(self.b),
            quantize(self.a),
        ]
    }
}

/// Text placed on an image. Glyphs are not rasterized; the caption and its
/// rectangle are recorded so an operator-facing backend can draw them.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Caption {
    pub rect: Rect<i32, Viewport>,
    pub text: String,
    pub pixel_height: u32,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct RgbaImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
    captions: Vec<Caption>,
    srgb: bool,
}

impl RgbaImage {
    /// A fully transparent image.
    pub fn new(width: u32, height: u32) -> RgbaImage {
        RgbaImage::solid(width, height, Color::TRANSPARENT)
    }

    pub fn solid(width: u32, height: u32, color: Color) -> RgbaImage {
        RgbaImage {
            width,
            height,
            pixels: vec![color.to_rgba8(); (width * height) as usize],
            captions: Vec::new(),
            srgb: false,
        }
    }

    /// A panel of the given size showing `text` on a dark background,
    /// as used for instruction and title quads.
    pub fn text_panel(width: u32, height: u32, text: &str, pixel_height: u32) -> RgbaImage {
        let mut image = RgbaImage::solid(width, height, Color::new(0.05, 0.05, 0.05, 1.));
        let full = Rect::new(euclid::point2(0, 0), euclid::size2(width as i32, height as i32));
        image.put_text(full, text, pixel_height, Color::WHITE);
        image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_srgb(&self) -> bool {
        self.srgb
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }

    pub fn put_text(&mut self, rect: Rect<i32, Viewport>, text: &str, pixel_height: u32, color: Color) {
        self.captions.push(Caption {
            rect,
            text: text.into(),
            pixel_height,
            color,
        });
    }

    /// Fills a rectangle, clipped to the image bounds.
    pub fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color) {
        let rgba = color.to_rgba8();
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x.saturating_add(w)).max(0).min(self.width as i32) as u32;
        let y1 = (y.saturating_add(h)).max(0).min(self.height as i32) as u32;
        for row in y0..y1 {
            for col in x0..x1 {
                self.pixels[(row * self.width + col) as usize] = rgba;
            }
        }
    }

    pub fn draw_rect_border(&mut self, x: i32, y: i32, w: i32, h: i32, thickness: i32, color: Color) {
        self.draw_rect(x, y, thickness, h, color);
        self.draw_rect(x + w - thickness, y, thickness, h, color);
        self.draw_rect(x, y, w, thickness, color);
        self.draw_rect(x, y + h - thickness, w, thickness, color);
    }

    /// Re-encodes the color channels with the sRGB transfer function.
    pub fn convert_to_srgb(&mut self) {
        if self.srgb {
            return;
        }
        for pixel in &mut self.pixels {
            for channel in &mut pixel[..3] {
                let linear = f32::from(*channel) / 255.;
                let encoded = if linear <= 0.003_130_8 {
                    linear * 12.92
                } else {
                    1.055 * linear.powf(1. / 2.4) - 0.055
                };
                *channel = (encoded * 255. + 0.5) as u8;
            }
        }
        self.srgb = true;
    }
}
