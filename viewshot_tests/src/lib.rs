// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewshot tests.
//!
//! A tiny software rasterizer stands in for the UI toolkit, so that snapshot tests can render
//! something without a window system.

// LINT SET - lib.rs - v2
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINT SET
// The following lints are part of the standard set,
// but resolving them has been deferred for now.
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use std::convert::Infallible;

use anyhow::{Context, Result};
use viewshot::{Capture, Outcome, PixelBuffer, SnapshotConfig, Snapshotter};

/// Straight RGBA8 colors.
pub mod palette {
    pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
    pub const BLACK: [u8; 4] = [0, 0, 0, 255];
    pub const WHITE: [u8; 4] = [255, 255, 255, 255];
    pub const RED: [u8; 4] = [255, 0, 0, 255];
    pub const GREEN: [u8; 4] = [0, 128, 0, 255];
    pub const BLUE: [u8; 4] = [0, 0, 255, 255];
}

pub struct TestParams {
    pub width: u32,
    pub height: u32,
    pub base_color: Option<[u8; 4]>,
    pub name: String,
    pub suffixes: Vec<String>,
}

impl TestParams {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            base_color: None,
            name: name.into(),
            suffixes: vec![String::new()],
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_center_size(center: (f64, f64), size: (f64, f64)) -> Self {
        let (half_width, half_height) = (size.0 / 2., size.1 / 2.);
        Self::new(
            center.0 - half_width,
            center.1 - half_height,
            center.0 + half_width,
            center.1 + half_height,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Shape {
    Rect(Rect),
    Circle { center: (f64, f64), radius: f64 },
}

impl Shape {
    fn contains(&self, x: f64, y: f64) -> bool {
        match *self {
            Self::Rect(rect) => x >= rect.x0 && x < rect.x1 && y >= rect.y0 && y < rect.y1,
            Self::Circle { center, radius } => {
                let (dx, dy) = (x - center.0, y - center.1);
                dx * dx + dy * dy <= radius * radius
            }
        }
    }
}

/// A list of solid fills, drawn in order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    fills: Vec<(Shape, [u8; 4])>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 4]) {
        self.fills.push((Shape::Rect(rect), color));
    }

    pub fn fill_circle(&mut self, center: (f64, f64), radius: f64, color: [u8; 4]) {
        self.fills.push((Shape::Circle { center, radius }, color));
    }
}

/// Render `scene` by sampling each pixel at its center.
///
/// There is no anti-aliasing, so the output is exactly reproducible.
pub fn render(scene: &Scene, params: &TestParams) -> PixelBuffer {
    let base_color = params.base_color.unwrap_or(palette::BLACK);
    PixelBuffer::from_fn(params.width, params.height, |x, y| {
        let (sample_x, sample_y) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
        scene
            .fills
            .iter()
            .filter(|(shape, _)| shape.contains(sample_x, sample_y))
            .fold(base_color, |dst, (_, src)| source_over(*src, dst))
    })
}

/// Composite straight-alpha `src` over `dst`.
fn source_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let src_alpha = u32::from(src[3]);
    if src_alpha == 255 {
        return src;
    }
    let dst_weight = u32::from(dst[3]) * (255 - src_alpha) / 255;
    let out_alpha = src_alpha + dst_weight;
    if out_alpha == 0 {
        return palette::TRANSPARENT;
    }
    let channel = |i: usize| {
        let blended = u32::from(src[i]) * src_alpha + u32::from(dst[i]) * dst_weight;
        // Cannot exceed 255, as the weights sum to `out_alpha`.
        ((blended + out_alpha / 2) / out_alpha) as u8
    };
    [channel(0), channel(1), channel(2), out_alpha as u8]
}

/// The rendering capability for a scene.
pub fn capture<'a>(scene: &'a Scene, params: &'a TestParams) -> impl Capture + 'a {
    move || Ok::<_, Infallible>(render(scene, params))
}

/// Run a snapshot test of `scene` using `config`.
///
/// Try and keep the width and height small, to reduce the size of committed binary data.
pub fn snapshot_test(
    scene: &Scene,
    params: &TestParams,
    config: SnapshotConfig,
) -> Result<Outcome> {
    let mut snapshotter = Snapshotter::new(config);
    snapshotter
        .verify(
            &capture(scene, params),
            &params.name,
            params.suffixes.as_slice(),
        )
        .with_context(|| format!("Snapshot test `{}` failed", params.name))
}

/// Run a snapshot test of `scene`, configured by the `VIEWSHOT_*` environment variables.
///
/// The configuration is read before anything is rendered.
pub fn snapshot_test_from_env(scene: &Scene, params: &TestParams) -> Result<Outcome> {
    let config = SnapshotConfig::from_env().context("Snapshot tests are not configured")?;
    snapshot_test(scene, params, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_covers_pixel_centers() {
        let mut scene = Scene::new();
        scene.fill_rect(Rect::from_center_size((5., 5.), (4., 4.)), palette::RED);
        let image = render(&scene, &TestParams::new("square", 10, 10));

        let red = image.pixels().filter(|px| *px == palette::RED).count();
        assert_eq!(red, 16);
        assert_eq!(image.pixel(3, 3), Some(palette::RED));
        assert_eq!(image.pixel(6, 6), Some(palette::RED));
        assert_eq!(image.pixel(7, 7), Some(palette::BLACK));
    }

    #[test]
    fn later_fills_are_on_top() {
        let mut scene = Scene::new();
        scene.fill_rect(Rect::new(0., 0., 4., 4.), palette::RED);
        scene.fill_circle((2., 2.), 1., palette::BLUE);
        let image = render(&scene, &TestParams::new("stack", 4, 4));
        assert_eq!(image.pixel(1, 1), Some(palette::BLUE));
        assert_eq!(image.pixel(0, 0), Some(palette::RED));
    }

    #[test]
    fn blending() {
        assert_eq!(source_over(palette::RED, palette::BLUE), palette::RED);
        assert_eq!(source_over(palette::TRANSPARENT, palette::BLUE), palette::BLUE);
        assert_eq!(
            source_over([255, 255, 255, 0], palette::TRANSPARENT),
            palette::TRANSPARENT
        );
        assert_eq!(
            source_over([255, 255, 255, 128], palette::BLACK),
            [128, 128, 128, 255]
        );
        assert_eq!(source_over([0, 0, 255, 128], palette::TRANSPARENT), [0, 0, 255, 128]);
    }
}
