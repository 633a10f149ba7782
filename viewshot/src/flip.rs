// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Perceptual error using NVIDIA FLIP.

use nv_flip::{FlipImageRgb8, FlipPool};

use crate::PixelBuffer;

/// Mean FLIP error between two images of the same size.
///
/// FLIP has no notion of alpha, so both images are compared as opaque RGB.
pub(crate) fn flip_mean(candidate: &PixelBuffer, reference: &PixelBuffer) -> f32 {
    debug_assert_eq!(candidate.dimensions(), reference.dimensions());
    let expected_data = to_rgb8(reference);
    let rendered_data = to_rgb8(candidate);
    let expected = FlipImageRgb8::with_data(reference.width(), reference.height(), &expected_data);
    let rendered = FlipImageRgb8::with_data(candidate.width(), candidate.height(), &rendered_data);

    let error_map = nv_flip::flip(expected, rendered, nv_flip::DEFAULT_PIXELS_PER_DEGREE);
    FlipPool::from_image(&error_map).mean()
}

fn to_rgb8(buffer: &PixelBuffer) -> Vec<u8> {
    buffer
        .pixels()
        .flat_map(|[r, g, b, _]| [r, g, b])
        .collect()
}
