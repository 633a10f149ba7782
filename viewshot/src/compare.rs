// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tolerance-based comparison of two images.

use core::fmt;

use image::{Rgba, RgbaImage};

use crate::{Dimensions, Error, PixelBuffer, Result};

/// The default maximum difference allowed per channel before a pixel counts as differing.
///
/// Zero means pixels have to be exactly equal.
pub const DEFAULT_CHANNEL_THRESHOLD: u8 = 0;

/// The maximum acceptable fraction of differing pixels, in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default)]
pub struct Tolerance(f64);

impl Tolerance {
    /// No pixel may differ.
    pub const EXACT: Self = Self(0.0);
    /// Any number of pixels may differ.
    pub const ANY: Self = Self(1.0);

    /// Create a tolerance from a fraction.
    ///
    /// Returns [`Error::InvalidTolerance`] if `fraction` is not between 0 and 1 (inclusive).
    pub fn new(fraction: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&fraction) {
            Ok(Self(fraction))
        } else {
            Err(Error::InvalidTolerance(fraction))
        }
    }

    /// The fraction of pixels which may differ.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parameters of a single comparison.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CompareOptions {
    /// Maximum fraction of pixels which may differ.
    pub tolerance: Tolerance,
    /// Maximum difference allowed in any one channel before a pixel counts as differing.
    pub channel_threshold: u8,
}

impl CompareOptions {
    /// Compare with the given tolerance and the [default channel threshold](DEFAULT_CHANNEL_THRESHOLD).
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            channel_threshold: DEFAULT_CHANNEL_THRESHOLD,
        }
    }

    /// Sets the channel threshold.
    pub fn with_channel_threshold(mut self, threshold: u8) -> Self {
        self.channel_threshold = threshold;
        self
    }
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::new(Tolerance::EXACT)
    }
}

impl From<Tolerance> for CompareOptions {
    fn from(tolerance: Tolerance) -> Self {
        Self::new(tolerance)
    }
}

/// Why a comparison failed regardless of the pixel contents.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The images have different sizes.
    DimensionMismatch {
        /// Size of the reference image.
        expected: Dimensions,
        /// Size of the candidate image.
        actual: Dimensions,
    },
}

/// The outcome of comparing a candidate image against a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Whether the candidate is within tolerance of the reference.
    pub matches: bool,
    /// Fraction of pixels which differ, between 0 and 1.
    pub differing_pixel_fraction: f64,
    /// Number of pixels which differ beyond the channel threshold.
    pub differing_pixels: u64,
    /// Number of pixels compared, or the pixel count of the larger image if the sizes differ.
    pub total_pixels: u64,
    /// The largest difference seen in any channel of a pixel which isn't transparent in both
    /// images.
    pub max_channel_delta: u8,
    /// The tolerance the result was judged against.
    pub tolerance: Tolerance,
    /// Set when the images could not be compared pixel by pixel.
    pub diagnostic: Option<Diagnostic>,
    /// Mean NVIDIA FLIP error of the comparison, when the images have the same size.
    #[cfg(feature = "flip")]
    pub flip_mean: Option<f32>,
}

impl ComparisonResult {
    /// Turn a failed comparison into the corresponding [`Error`].
    pub fn check(&self, identifier: &str) -> Result<()> {
        if let Some(Diagnostic::DimensionMismatch { expected, actual }) = self.diagnostic {
            return Err(Error::DimensionMismatch { expected, actual });
        }
        if !self.matches {
            return Err(Error::Mismatch {
                identifier: identifier.to_owned(),
                differing_pixels: self.differing_pixels,
                total_pixels: self.total_pixels,
                fraction: self.differing_pixel_fraction,
                tolerance: self.tolerance.get(),
            });
        }
        Ok(())
    }

    /// Returns a human-readable summary of the comparison.
    pub fn summary(&self) -> String {
        if let Some(Diagnostic::DimensionMismatch { expected, actual }) = self.diagnostic {
            return format!("Dimension mismatch: expected {expected}, found {actual}");
        }
        let verdict = if self.matches {
            "Images match"
        } else {
            "Images differ"
        };
        format!(
            "{verdict}: {} of {} pixels ({:.4}) differ, tolerance {}, max channel difference {}",
            self.differing_pixels,
            self.total_pixels,
            self.differing_pixel_fraction,
            self.tolerance,
            self.max_channel_delta
        )
    }
}

/// Compare a candidate image against a reference.
///
/// Images of different sizes never match, whatever the tolerance. Otherwise, each pixel where
/// any channel differs by more than `options.channel_threshold` counts as differing, and the
/// images match when the fraction of differing pixels is at most `options.tolerance`.
pub fn compare(
    candidate: &PixelBuffer,
    reference: &PixelBuffer,
    options: impl Into<CompareOptions>,
) -> ComparisonResult {
    let options = options.into();

    if candidate.dimensions() != reference.dimensions() {
        // Every pixel of the larger image counts as differing.
        let total_pixels = reference.pixel_count().max(candidate.pixel_count());
        return ComparisonResult {
            matches: false,
            differing_pixel_fraction: 1.0,
            differing_pixels: total_pixels,
            total_pixels,
            max_channel_delta: 0,
            tolerance: options.tolerance,
            diagnostic: Some(Diagnostic::DimensionMismatch {
                expected: reference.dimensions(),
                actual: candidate.dimensions(),
            }),
            #[cfg(feature = "flip")]
            flip_mean: None,
        };
    }

    let total_pixels = reference.pixel_count();
    let mut differing_pixels = 0_u64;
    let mut max_channel_delta = 0_u8;
    for (actual, expected) in candidate.pixels().zip(reference.pixels()) {
        let Some(delta) = pixel_delta(&actual, &expected) else {
            continue;
        };
        max_channel_delta = max_channel_delta.max(delta);
        if delta > options.channel_threshold {
            differing_pixels += 1;
        }
    }

    let differing_pixel_fraction = if total_pixels == 0 {
        0.0
    } else {
        differing_pixels as f64 / total_pixels as f64
    };

    ComparisonResult {
        matches: differing_pixel_fraction <= options.tolerance.get(),
        differing_pixel_fraction,
        differing_pixels,
        total_pixels,
        max_channel_delta,
        tolerance: options.tolerance,
        diagnostic: None,
        #[cfg(feature = "flip")]
        flip_mean: (total_pixels > 0).then(|| crate::flip::flip_mean(candidate, reference)),
    }
}

/// The largest difference between any channel of two pixels.
///
/// `None` if both pixels are fully transparent, as their color channels are meaningless.
fn pixel_delta(pixel1: &[u8; 4], pixel2: &[u8; 4]) -> Option<u8> {
    if pixel1[3] == 0 && pixel2[3] == 0 {
        return None;
    }

    pixel1
        .iter()
        .zip(pixel2)
        .map(|(a, b)| a.abs_diff(*b))
        .max()
}

fn is_pix_diff(pixel1: &[u8; 4], pixel2: &[u8; 4], threshold: u8) -> bool {
    pixel_delta(pixel1, pixel2).is_some_and(|delta| delta > threshold)
}

/// Render a visual diff of two images.
///
/// The result is three panels wide: the reference on the left, a mask in the middle where
/// differing pixels are red and equal pixels are black, and the candidate on the right.
/// Pixels present in only one of the images count as differing.
pub fn diff_image(candidate: &PixelBuffer, reference: &PixelBuffer, threshold: u8) -> RgbaImage {
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    let width = candidate.width().max(reference.width());
    let height = candidate.height().max(reference.height());

    let mut diff_image = RgbaImage::new(width * 3, height);

    for x in 0..width {
        for y in 0..height {
            match (candidate.pixel(x, y), reference.pixel(x, y)) {
                (Some(actual), Some(expected)) => {
                    diff_image.put_pixel(x, y, Rgba(expected));
                    diff_image.put_pixel(x + 2 * width, y, Rgba(actual));
                    let mask = if is_pix_diff(&expected, &actual, threshold) {
                        RED
                    } else {
                        BLACK
                    };
                    diff_image.put_pixel(x + width, y, mask);
                }
                (Some(actual), None) => {
                    diff_image.put_pixel(x + 2 * width, y, Rgba(actual));
                    diff_image.put_pixel(x + width, y, RED);
                }
                (None, Some(expected)) => {
                    diff_image.put_pixel(x, y, Rgba(expected));
                    diff_image.put_pixel(x + width, y, RED);
                }
                (None, None) => {
                    diff_image.put_pixel(x + width, y, RED);
                }
            }
        }
    }

    diff_image
}
