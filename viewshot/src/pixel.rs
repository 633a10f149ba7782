// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A captured RGBA8 image.

use core::fmt;
use std::io::Read;
use std::sync::Arc;

use crate::{Error, Result};

/// Width and height of an image in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The number of pixels in an image of this size.
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Number of bytes needed to store an RGBA8 image of this size, if it fits in memory.
    fn byte_len(self) -> Option<usize> {
        usize::try_from(self.width)
            .ok()?
            .checked_mul(usize::try_from(self.height).ok()?)?
            .checked_mul(4)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An immutable image of straight (not premultiplied) RGBA8 pixels.
///
/// The pixels are in row-major order, and each pixel consists of four bytes in the order
/// `[r, g, b, a]`. Cloning is cheap, as the pixel data is shared.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dimensions: Dimensions,
    data: Arc<[u8]>,
}

impl PixelBuffer {
    /// Create a buffer from raw RGBA8 data.
    ///
    /// Returns [`Error::InvalidBuffer`] unless `data` holds exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: impl Into<Vec<u8>>) -> Result<Self> {
        let dimensions = Dimensions::new(width, height);
        let data = data.into();
        let expected = dimensions.byte_len().unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(Error::InvalidBuffer {
                dimensions,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            dimensions,
            data: data.into(),
        })
    }

    /// Create a buffer where every pixel has the same value.
    ///
    /// # Panics
    ///
    /// Panics if the image would not fit in memory.
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        Self::from_fn(width, height, |_, _| pixel)
    }

    /// Create a buffer by evaluating `f` for each pixel coordinate.
    ///
    /// # Panics
    ///
    /// Panics if the image would not fit in memory.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let dimensions = Dimensions::new(width, height);
        let len = dimensions
            .byte_len()
            .expect("image dimensions should fit in memory");
        let mut data = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            dimensions,
            data: data.into(),
        }
    }

    /// Return the width of the image.
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Return the height of the image.
    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Return the size of the image.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The number of pixels in the image.
    pub fn pixel_count(&self) -> u64 {
        self.dimensions.pixel_count()
    }

    /// The raw RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Iterate over the pixels in row-major order.
    pub fn pixels(&self) -> impl ExactSizeIterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    /// Sample the pixel at the given coordinates, if they are inside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let idx = (y as usize * self.width() as usize + x as usize) * 4;
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Return a copy of this image with a single pixel replaced.
    ///
    /// Coordinates outside of the image leave it unchanged.
    pub fn with_pixel(&self, x: u32, y: u32, pixel: [u8; 4]) -> Self {
        let mut data = self.data.to_vec();
        if x < self.width() && y < self.height() {
            let idx = (y as usize * self.width() as usize + x as usize) * 4;
            data[idx..idx + 4].copy_from_slice(&pixel);
        }
        Self {
            dimensions: self.dimensions,
            data: data.into(),
        }
    }

    /// Decode a PNG image.
    ///
    /// Any colour type and bit depth is normalised to RGBA8.
    pub fn from_png(data: impl Read) -> Result<Self, png::DecodingError> {
        let mut decoder = png::Decoder::new(data);
        decoder.set_transformations(
            png::Transformations::normalize_to_color8() | png::Transformations::ALPHA,
        );

        let mut reader = decoder.read_info()?;
        let (width, height) = {
            let info = reader.info();
            (info.width, info.height)
        };
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf)?;
        buf.truncate(frame.buffer_size());

        // Note `reader.info()` returns the pre-transformation color type output, whereas
        // `reader.output_color_type()` takes the transformation into account.
        let (color_type, bit_depth) = reader.output_color_type();
        debug_assert_eq!(
            bit_depth,
            png::BitDepth::Eight,
            "normalize_to_color8 means the bit depth is always 8."
        );

        let data = match color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]])
                .collect(),
            png::ColorType::Rgb | png::ColorType::Grayscale | png::ColorType::Indexed => {
                unreachable!("We set a transformation to always expand to an alpha channel")
            }
        };

        Self::new(width, height, data).map_err(|_| png::DecodingError::LimitsExceeded)
    }

    /// Encode the image as a PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, png::EncodingError> {
        let mut data = Vec::new();
        let mut encoder = png::Encoder::new(&mut data, self.width(), self.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.data)?;
        writer.finish()?;
        Ok(data)
    }

    /// Convert to an [`image::RgbaImage`].
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_raw(self.width(), self.height(), self.data.to_vec())
            .expect("buffer length is validated on construction")
    }
}

impl From<image::RgbaImage> for PixelBuffer {
    fn from(image: image::RgbaImage) -> Self {
        let dimensions = Dimensions::new(image.width(), image.height());
        Self {
            dimensions,
            data: image.into_raw().into(),
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}
