// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rendering capability used to produce candidate images.

use crate::{BoxError, PixelBuffer};

/// Error reported by a [`Capture`] implementation.
pub type CaptureError = BoxError;

/// Something which can be rendered into a [`PixelBuffer`].
///
/// Viewshot never renders anything itself; the UI toolkit under test implements this for
/// its views or layers. Closures returning `Result<PixelBuffer, E>` implement it too.
pub trait Capture {
    /// Render into a new buffer.
    fn capture(&self) -> Result<PixelBuffer, CaptureError>;
}

impl<F, E> Capture for F
where
    F: Fn() -> Result<PixelBuffer, E>,
    E: Into<CaptureError>,
{
    fn capture(&self) -> Result<PixelBuffer, CaptureError> {
        self().map_err(Into::into)
    }
}

/// An image which has already been rendered.
#[derive(Debug, Clone)]
pub struct Prerendered(pub PixelBuffer);

impl Capture for Prerendered {
    fn capture(&self) -> Result<PixelBuffer, CaptureError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_capture() {
        let render = || PixelBuffer::new(1, 1, vec![1, 2, 3, 4]);
        let buffer = render.capture().unwrap();
        assert_eq!(buffer.pixel(0, 0), Some([1, 2, 3, 4]));
    }

    #[test]
    fn closure_errors_are_boxed() {
        let render = || -> Result<PixelBuffer, std::io::Error> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no window"))
        };
        let err = render.capture().unwrap_err();
        assert_eq!(err.to_string(), "no window");
    }
}
