// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewshot is a visual regression testing helper for user interface components.
//!
//! A rendering collaborator turns a view or layer into a [`PixelBuffer`]. Viewshot then
//! compares that buffer against a previously recorded reference image within a
//! configurable [`Tolerance`], or records a new reference image when running in
//! [record mode](RecordMode).
//!
//! ## Getting started
//!
//! ```no_run
//! use viewshot::{PixelBuffer, Snapshotter};
//!
//! # fn render_my_button() -> Result<PixelBuffer, std::io::Error> { unimplemented!() }
//! // Reads `VIEWSHOT_REFERENCE_DIR`, `VIEWSHOT_RECORD` and friends.
//! let mut snapshotter = Snapshotter::from_env().expect("reference directory must be set");
//! snapshotter
//!     .verify(&render_my_button, "my_button", &["_light", ""])
//!     .unwrap();
//! ```
//!
//! Reference images live at `{root}{suffix}/{identifier}.png`. Suffixes are tried in
//! order and the first matching reference wins.
//!
//! ## Pixel comparison
//!
//! Two pixels differ when any of their four channels differs by more than the
//! configured channel threshold (zero by default, meaning exact equality).
//! Pixels which are fully transparent in both images never differ.
//! The comparison passes when the fraction of differing pixels is at most the tolerance.

// LINT SET - lib.rs - v2
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod capture;
mod compare;
mod config;
#[cfg(feature = "flip")]
mod flip;
mod pixel;
mod snapshot;
mod store;

use std::path::Path;

use thiserror::Error;

pub use capture::{Capture, CaptureError, Prerendered};
pub use compare::{
    compare, diff_image, CompareOptions, ComparisonResult, Diagnostic, Tolerance,
    DEFAULT_CHANNEL_THRESHOLD,
};
pub use config::{
    RecordMode, SnapshotConfig, CHANNEL_THRESHOLD_VAR, DIFF_DIR_VAR, RECORD_VAR,
    REFERENCE_DIR_VAR, TOLERANCE_VAR,
};
pub use pixel::{Dimensions, PixelBuffer};
pub use snapshot::{Outcome, Snapshotter, DEFAULT_SUFFIXES};
pub use store::{reference_key, sanitize_identifier, DirectoryStore, MemoryStore, ReferenceStore};

/// Boxed error type used as the cause of storage and capture failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while comparing or recording snapshots.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The candidate and reference images have different sizes.
    #[error("Got wrong size. Expected ({expected}), found ({actual})")]
    DimensionMismatch {
        /// Size of the reference image.
        expected: Dimensions,
        /// Size of the candidate image.
        actual: Dimensions,
    },
    /// More pixels differ than the tolerance allows.
    #[error(
        "Snapshot `{identifier}` differs from its reference: \
        {differing_pixels} of {total_pixels} pixels ({fraction:.4}) differ, tolerance is {tolerance}"
    )]
    Mismatch {
        /// Identifier of the snapshot.
        identifier: String,
        /// Number of pixels which differ beyond the channel threshold.
        differing_pixels: u64,
        /// Number of pixels compared.
        total_pixels: u64,
        /// `differing_pixels / total_pixels`.
        fraction: f64,
        /// The tolerance which was exceeded.
        tolerance: f64,
    },
    /// No reference image has been recorded for the key.
    #[error("Couldn't find reference image for `{key}`. Searched at {location}")]
    ReferenceNotFound {
        /// The store key which was looked up.
        key: String,
        /// Where the store looked.
        location: String,
    },
    /// A reference image exists but could not be read or decoded.
    #[error("Failed to read reference image for `{key}` from {location}")]
    StorageReadError {
        /// The store key which was looked up.
        key: String,
        /// Where the store looked.
        location: String,
        /// The underlying I/O or decoding error.
        source: BoxError,
    },
    /// A reference image or failure artifact could not be written.
    #[error("Failed to write image for `{key}` to {location}")]
    StorageWriteError {
        /// The store key which was written.
        key: String,
        /// Where the store tried to write.
        location: String,
        /// The underlying I/O or encoding error.
        source: BoxError,
    },
    /// The caller supplied no suffixes to try.
    #[error("At least one reference directory suffix must be supplied")]
    EmptySuffixSet,
    /// The reference root directory is not configured.
    #[error("Reference image directory is not configured. Set `{var}` to the root directory")]
    MissingReferenceRoot {
        /// The environment variable which should name the directory.
        var: &'static str,
    },
    /// An environment variable has a value which can't be used.
    #[error("Invalid value `{value}` for `{var}`: {reason}")]
    InvalidConfig {
        /// The offending environment variable.
        var: &'static str,
        /// Its value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A tolerance outside of `[0, 1]`.
    #[error("Tolerance must be a fraction between 0 and 1, got {0}")]
    InvalidTolerance(f64),
    /// Raw pixel data does not match the claimed dimensions.
    #[error("Expected {expected} bytes of RGBA8 data for a {dimensions} image, got {actual}")]
    InvalidBuffer {
        /// The claimed size of the image.
        dimensions: Dimensions,
        /// `width * height * 4`.
        expected: usize,
        /// Length of the supplied data.
        actual: usize,
    },
    /// The rendering collaborator failed to produce an image.
    #[error("Failed to capture `{identifier}`")]
    Capture {
        /// Identifier of the snapshot being captured.
        identifier: String,
        /// The error reported by the renderer.
        source: CaptureError,
    },
}

impl Error {
    pub(crate) fn storage_read(key: &str, location: String, source: impl Into<BoxError>) -> Self {
        Self::StorageReadError {
            key: key.to_owned(),
            location,
            source: source.into(),
        }
    }

    pub(crate) fn storage_write(key: &str, location: String, source: impl Into<BoxError>) -> Self {
        Self::StorageWriteError {
            key: key.to_owned(),
            location,
            source: source.into(),
        }
    }

    pub(crate) fn storage_write_at(key: &str, path: &Path, source: impl Into<BoxError>) -> Self {
        Self::storage_write(key, path.display().to_string(), source)
    }
}

/// Specialization of `Result` for viewshot's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
