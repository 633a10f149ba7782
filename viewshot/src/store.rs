// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persistence of reference images.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::{Error, PixelBuffer, Result};

/// A mapping from string keys to recorded reference images.
///
/// Keys are usually built with [`reference_key`].
pub trait ReferenceStore {
    /// Load the reference image recorded under `key`.
    ///
    /// Fails with [`Error::ReferenceNotFound`] if nothing was recorded, and
    /// [`Error::StorageReadError`] if the entry can't be read.
    fn load(&self, key: &str) -> Result<PixelBuffer>;

    /// Record `image` under `key`, replacing any existing entry.
    ///
    /// Only fails with [`Error::StorageWriteError`].
    fn record(&mut self, key: &str, image: &PixelBuffer) -> Result<()>;

    /// Whether an entry exists for `key`.
    fn contains(&self, key: &str) -> bool;

    /// A human readable description of where `key` is stored, for diagnostics.
    fn location(&self, key: &str) -> String;
}

/// Replace every character which isn't an ASCII letter, digit, `_`, `-` or `.` with `_`.
///
/// A leading `.` is also replaced, so that identifiers can't name hidden files or parent
/// directories.
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .enumerate()
        .map(|(idx, c)| match c {
            '.' if idx == 0 => '_',
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => c,
            _ => '_',
        })
        .collect()
}

/// The store key for a snapshot identifier under a reference directory suffix.
///
/// With a [`DirectoryStore`], this key maps to `{root}{suffix}/{identifier}.png`.
pub fn reference_key(suffix: &str, identifier: &str) -> String {
    format!("{suffix}/{}", sanitize_identifier(identifier))
}

/// Reference images stored as PNG files below a root directory.
///
/// The key is appended to the root as a string, so the key `_dark/button` with the root
/// `/refs/Images` is stored at `/refs/Images_dark/button.png`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    optimize: bool,
}

impl DirectoryStore {
    /// Create a store rooted at `root`.
    ///
    /// The directory doesn't need to exist until something is recorded.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            optimize: false,
        }
    }

    /// Recompress recorded images with `oxipng`, to reduce the size of committed binary data.
    ///
    /// This has no effect unless the `optimize` feature is enabled.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// The root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// The file an entry is stored in.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut path = OsString::from(self.root.as_os_str());
        path.push(key);
        path.push(".png");
        PathBuf::from(path)
    }

    fn encode(&self, key: &str, image: &PixelBuffer) -> Result<Vec<u8>> {
        let data = image
            .to_png()
            .map_err(|e| Error::storage_write(key, self.location(key), e))?;
        #[cfg(feature = "optimize")]
        if self.optimize {
            return oxipng::optimize_from_memory(&data, &oxipng::Options::max_compression())
                .map_err(|e| Error::storage_write(key, self.location(key), e.to_string()));
        }
        Ok(data)
    }
}

impl ReferenceStore for DirectoryStore {
    fn load(&self, key: &str) -> Result<PixelBuffer> {
        let path = self.path_for(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ReferenceNotFound {
                    key: key.to_owned(),
                    location: path.display().to_string(),
                });
            }
            Err(e) => return Err(Error::storage_read(key, path.display().to_string(), e)),
        };
        PixelBuffer::from_png(data.as_slice())
            .map_err(|e| Error::storage_read(key, path.display().to_string(), e))
    }

    fn record(&mut self, key: &str, image: &PixelBuffer) -> Result<()> {
        let path = self.path_for(key);
        let data = self.encode(key, image)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::storage_write_at(key, &path, e))?;
        }
        std::fs::write(&path, &data).map_err(|e| Error::storage_write_at(key, &path, e))?;
        log::info!(
            "Recorded reference image `{key}` ({}) to {}",
            image.dimensions(),
            path.display()
        );
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn location(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

/// Reference images kept in memory.
///
/// Useful for testing code built on top of [`ReferenceStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    images: HashMap<String, PixelBuffer>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of recorded images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ReferenceStore for MemoryStore {
    fn load(&self, key: &str) -> Result<PixelBuffer> {
        self.images
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound {
                key: key.to_owned(),
                location: self.location(key),
            })
    }

    fn record(&mut self, key: &str, image: &PixelBuffer) -> Result<()> {
        self.images.insert(key.to_owned(), image.clone());
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

    fn location(&self, key: &str) -> String {
        format!("memory:{key}")
    }
}
