// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::store::{reference_key, sanitize_identifier};
use crate::{
    compare, diff_image, Capture, ComparisonResult, DirectoryStore, Error, PixelBuffer,
    ReferenceStore, Result, SnapshotConfig,
};

/// Suffixes for callers which keep a single set of reference images.
///
/// This is platform neutral. Callers which keep per-platform or per-scale references pass
/// their own suffixes, most specific first, usually ending with `""`.
pub const DEFAULT_SUFFIXES: &[&str] = &[""];

/// A successful snapshot verification.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome {
    /// The candidate matched the reference under `suffix`.
    Matched {
        /// The first suffix whose reference matched.
        suffix: String,
        /// Statistics of the matching comparison.
        result: ComparisonResult,
    },
    /// The candidate was recorded as the new reference, without being compared.
    Recorded {
        /// The store key it was recorded under.
        key: String,
        /// Where it was stored.
        location: String,
    },
}

impl Outcome {
    /// Whether the outcome was produced by record mode.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

/// Verifies rendered images against the references in a [`ReferenceStore`].
#[derive(Debug)]
pub struct Snapshotter<S = DirectoryStore> {
    store: S,
    config: SnapshotConfig,
}

impl Snapshotter<DirectoryStore> {
    /// Create a snapshotter reading references from `config.reference_root`.
    pub fn new(config: SnapshotConfig) -> Self {
        let store =
            DirectoryStore::new(config.reference_root.clone()).with_optimize(config.optimize);
        Self { store, config }
    }

    /// Create a snapshotter configured by the process environment.
    ///
    /// See [`SnapshotConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        SnapshotConfig::from_env().map(Self::new)
    }
}

impl<S: ReferenceStore> Snapshotter<S> {
    /// Create a snapshotter backed by a custom store.
    ///
    /// `config.reference_root` is only used by [`DirectoryStore`], so is ignored here.
    pub fn with_store(store: S, config: SnapshotConfig) -> Self {
        Self { store, config }
    }

    /// The reference store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Capture `element` and verify it against the references for `identifier`.
    ///
    /// `suffixes` are tried in order, and the first reference which matches wins. In record
    /// mode, the capture is recorded under the first suffix instead of being compared.
    ///
    /// Fails with [`Error::EmptySuffixSet`] before capturing anything if `suffixes` is empty.
    /// If no suffix matches, the error from the most relevant attempt is returned: a read
    /// error is preferred over a mismatch, which is preferred over a missing reference.
    pub fn verify<C, T>(
        &mut self,
        element: &C,
        identifier: &str,
        suffixes: &[T],
    ) -> Result<Outcome>
    where
        C: Capture + ?Sized,
        T: AsRef<str>,
    {
        if suffixes.is_empty() {
            return Err(Error::EmptySuffixSet);
        }
        let candidate = element.capture().map_err(|source| Error::Capture {
            identifier: identifier.to_owned(),
            source,
        })?;
        self.verify_buffer(&candidate, identifier, suffixes)
    }

    /// Verify an already captured image; see [`verify`](Self::verify).
    pub fn verify_buffer<T: AsRef<str>>(
        &mut self,
        candidate: &PixelBuffer,
        identifier: &str,
        suffixes: &[T],
    ) -> Result<Outcome> {
        let Some(first_suffix) = suffixes.first() else {
            return Err(Error::EmptySuffixSet);
        };

        if self.config.record_mode.records(identifier) {
            return self.record(candidate, first_suffix.as_ref(), identifier);
        }

        let mut failure: Option<Error> = None;
        for suffix in suffixes {
            let suffix = suffix.as_ref();
            let key = reference_key(suffix, identifier);
            log::debug!("Comparing `{identifier}` against {}", self.store.location(&key));

            let error = match self.store.load(&key) {
                Ok(reference) => {
                    let result = compare(candidate, &reference, self.config.compare);
                    match result.check(identifier) {
                        Ok(()) => {
                            self.handle_success(suffix, identifier)?;
                            return Ok(Outcome::Matched {
                                suffix: suffix.to_owned(),
                                result,
                            });
                        }
                        Err(e) => {
                            log::warn!(
                                "Snapshot `{identifier}` with suffix `{suffix}`: {}",
                                result.summary()
                            );
                            self.handle_failure(candidate, &reference, suffix, identifier);
                            e
                        }
                    }
                }
                Err(e @ Error::ReferenceNotFound { .. }) => e,
                Err(e) => {
                    log::warn!("Snapshot `{identifier}` with suffix `{suffix}`: {e}");
                    e
                }
            };

            // Ties keep the earlier suffix's error.
            if failure
                .as_ref()
                .map_or(true, |kept| relevance(&error) > relevance(kept))
            {
                failure = Some(error);
            }
        }

        match failure {
            Some(Error::ReferenceNotFound { .. })
                if self.config.record_mode.records_missing(identifier) =>
            {
                self.record(candidate, first_suffix.as_ref(), identifier)
            }
            Some(error @ Error::ReferenceNotFound { .. }) => {
                self.handle_missing(candidate, first_suffix.as_ref(), identifier);
                Err(error)
            }
            Some(error) => Err(error),
            None => Err(Error::EmptySuffixSet),
        }
    }

    fn record(
        &mut self,
        candidate: &PixelBuffer,
        suffix: &str,
        identifier: &str,
    ) -> Result<Outcome> {
        let key = reference_key(suffix, identifier);
        self.store.record(&key, candidate)?;
        let location = self.store.location(&key);
        log::info!("Recorded snapshot `{identifier}` to {location}");
        Ok(Outcome::Recorded { key, location })
    }

    /// Remove stale failure artifacts from a previous run.
    fn handle_success(&self, suffix: &str, identifier: &str) -> Result<()> {
        let Some(diff_dir) = &self.config.diff_dir else {
            return Ok(());
        };
        for path in artifact_paths(diff_dir, suffix, identifier) {
            match std::fs::remove_file(&path) {
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(e) => return Err(Error::storage_write_at(identifier, &path, e)),
            }
        }
        Ok(())
    }

    /// Write the candidate for a snapshot without any reference, so it can be promoted.
    ///
    /// Errors writing the candidate are only logged.
    fn handle_missing(&self, candidate: &PixelBuffer, suffix: &str, identifier: &str) {
        let Some(diff_dir) = &self.config.diff_dir else {
            return;
        };
        let [candidate_path, _] = artifact_paths(diff_dir, suffix, identifier);
        let written = std::fs::create_dir_all(diff_dir)
            .map_err(|e| Error::storage_write_at(identifier, diff_dir, e))
            .and_then(|()| write_png(identifier, &candidate_path, candidate));
        match written {
            Ok(()) => log::warn!(
                "Couldn't find a reference for snapshot `{identifier}`\n\
                Test result written to {}\n\
                Use `{}={identifier}` to record it",
                candidate_path.display(),
                crate::RECORD_VAR
            ),
            Err(e) => log::error!("Couldn't write result for `{identifier}`: {e}"),
        }
    }

    /// Write the candidate and a diff image next to each other, for inspection.
    ///
    /// Errors writing the artifacts are only logged.
    fn handle_failure(
        &self,
        candidate: &PixelBuffer,
        reference: &PixelBuffer,
        suffix: &str,
        identifier: &str,
    ) {
        let Some(diff_dir) = &self.config.diff_dir else {
            return;
        };
        let [candidate_path, diff_path] = artifact_paths(diff_dir, suffix, identifier);
        let diff = diff_image(candidate, reference, self.config.compare.channel_threshold);
        let written = std::fs::create_dir_all(diff_dir)
            .map_err(|e| Error::storage_write_at(identifier, diff_dir, e))
            .and_then(|()| write_png(identifier, &candidate_path, candidate))
            .and_then(|()| write_diff(identifier, &diff_path, &diff));
        match written {
            Ok(()) => log::warn!(
                "Wrote result for failing snapshot `{identifier}` to {}\n\
                Use `{}={identifier}` to update",
                candidate_path.display(),
                crate::RECORD_VAR
            ),
            Err(e) => log::error!("Couldn't write failure artifacts for `{identifier}`: {e}"),
        }
    }
}

/// How much an error from one suffix says about why verification failed.
fn relevance(error: &Error) -> u8 {
    match error {
        Error::ReferenceNotFound { .. } => 0,
        Error::Mismatch { .. } | Error::DimensionMismatch { .. } => 1,
        _ => 2,
    }
}

/// Paths of the candidate and diff images written when a comparison fails.
///
/// The suffix is separated by `@`, which [`sanitize_identifier`] never produces, so distinct
/// identifier and suffix pairs can't share files.
fn artifact_paths(diff_dir: &Path, suffix: &str, identifier: &str) -> [PathBuf; 2] {
    let identifier = sanitize_identifier(identifier);
    let stem = if suffix.is_empty() {
        identifier
    } else {
        format!("{identifier}@{}", sanitize_identifier(suffix))
    };
    [
        diff_dir.join(format!("{stem}.new.png")),
        diff_dir.join(format!("{stem}.diff.png")),
    ]
}

fn write_png(key: &str, path: &Path, image: &PixelBuffer) -> Result<()> {
    let data = image
        .to_png()
        .map_err(|e| Error::storage_write_at(key, path, e))?;
    std::fs::write(path, data).map_err(|e| Error::storage_write_at(key, path, e))
}

fn write_diff(key: &str, path: &Path, diff: &image::RgbaImage) -> Result<()> {
    let mut data = Vec::new();
    diff.write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .map_err(|e| Error::storage_write_at(key, path, e))?;
    std::fs::write(path, data).map_err(|e| Error::storage_write_at(key, path, e))
}
