// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration of snapshot runs, usually from environment variables.

use std::path::PathBuf;

use crate::{CompareOptions, Error, Result, Tolerance};

/// Root directory of the reference images. Required.
pub const REFERENCE_DIR_VAR: &str = "VIEWSHOT_REFERENCE_DIR";
/// Which snapshots to record instead of compare; see [`RecordMode::parse`].
pub const RECORD_VAR: &str = "VIEWSHOT_RECORD";
/// Directory to write the candidate and diff images of failing snapshots to.
pub const DIFF_DIR_VAR: &str = "VIEWSHOT_DIFF_DIR";
/// Default [`Tolerance`], as a fraction of pixels.
pub const TOLERANCE_VAR: &str = "VIEWSHOT_TOLERANCE";
/// Default per-channel threshold, from 0 to 255.
pub const CHANNEL_THRESHOLD_VAR: &str = "VIEWSHOT_CHANNEL_THRESHOLD";

/// Whether a snapshot run writes new reference images.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// Always compare against the existing reference.
    #[default]
    Off,
    /// Record snapshots which have no reference yet, compare the rest.
    Missing,
    /// Record every snapshot.
    All,
    /// Record the snapshots with these identifiers (compared ignoring ASCII case).
    Only(Vec<String>),
}

impl RecordMode {
    /// Parse the value of [`RECORD_VAR`].
    ///
    /// Accepts `all` (or `1`, `true`), `missing`, `off` (or `0`, `false`, empty), and
    /// otherwise a comma separated list of snapshot identifiers.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty()
            || value == "0"
            || value.eq_ignore_ascii_case("off")
            || value.eq_ignore_ascii_case("false")
        {
            return Self::Off;
        }
        if value == "1" || value.eq_ignore_ascii_case("all") || value.eq_ignore_ascii_case("true") {
            return Self::All;
        }
        if value.eq_ignore_ascii_case("missing") {
            return Self::Missing;
        }
        let names: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        if names.is_empty() {
            Self::Off
        } else {
            Self::Only(names)
        }
    }

    /// Whether the snapshot named `identifier` is unconditionally recorded.
    pub fn records(&self, identifier: &str) -> bool {
        match self {
            Self::Off | Self::Missing => false,
            Self::All => true,
            Self::Only(names) => names.iter().any(|name| name.eq_ignore_ascii_case(identifier)),
        }
    }

    /// Whether a snapshot without any reference is recorded rather than failing.
    pub fn records_missing(&self, identifier: &str) -> bool {
        matches!(self, Self::Missing) || self.records(identifier)
    }
}

/// Settings shared by all snapshots of a test run.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    /// Directory that reference directory suffixes are appended to.
    pub reference_root: PathBuf,
    /// Which snapshots to record.
    pub record_mode: RecordMode,
    /// Where to write the candidate and diff images of failing snapshots.
    pub diff_dir: Option<PathBuf>,
    /// How candidates are compared to references.
    pub compare: CompareOptions,
    /// Recompress recorded images.
    pub optimize: bool,
}

impl SnapshotConfig {
    /// Configuration which compares exactly against references under `reference_root`.
    pub fn new(reference_root: impl Into<PathBuf>) -> Self {
        Self {
            reference_root: reference_root.into(),
            record_mode: RecordMode::Off,
            diff_dir: None,
            compare: CompareOptions::default(),
            optimize: false,
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// Fails with [`Error::MissingReferenceRoot`] if [`REFERENCE_DIR_VAR`] is unset or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration using `lookup` to resolve variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let reference_root = lookup(REFERENCE_DIR_VAR)
            .filter(|root| !root.trim().is_empty())
            .ok_or(Error::MissingReferenceRoot {
                var: REFERENCE_DIR_VAR,
            })?;
        let mut config = Self::new(reference_root);

        if let Some(value) = lookup(RECORD_VAR) {
            config.record_mode = RecordMode::parse(&value);
        }
        config.diff_dir = lookup(DIFF_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        if let Some(value) = lookup(TOLERANCE_VAR) {
            let fraction = value.trim().parse::<f64>().map_err(|e| Error::InvalidConfig {
                var: TOLERANCE_VAR,
                value: value.clone(),
                reason: e.to_string(),
            })?;
            config.compare.tolerance = Tolerance::new(fraction).map_err(|e| Error::InvalidConfig {
                var: TOLERANCE_VAR,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(value) = lookup(CHANNEL_THRESHOLD_VAR) {
            config.compare.channel_threshold =
                value.trim().parse::<u8>().map_err(|e| Error::InvalidConfig {
                    var: CHANNEL_THRESHOLD_VAR,
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(config)
    }

    /// Sets the record mode.
    pub fn with_record_mode(mut self, record_mode: RecordMode) -> Self {
        self.record_mode = record_mode;
        self
    }

    /// Sets the directory for failure artifacts.
    pub fn with_diff_dir(mut self, diff_dir: impl Into<PathBuf>) -> Self {
        self.diff_dir = Some(diff_dir.into());
        self
    }

    /// Sets the comparison options.
    pub fn with_compare_options(mut self, compare: impl Into<CompareOptions>) -> Self {
        self.compare = compare.into();
        self
    }

    /// Enables or disables recompression of recorded images.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| vars.get(name).map(|value| (*value).to_owned())
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = SnapshotConfig::from_lookup(lookup(&[(RECORD_VAR, "all")])).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingReferenceRoot {
                var: REFERENCE_DIR_VAR
            }
        ));
        let err = SnapshotConfig::from_lookup(lookup(&[(REFERENCE_DIR_VAR, "  ")])).unwrap_err();
        assert!(matches!(err, Error::MissingReferenceRoot { .. }));
    }

    #[test]
    fn defaults() {
        let config = SnapshotConfig::from_lookup(lookup(&[(REFERENCE_DIR_VAR, "/refs")])).unwrap();
        assert_eq!(config, SnapshotConfig::new("/refs"));
        assert_eq!(config.compare.tolerance, Tolerance::EXACT);
        assert_eq!(config.compare.channel_threshold, 0);
    }

    #[test]
    fn reads_all_variables() {
        let config = SnapshotConfig::from_lookup(lookup(&[
            (REFERENCE_DIR_VAR, "/refs"),
            (RECORD_VAR, "button, Slider"),
            (DIFF_DIR_VAR, "/tmp/diffs"),
            (TOLERANCE_VAR, "0.05"),
            (CHANNEL_THRESHOLD_VAR, "2"),
        ]))
        .unwrap();
        assert_eq!(config.reference_root, PathBuf::from("/refs"));
        assert_eq!(
            config.record_mode,
            RecordMode::Only(vec!["button".into(), "Slider".into()])
        );
        assert_eq!(config.diff_dir, Some(PathBuf::from("/tmp/diffs")));
        assert_eq!(config.compare.tolerance.get(), 0.05);
        assert_eq!(config.compare.channel_threshold, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (var, value) in [
            (TOLERANCE_VAR, "lots"),
            (TOLERANCE_VAR, "1.5"),
            (CHANNEL_THRESHOLD_VAR, "256"),
        ] {
            let vars = [(REFERENCE_DIR_VAR, "/refs"), (var, value)];
            let err = SnapshotConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfig { var: v, .. } if v == var),
                "{var}={value} gave {err}"
            );
        }
    }

    #[test]
    fn record_mode_parsing() {
        assert_eq!(RecordMode::parse(""), RecordMode::Off);
        assert_eq!(RecordMode::parse("0"), RecordMode::Off);
        assert_eq!(RecordMode::parse(" ALL "), RecordMode::All);
        assert_eq!(RecordMode::parse("1"), RecordMode::All);
        assert_eq!(RecordMode::parse("missing"), RecordMode::Missing);
        assert_eq!(RecordMode::parse(",,"), RecordMode::Off);
        assert_eq!(
            RecordMode::parse("a,,b"),
            RecordMode::Only(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn record_mode_selection() {
        let only = RecordMode::parse("Button");
        assert!(only.records("button"));
        assert!(!only.records("slider"));
        assert!(only.records_missing("button"));
        assert!(!only.records_missing("slider"));

        assert!(!RecordMode::Missing.records("button"));
        assert!(RecordMode::Missing.records_missing("button"));
        assert!(RecordMode::All.records("anything"));
        assert!(!RecordMode::Off.records_missing("anything"));
    }
}
