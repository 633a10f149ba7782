// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trying reference directory suffixes in order.

use std::cell::Cell;
use std::convert::Infallible;
use std::path::Path;

use viewshot::{
    DirectoryStore, Error, Outcome, PixelBuffer, RecordMode, ReferenceStore, SnapshotConfig,
    Snapshotter,
};
use viewshot_tests::{capture, palette, render, Rect, Scene, TestParams};

fn toolbar(accent: [u8; 4]) -> Scene {
    let mut scene = Scene::new();
    scene.fill_rect(Rect::new(0., 0., 32., 8.), palette::WHITE);
    scene.fill_rect(Rect::new(2., 2., 10., 6.), accent);
    scene
}

/// Record `scene` under each of `suffixes` directly through the store.
fn seed(root: &Path, identifier: &str, entries: &[(&str, &Scene)], params: &TestParams) {
    let mut store = DirectoryStore::new(root);
    for (suffix, scene) in entries {
        let key = viewshot::reference_key(suffix, identifier);
        store.record(&key, &render(scene, params)).unwrap();
    }
}

#[test]
fn first_matching_suffix_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let params = TestParams::new("toolbar", 32, 8);
    let dark = toolbar(palette::BLACK);
    let light = toolbar(palette::BLUE);
    seed(
        &root,
        "toolbar",
        &[("_dark", &dark), ("_light", &light), ("", &light)],
        &params,
    );

    let mut snapshotter = Snapshotter::new(SnapshotConfig::new(&root));
    let outcome = snapshotter
        .verify(&capture(&light, &params), "toolbar", &["_dark", "_light", ""])
        .unwrap();
    assert!(matches!(outcome, Outcome::Matched { ref suffix, .. } if suffix == "_light"));

    let outcome = snapshotter
        .verify(&capture(&dark, &params), "toolbar", &["_dark", "_light", ""])
        .unwrap();
    assert!(matches!(outcome, Outcome::Matched { ref suffix, .. } if suffix == "_dark"));
}

#[test]
fn missing_suffix_directories_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let params = TestParams::new("toolbar", 32, 8);
    let scene = toolbar(palette::GREEN);
    seed(&root, "toolbar", &[("", &scene)], &params);

    let mut snapshotter = Snapshotter::new(SnapshotConfig::new(&root));
    let outcome = snapshotter
        .verify(&capture(&scene, &params), "toolbar", &["_64", "_32", ""])
        .unwrap();
    assert!(matches!(outcome, Outcome::Matched { ref suffix, .. } if suffix.is_empty()));
}

#[test]
fn corrupt_reference_is_not_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let params = TestParams::new("toolbar", 32, 8);
    let scene = toolbar(palette::RED);

    let corrupt = DirectoryStore::new(&root).path_for("_dark/toolbar");
    std::fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    std::fs::write(&corrupt, b"not a png").unwrap();

    let mut snapshotter = Snapshotter::new(SnapshotConfig::new(&root));
    let err = snapshotter
        .verify(&capture(&scene, &params), "toolbar", &["_dark", "_light"])
        .unwrap_err();
    assert!(matches!(err, Error::StorageReadError { .. }), "{err}");
}

#[test]
fn corrupt_reference_outranks_later_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let params = TestParams::new("toolbar", 32, 8);
    seed(&root, "toolbar", &[("_light", &toolbar(palette::RED))], &params);

    let corrupt = DirectoryStore::new(&root).path_for("_dark/toolbar");
    std::fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    std::fs::write(&corrupt, b"not a png").unwrap();

    let mut snapshotter = Snapshotter::new(SnapshotConfig::new(&root));
    let scene = toolbar(palette::BLUE);
    let err = snapshotter
        .verify(&capture(&scene, &params), "toolbar", &["_dark", "_light"])
        .unwrap_err();
    assert!(matches!(err, Error::StorageReadError { .. }), "{err}");

    let small = TestParams::new("toolbar", 4, 4);
    let err = snapshotter
        .verify(&capture(&scene, &small), "toolbar", &["_dark", "_light"])
        .unwrap_err();
    assert!(matches!(err, Error::StorageReadError { .. }), "{err}");
}

#[test]
fn missing_reference_leaves_candidate_to_promote() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let diff_dir = dir.path().join("diffs");
    let params = TestParams::new("toolbar", 32, 8);
    let scene = toolbar(palette::GREEN);

    let config = SnapshotConfig::new(&root).with_diff_dir(&diff_dir);
    let mut snapshotter = Snapshotter::new(config);
    let err = snapshotter
        .verify(&capture(&scene, &params), "toolbar", &["_dark", ""])
        .unwrap_err();
    assert!(matches!(err, Error::ReferenceNotFound { .. }), "{err}");

    let written = std::fs::File::open(diff_dir.join("toolbar@_dark.new.png")).unwrap();
    assert_eq!(
        PixelBuffer::from_png(written).unwrap(),
        render(&scene, &params)
    );
    assert!(!root.exists());
}

#[test]
fn empty_suffix_set_fails_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let rendered = Cell::new(0);
    let render_view = || {
        rendered.set(rendered.get() + 1);
        Ok::<_, Infallible>(PixelBuffer::filled(4, 4, palette::RED))
    };

    let config = SnapshotConfig::new(&root).with_record_mode(RecordMode::All);
    let mut snapshotter = Snapshotter::new(config);
    let no_suffixes: &[&str] = &[];
    let err = snapshotter
        .verify(&render_view, "button", no_suffixes)
        .unwrap_err();

    assert!(matches!(err, Error::EmptySuffixSet));
    assert_eq!(rendered.get(), 0);
    assert!(!root.exists());
}

#[test]
fn record_mode_writes_first_suffix_only() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ReferenceImages");
    let params = TestParams::new("toolbar", 32, 8);
    let old = toolbar(palette::BLACK);
    let new = toolbar(palette::BLUE);
    seed(&root, "toolbar", &[("_dark", &old), ("_light", &old)], &params);

    let config = SnapshotConfig::new(&root).with_record_mode(RecordMode::parse("toolbar"));
    let mut snapshotter = Snapshotter::new(config);
    let outcome = snapshotter
        .verify(&capture(&new, &params), "toolbar", &["_dark", "_light"])
        .unwrap();
    assert!(outcome.is_recorded());

    let store = DirectoryStore::new(&root);
    assert_eq!(store.load("_dark/toolbar").unwrap(), render(&new, &params));
    assert_eq!(store.load("_light/toolbar").unwrap(), render(&old, &params));
}

#[test]
fn record_mode_write_errors_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("ReferenceImages");
    std::fs::write(&blocker, b"a file where the directory should be").unwrap();

    let params = TestParams::new("toolbar", 32, 8);
    let config = SnapshotConfig::new(&blocker).with_record_mode(RecordMode::All);
    let mut snapshotter = Snapshotter::new(config);
    let err = snapshotter
        .verify(&capture(&toolbar(palette::RED), &params), "toolbar", &["/nested"])
        .unwrap_err();
    assert!(matches!(err, Error::StorageWriteError { .. }), "{err}");
}
