use dataset::{BatchContainer, DatasetError, Manifest};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

type TestBackend = burn_ndarray::NdArray<f32>;

/// Write a solid-color PNG of the given size.
fn write_image(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    let mut img = RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = Rgb(color);
    }
    img.save(path).unwrap();
}

/// Write images plus a matching two-column CSV manifest, returning its path.
fn write_dataset(dir: &Path, rows: &[(&str, f32, u32, u32, [u8; 3])]) -> std::path::PathBuf {
    let mut csv = String::from("filename,label\n");
    for (name, label, width, height, color) in rows {
        write_image(&dir.join(name), *width, *height, *color);
        csv.push_str(&format!("{name},{label}\n"));
    }
    let manifest_path = dir.join("manifest.csv");
    fs::write(&manifest_path, csv).unwrap();
    manifest_path
}

#[test]
fn container_len_matches_manifest_rows() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = write_dataset(
        temp.path(),
        &[
            ("a.png", 0.0, 4, 4, [255, 0, 0]),
            ("b.png", 1.0, 4, 4, [0, 255, 0]),
            ("c.png", 1.0, 4, 4, [0, 0, 255]),
        ],
    );
    let container = BatchContainer::from_csv(&manifest, temp.path()).unwrap();
    assert_eq!(container.len(), 3);
    assert!(!container.is_empty());
}

#[test]
fn batch_dims_follow_indices_and_image_size() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = write_dataset(
        temp.path(),
        &[
            ("a.png", 0.0, 8, 6, [255, 0, 0]),
            ("b.png", 1.0, 8, 6, [0, 255, 0]),
            ("c.png", 1.0, 8, 6, [0, 0, 255]),
            ("d.png", 0.0, 8, 6, [0, 0, 0]),
        ],
    );
    let container = BatchContainer::from_csv(&manifest, temp.path()).unwrap();
    let device = Default::default();
    let batch = container.get::<TestBackend>(&[0, 2, 3], &device).unwrap();

    // Layout is [height, width, channel, count].
    assert_eq!(batch.images.dims(), [6, 8, 3, 3]);
    assert_eq!(batch.labels.dims(), [1, 3]);
    assert_eq!(batch.batch_size(), 3);
    assert_eq!(batch.images_nchw().dims(), [3, 3, 6, 8]);

    // Labels gathered in index order.
    let labels: Vec<f32> = batch.labels.into_data().to_vec::<f32>().unwrap();
    assert_eq!(labels, vec![0.0, 1.0, 0.0]);
}

#[test]
fn pixel_values_are_normalized_per_channel() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = write_dataset(
        temp.path(),
        &[
            ("red.png", 1.0, 2, 2, [255, 0, 0]),
            ("grey.png", 0.0, 2, 2, [51, 51, 51]),
        ],
    );
    let container = BatchContainer::from_csv(&manifest, temp.path()).unwrap();
    let device = Default::default();
    let batch = container.get::<TestBackend>(&[0, 1], &device).unwrap();
    let data: Vec<f32> = batch.images.into_data().to_vec::<f32>().unwrap();

    // [h, w, 3, n] flat order: (y, x, c, i) at ((y * w + x) * 3 + c) * n + i.
    let at = |y: usize, x: usize, c: usize, i: usize| data[((y * 2 + x) * 3 + c) * 2 + i];
    assert!((at(0, 0, 0, 0) - 1.0).abs() < 1e-6); // red image, R channel
    assert!(at(0, 0, 1, 0).abs() < 1e-6); // red image, G channel
    assert!((at(1, 1, 0, 1) - 0.2).abs() < 1e-6); // grey image, 51/255
}

#[test]
fn missing_file_is_a_decode_error() {
    let temp = tempfile::tempdir().unwrap();
    let manifest_path = temp.path().join("manifest.csv");
    fs::write(&manifest_path, "filename,label\nmissing.png,1.0\n").unwrap();
    let container = BatchContainer::from_csv(&manifest_path, temp.path()).unwrap();
    let device = Default::default();
    let err = container.get::<TestBackend>(&[0], &device).unwrap_err();
    match err {
        DatasetError::Decode { path, .. } => {
            assert!(path.ends_with("missing.png"));
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn mixed_image_sizes_fail_shape_check() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = write_dataset(
        temp.path(),
        &[
            ("a.png", 0.0, 4, 4, [255, 0, 0]),
            ("b.png", 1.0, 6, 4, [0, 255, 0]),
        ],
    );
    let container = BatchContainer::from_csv(&manifest, temp.path()).unwrap();
    let device = Default::default();
    let err = container.get::<TestBackend>(&[0, 1], &device).unwrap_err();
    match err {
        DatasetError::ShapeMismatch {
            path,
            expected_width,
            actual_width,
            ..
        } => {
            assert!(path.ends_with("b.png"));
            assert_eq!(expected_width, 4);
            assert_eq!(actual_width, 6);
        }
        other => panic!("expected shape mismatch, got {other:?}"),
    }
}

#[test]
fn out_of_range_index_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = write_dataset(temp.path(), &[("a.png", 0.0, 2, 2, [255, 0, 0])]);
    let container = BatchContainer::from_csv(&manifest, temp.path()).unwrap();
    let device = Default::default();
    let err = container.get::<TestBackend>(&[0, 5], &device).unwrap_err();
    assert!(matches!(
        err,
        DatasetError::IndexOutOfRange { index: 5, len: 1 }
    ));
}

#[test]
fn empty_batch_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let manifest = write_dataset(temp.path(), &[("a.png", 0.0, 2, 2, [255, 0, 0])]);
    let container = BatchContainer::from_csv(&manifest, temp.path()).unwrap();
    let device = Default::default();
    assert!(container.get::<TestBackend>(&[], &device).is_err());
}

#[test]
fn manifest_requires_two_columns() {
    let temp = tempfile::tempdir().unwrap();
    let manifest_path = temp.path().join("manifest.csv");
    fs::write(&manifest_path, "filename\na.png\n").unwrap();
    let err = Manifest::from_csv(&manifest_path, temp.path()).unwrap_err();
    assert!(matches!(err, DatasetError::Manifest { .. }));
}

#[test]
fn manifest_rejects_non_numeric_labels() {
    let temp = tempfile::tempdir().unwrap();
    let manifest_path = temp.path().join("manifest.csv");
    fs::write(&manifest_path, "filename,label\na.png,cat\n").unwrap();
    let err = Manifest::from_csv(&manifest_path, temp.path()).unwrap_err();
    assert!(matches!(err, DatasetError::Manifest { .. }));
}

#[test]
fn parallel_columns_must_be_index_aligned() {
    let temp = tempfile::tempdir().unwrap();
    let err = Manifest::from_columns(
        vec!["a.png".to_string(), "b.png".to_string()],
        vec![1.0],
        temp.path(),
    )
    .unwrap_err();
    assert!(matches!(err, DatasetError::Manifest { .. }));

    let manifest = Manifest::from_columns(
        vec!["a.png".to_string(), "b.png".to_string()],
        vec![1.0, 0.0],
        temp.path(),
    )
    .unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.sample(1).label, 0.0);
}
