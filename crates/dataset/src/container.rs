//! On-demand batch materialization over a manifest.

use crate::manifest::Manifest;
use crate::types::{DatasetError, DatasetResult};
use burn::tensor::{backend::Backend, Tensor};
use image::RgbImage;
use std::path::Path;

/// A materialized minibatch: stacked images plus the matching labels.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Pixel data in `[height, width, channel, count]` layout, normalized to [0, 1].
    pub images: Tensor<B, 4>,
    /// Labels gathered in index order, shape `[1, count]`.
    pub labels: Tensor<B, 2>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.images.dims()[3]
    }

    /// The same pixels permuted to `[count, channel, height, width]` for conv layers.
    pub fn images_nchw(&self) -> Tensor<B, 4> {
        self.images.clone().permute([3, 2, 0, 1])
    }
}

/// Maps index subsets of a manifest to materialized tensor batches.
///
/// Images are re-read from disk on every `get`; nothing decoded is cached.
/// The container owns the manifest but not the underlying files.
#[derive(Debug, Clone)]
pub struct BatchContainer {
    manifest: Manifest,
}

impl BatchContainer {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn from_csv(manifest_path: &Path, base_dir: &Path) -> DatasetResult<Self> {
        Ok(Self::new(Manifest::from_csv(manifest_path, base_dir)?))
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    pub fn label(&self, index: usize) -> f32 {
        self.manifest.sample(index).label
    }

    pub fn labels(&self, indices: &[usize]) -> Vec<f32> {
        indices.iter().map(|&i| self.label(i)).collect()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Materialize the samples at `indices`, in the given order.
    ///
    /// Every image in the batch must decode to the same spatial size; a
    /// missing or corrupt file aborts with a decode error naming the path.
    pub fn get<B: Backend>(
        &self,
        indices: &[usize],
        device: &B::Device,
    ) -> DatasetResult<ImageBatch<B>> {
        if indices.is_empty() {
            return Err(DatasetError::Other(
                "cannot materialize an empty batch".to_string(),
            ));
        }
        let len = self.manifest.len();
        for &index in indices {
            if index >= len {
                return Err(DatasetError::IndexOutOfRange { index, len });
            }
        }

        let mut decoded: Vec<RgbImage> = Vec::with_capacity(indices.len());
        let mut expected: Option<(u32, u32)> = None;
        for &index in indices {
            let sample = self.manifest.sample(index);
            let img = image::open(&sample.path)
                .map_err(|e| DatasetError::Decode {
                    path: sample.path.clone(),
                    source: e,
                })?
                .to_rgb8();
            let (width, height) = img.dimensions();
            match expected {
                None => expected = Some((width, height)),
                Some((w, h)) if (width, height) != (w, h) => {
                    return Err(DatasetError::ShapeMismatch {
                        path: sample.path.clone(),
                        expected_width: w,
                        expected_height: h,
                        actual_width: width,
                        actual_height: height,
                    });
                }
                _ => {}
            }
            decoded.push(img);
        }

        let count = decoded.len();
        let (width, height) = expected.expect("non-empty batch ensures size is set");
        let (w, h) = (width as usize, height as usize);

        // Flat buffer in [h, w, 3, count] order: element (y, x, c, i) lives at
        // ((y * w + x) * 3 + c) * count + i.
        let mut images_buf = vec![0.0f32; h * w * 3 * count];
        for (i, img) in decoded.iter().enumerate() {
            for (x, y, pixel) in img.enumerate_pixels() {
                let base = ((y as usize * w + x as usize) * 3) * count + i;
                images_buf[base] = pixel[0] as f32 / 255.0;
                images_buf[base + count] = pixel[1] as f32 / 255.0;
                images_buf[base + 2 * count] = pixel[2] as f32 / 255.0;
            }
        }
        let labels_buf = self.labels(indices);

        let images = Tensor::<B, 1>::from_floats(images_buf.as_slice(), device)
            .reshape([h, w, 3, count]);
        let labels =
            Tensor::<B, 1>::from_floats(labels_buf.as_slice(), device).reshape([1, count]);

        Ok(ImageBatch { images, labels })
    }
}
