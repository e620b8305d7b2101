use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One decoded, resized image with its class index.
/// `pixels` is channel-major (CHW), RGB, values in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels: Vec<f32>,
    pub label:  usize,
}

impl ImageSample {
    pub fn new(pixels: Vec<f32>, label: usize) -> Self {
        Self { pixels, label }
    }

    /// A uniformly coloured image, handy for synthetic data.
    #[cfg(test)]
    pub fn filled(value: f32, image_size: usize, label: usize) -> Self {
        Self::new(vec![value; 3 * image_size * image_size], label)
    }
}

pub struct ImageDataset {
    samples: Vec<ImageSample>,
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>) -> Self { Self { samples } }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Two linearly separable classes: class 0 is all −1, class 1 is all +1.
/// Samples alternate labels so any batch sees both classes.
#[cfg(test)]
pub fn two_tone_samples(count: usize, image_size: usize) -> Vec<ImageSample> {
    (0..count)
        .map(|i| {
            let label = i % 2;
            let value = if label == 0 { -1.0 } else { 1.0 };
            ImageSample::filled(value, image_size, label)
        })
        .collect()
}
