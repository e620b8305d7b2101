// ============================================================
// Layer 4 — Per-Phase Data
// ============================================================
// The epoch runner asks for two things per phase:
//
//   - a stream of (images, targets) batches
//   - the total number of examples in that phase
//
// Train batches live on the autodiff backend (B) so gradients
// can flow. Validate batches live on the inner backend
// (B::InnerBackend), the same backend as model.valid(), so
// validation never builds an autodiff graph.
//
// Loaders are built without worker threads: each batch is
// produced on the training thread right before it is used.

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::{ImageDataset, ImageSample},
};
use crate::domain::phase::Phase;

/// Example count of each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSizes {
    pub train: usize,
    pub valid: usize,
}

impl DatasetSizes {
    pub fn get(&self, phase: Phase) -> usize {
        match phase {
            Phase::Train    => self.train,
            Phase::Validate => self.valid,
        }
    }
}

pub struct PhaseData<B: AutodiffBackend> {
    pub train: Arc<dyn DataLoader<ImageBatch<B>>>,
    pub valid: Arc<dyn DataLoader<ImageBatch<B::InnerBackend>>>,
    pub sizes: DatasetSizes,
}

impl<B: AutodiffBackend> PhaseData<B> {
    /// Build both loaders. Train batches are reshuffled every epoch
    /// from `shuffle_seed`; validate batches keep dataset order.
    pub fn new(
        train_samples: Vec<ImageSample>,
        valid_samples: Vec<ImageSample>,
        batch_size:    usize,
        image_size:    usize,
        shuffle_seed:  u64,
        device:        &B::Device,
    ) -> Self {
        let sizes = DatasetSizes {
            train: train_samples.len(),
            valid: valid_samples.len(),
        };

        let train_batcher = ImageBatcher::<B>::new(device.clone(), image_size);
        let train = DataLoaderBuilder::new(train_batcher)
            .batch_size(batch_size)
            .shuffle(shuffle_seed)
            .build(ImageDataset::new(train_samples));

        let valid = ordered_loader::<B::InnerBackend>(valid_samples, batch_size, image_size, device);

        Self { train, valid, sizes }
    }
}

/// Unshuffled loader on a plain backend, for validation and evaluation.
pub fn ordered_loader<B: Backend>(
    samples:    Vec<ImageSample>,
    batch_size: usize,
    image_size: usize,
    device:     &B::Device,
) -> Arc<dyn DataLoader<ImageBatch<B>>> {
    let batcher = ImageBatcher::<B>::new(device.clone(), image_size);
    DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .build(ImageDataset::new(samples))
}
