// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Turns an image-folder dataset on disk into the per-phase
// batch streams the epoch runner consumes.
//
//   <data-dir>/train/<class>/*.png
//   <data-dir>/val/<class>/*.png
//       │
//       ▼
//   ImageFolderLoader → decodes, resizes, scales to [0, 1]
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher      → stacks samples into [N, 3, S, S] tensors
//       │
//       ▼
//   PhaseData         → one DataLoader per phase + example counts
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads class folders of images into ImageSamples
pub mod loader;

/// Implements Burn's Dataset trait for image samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits samples when there is no val/ folder
pub mod splitter;

/// Per-phase data loaders and dataset sizes
pub mod pipeline;
