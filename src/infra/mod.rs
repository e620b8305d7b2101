// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system concerns shared by the other layers:
//
//   checkpoint.rs — weight files (Burn NamedMpkFileRecorder,
//                   full precision), default file naming from
//                   the model type, and the run config JSON
//                   that `evaluate` uses to rebuild a model
//
//   metrics.rs    — one CSV row per phase per epoch
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Weight files and run configuration
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
