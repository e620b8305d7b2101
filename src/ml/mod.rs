// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// Everything that runs tensors lives here.
//
//   model.rs        — TeacherNet / StudentNet: conv backbone +
//                     classification head, with freeze/unfreeze
//   scheduler.rs    — metric-driven plateau learning-rate policy
//   epoch_runner.rs — train + validate loop for one stage,
//                     best-checkpoint tracking, metrics rows
//   staged.rs       — the two-stage fine-tuning controller and
//                     its per-role presets
//
// Backends: training runs on Autodiff<ComputeBackend>;
// model.valid() drops to ComputeBackend for validation and
// evaluation. ComputeBackend is NdArray (CPU) unless the `wgpu`
// feature is enabled.
//
// Reference: Burn Book §5 (Training)

pub mod model;
pub mod scheduler;
pub mod epoch_runner;
pub mod staged;

#[cfg(not(feature = "wgpu"))]
pub type ComputeBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type ComputeBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<ComputeBackend>;
