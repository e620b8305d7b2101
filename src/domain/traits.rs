// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training core only needs one capability from the
// outside world that is not a tensor operation: somewhere to
// write the best weights. It is a trait so the runner can be
// driven by the file-backed WeightFile in production
// and by an in-memory recorder in tests.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

// ─── WeightSink ───────────────────────────────────────────────────────────────
/// Durable destination for model snapshots.
///
/// Implementations:
///   - WeightFile     → one weight file on disk, overwritten each time
///   - test recorders → count or keep every write
pub trait WeightSink<M> {
    /// Overwrite the stored weights with `model`.
    fn persist(&mut self, model: &M) -> Result<()>;
}
