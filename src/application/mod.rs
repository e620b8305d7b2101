// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal: fine-tuning a model or evaluating a saved one.
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The two-stage fine-tuning workflow
pub mod train_use_case;

// Scoring saved weights on validation data
pub mod evaluate_use_case;
