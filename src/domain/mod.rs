// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe a fine-tuning run:
// which phase we are in, which stage we are in, how a phase
// tallies its loss and correct predictions, and which model
// snapshot is currently the best one.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// The snapshot stored in BestState is generic, so the ML layer
// can put a Burn module in it while the unit tests here use
// plain numbers.
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Generics)

// Train / Validate phase of an epoch
pub mod phase;

// Frozen / Unfrozen stage and the controller state machine
pub mod stage;

// Running loss + correct count for one phase
pub mod tally;

// Best validation accuracy and the snapshot that achieved it
pub mod best_state;

// Core abstractions (traits) that other layers implement
pub mod traits;

// Teacher / Student routine presets
pub mod role;
