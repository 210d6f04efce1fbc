//! Background maintenance tasks.
//!
//! Spawned from `main.rs` and stopped via `CancellationToken` during
//! graceful shutdown.

pub mod collab_gc;
