//! Quill domain logic.
//!
//! Pure types, validation, and policy shared by the repository layer, the
//! API/WebSocket handlers, and any future CLI tooling. This crate has no
//! internal dependencies: everything here must be usable without a database
//! connection or a running server.

pub mod collaboration;
pub mod conflict;
pub mod documents;
pub mod error;
pub mod roles;
pub mod tree;
pub mod types;
