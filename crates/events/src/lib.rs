//! In-process pub/sub for document changes.
//!
//! [`EventBus`] is the broadcast channel the collaboration layer is built
//! on: lock transitions, presence changes, and content writes are published
//! here and fanned out to WebSocket broadcasts and per-session change
//! watchers. [`ChangeWatcher`] filters the stream down to the remote writes
//! relevant to one active editor.

pub mod bus;
pub mod watcher;

pub use bus::{DocumentEvent, DocumentEventKind, EventBus};
pub use watcher::{ChangeWatcher, RemoteChange};
