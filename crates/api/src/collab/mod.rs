//! Server-side collaboration sessions for WebSocket connections.
//!
//! Presence tracking and edit sessions (lease renewal, remote change
//! watching) for a single connected client.

pub mod presence;
pub mod session;

pub use presence::PresenceTracker;
pub use session::CollabSession;
