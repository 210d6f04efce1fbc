//! Quill API server library.
//!
//! Exposes the core building blocks (config, state, error handling, routes,
//! WebSocket infrastructure, edit sessions) so integration tests and the
//! binary entrypoint can both access them.

pub mod auth;
pub mod background;
pub mod collab;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
