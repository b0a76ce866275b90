//! Status Surface
//!
//! Read-only HTTP view of the conversation store, plus health and a
//! completion smoke-test route. Unauthenticated: bind it somewhere private.

pub mod api;
pub mod server;

pub use api::{status_router, AppState};
pub use server::{shutdown_signal, StatusServer};
