//! Thin HTTP/WebSocket surface over the extraction pipeline.
//!
//! Triggers runs and exposes the observer channels; all run semantics
//! live in the `pipeline` crate.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
