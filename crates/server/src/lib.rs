//! HTTP surface for the scrivano task orchestration service.
//!
//! Exposed as a library so integration tests can build the router
//! in-process with mock collaborators injected.

pub mod api;
pub mod metrics;
pub mod state;
