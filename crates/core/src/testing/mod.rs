//! Testing utilities and mock implementations.
//!
//! Mock implementations of the external collaborator traits, so the
//! orchestrator and server can be exercised end-to-end without real
//! infrastructure (NATS, an object store).
//!
//! # Example
//!
//! ```rust,ignore
//! use scrivano_core::testing::{MockObjectStore, MockWorkQueue};
//!
//! let objects = MockObjectStore::new();
//! let queue = MockWorkQueue::new();
//!
//! // Simulate a broker outage for the next publish.
//! queue.set_fail_always(true).await;
//! ```

mod mock_object_store;
mod mock_work_queue;

pub use mock_object_store::MockObjectStore;
pub use mock_work_queue::MockWorkQueue;
