//! Persistence collaborator for the monitoring core
//!
//! This module provides a trait-based abstraction over the durable store
//! that holds folders, rules, alerts, the quota ledger, and observation
//! history.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **No engine here**: the core only relies on two storage capabilities —
//!   an atomic increment for the quota ledger, and a uniqueness key on
//!   alerts for idempotent inserts. Everything else is plain CRUD.
//!
//! ## Backends
//!
//! - **In-Memory** (provided): interior-mutability map store, used in tests
//!   and as the reference semantics for any durable implementation

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
