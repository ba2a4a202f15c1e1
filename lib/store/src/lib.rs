//! TTL key-value storage for waybill.
//!
//! This crate provides:
//!
//! - **Backends**: the fallible [`KeyValueBackend`] contract with an
//!   in-process implementation and a NATS JetStream key-value implementation
//! - **Retry**: [`Retrying`], a wrapper that adds bounded retries to any backend
//! - **Facade**: [`TtlStore`], the no-raise store used by the rest of the system

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod nats;
pub mod retry;
pub mod store;

pub use backend::KeyValueBackend;
pub use config::{StoreBackendKind, StoreConfig};
pub use error::StoreError;
pub use memory::MemoryBackend;
pub use nats::{NatsKvBackend, NatsKvConfig};
pub use retry::{RetryPolicy, Retrying};
pub use store::TtlStore;
