//! Core types shared across the waybill crates.
//!
//! This crate provides the session identifier. Error types live with the
//! crate that raises them.

pub mod id;

pub use id::{ParseIdError, SessionId};
