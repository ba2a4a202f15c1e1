//! waybill HTTP server.
//!
//! This crate wires the library crates into a running service:
//!
//! - **Chat**: the turn pipeline over sessions and the engine
//! - **Tools**: the shipping-fee insurance tool catalog
//! - **App**: axum routes for chat, sessions, health, and settings
//! - **Config**: layered configuration for every crate

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod tools;
