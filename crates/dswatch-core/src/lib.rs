//! Core types and trait definitions for dswatch.
//!
//! This crate is deliberately free of network and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod check;
pub mod class;
pub mod domain;
pub mod error;
pub mod probe;
pub mod store;

pub use error::{Error, Result};
