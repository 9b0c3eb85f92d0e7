//! Shared primitives for the Verdant phylogenetic MCMC engine.
//!
//! `verdant-core` provides the foundation the other Verdant crates build on:
//!
//! - **Error types** — [`VerdantError`] and [`Result`] for structured error handling

pub mod error;

pub use error::{VerdantError, Result};
