//! Shared types and models for the Verdex seed inventory ledger
//!
//! This crate contains the domain model, batch identifier derivation and
//! input validation shared between the backend, the browser (via WASM),
//! and the bulk import tooling.

pub mod batch_id;
pub mod models;
pub mod types;
pub mod validation;

pub use batch_id::*;
pub use models::*;
pub use types::*;
pub use validation::*;
