//! HTTP handlers for the Verdex API

pub mod distribution;
pub mod harvest;
pub mod health;
pub mod import;
pub mod reporting;

pub use distribution::*;
pub use harvest::*;
pub use health::*;
pub use import::*;
pub use reporting::*;
