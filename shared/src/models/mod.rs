//! Domain models for the Verdex seed inventory ledger

mod distribution;
mod harvest;
mod log;
mod report;

pub use distribution::*;
pub use harvest::*;
pub use log::*;
pub use report::*;
