//! Business logic services for the Verdex seed inventory ledger

pub mod distribution;
pub mod harvest;
pub mod import;
pub mod ledger;
pub mod reporting;

pub use distribution::{DistributionDeletion, DistributionService};
pub use harvest::{BatchDeletion, HarvestService};
pub use import::{ImportService, ImportSummary, SkippedRow};
pub use ledger::LedgerViolation;
pub use reporting::{RecentActivity, ReportingService};
