//! Audit log entries embedded in harvest batches

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Distribution, Recipient};

/// Audit record of one distribution's effect on its batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// When the entry was written
    pub date: DateTime<Utc>,
    /// Signed quantity; outflows are negative
    pub quantity: Decimal,
    pub note: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(flatten)]
    pub recipient: Recipient,
    /// Copied from the distribution
    #[serde(default)]
    pub remarks: String,
    pub distribution_id: Uuid,
}

impl LogEntry {
    /// Entry recording `distribution` as an outflow
    pub fn for_distribution(distribution: &Distribution, date: DateTime<Utc>) -> Self {
        Self {
            date,
            quantity: -distribution.quantity,
            note: distribution_note(distribution.quantity, &distribution.purpose, &distribution.recipient),
            purpose: distribution.purpose.clone(),
            recipient: distribution.recipient.clone(),
            remarks: distribution.remarks.clone(),
            distribution_id: distribution.id,
        }
    }

    /// Magnitude of the outflow recorded by this entry
    pub fn outflow(&self) -> Decimal {
        if self.quantity < Decimal::ZERO {
            -self.quantity
        } else {
            Decimal::ZERO
        }
    }
}

/// Human-readable summary of a distribution event
pub fn distribution_note(quantity: Decimal, purpose: &str, recipient: &Recipient) -> String {
    let quantity = quantity.normalize();
    match recipient {
        Recipient::Breeding { requested_by, area } => format!(
            "Distributed {}kg for breeding to {} (Area: {})",
            quantity, requested_by, area
        ),
        Recipient::Exportation {
            recipient_name,
            affiliation,
            ..
        } => {
            let mut note = format!("Distributed {}kg to {} ({})", quantity, recipient_name, affiliation);
            if !purpose.trim().is_empty() {
                note.push_str(" for ");
                note.push_str(purpose.trim());
            }
            note
        }
    }
}
