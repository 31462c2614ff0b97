//! Fixtures shared by the backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{NewDistribution, NewHarvestBatch};
use verdex_backend::services::ledger::check_ledger;
use verdex_backend::services::{DistributionService, HarvestService};
use verdex_backend::store::{
    BatchFilter, DistributionFilter, InMemoryLedgerStore, LedgerStore, TransactionConfig,
};

pub struct Ledger {
    pub store: Arc<dyn LedgerStore>,
    pub harvests: HarvestService,
    pub distributions: DistributionService,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(TransactionConfig::default())
    }

    pub fn with_config(config: TransactionConfig) -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        Self {
            harvests: HarvestService::new(Arc::clone(&store), config.clone()),
            distributions: DistributionService::new(Arc::clone(&store), config),
            store,
        }
    }

    /// Assert the cross-record invariants and store-wide conservation
    pub async fn assert_consistent(&self) {
        let batches = self.store.list_batches(&BatchFilter::default()).await.unwrap();
        let distributions = self
            .store
            .list_distributions(&DistributionFilter::default())
            .await
            .unwrap();

        let violations = check_ledger(&batches, &distributions);
        assert!(violations.is_empty(), "ledger violations: {:?}", violations);

        let out: Decimal = batches.iter().map(|b| b.out_quantity).sum();
        let distributed: Decimal = distributions.iter().map(|d| d.quantity).sum();
        assert_eq!(out, distributed, "conservation of outflow");
    }
}

pub fn harvest_input(variety: &str, in_quantity: i64) -> NewHarvestBatch {
    NewHarvestBatch {
        crop: Some("Soybean".into()),
        variety: Some(variety.into()),
        classification: Some("Foundation".into()),
        date_planted: Some("2023-06-01".into()),
        date_harvested: Some("2023-09-20".into()),
        area: Some("Plot A".into()),
        total_lot_area: Some(Decimal::from(2)),
        germination: Some(Decimal::from(90)),
        in_quantity: Some(Decimal::from(in_quantity)),
        ..NewHarvestBatch::default()
    }
}

pub fn exportation(seed_batch_id: &str, quantity: Decimal) -> NewDistribution {
    NewDistribution {
        date: Some("2024-01-05".into()),
        seed_batch_id: Some(seed_batch_id.into()),
        quantity: Some(quantity),
        purpose: Some("Field trial".into()),
        mode: Some("exportation".into()),
        recipient_name: Some("Juan dela Cruz".into()),
        affiliation: Some("PhilRice".into()),
        contact_number: Some("0917 000 0000".into()),
        ..NewDistribution::default()
    }
}

pub fn breeding(seed_batch_id: &str, quantity: Decimal) -> NewDistribution {
    NewDistribution {
        date: Some("2024-02-10".into()),
        seed_batch_id: Some(seed_batch_id.into()),
        quantity: Some(quantity),
        mode: Some("breeding".into()),
        requested_by: Some("Dr. Reyes".into()),
        area: Some("Plot B".into()),
        ..NewDistribution::default()
    }
}

pub fn kg(value: i64) -> Decimal {
    Decimal::from(value)
}
