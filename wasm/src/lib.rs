//! WebAssembly module for the Verdex seed inventory
//!
//! Provides client-side previews for the harvest and distribution forms:
//! - Seed batch identifier derivation
//! - Harvest input validation
//! - Distribution note and remaining balance

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Preview the seed batch id the server will derive
#[wasm_bindgen]
pub fn derive_seed_batch_id(harvest_date: &str, crop: &str, variety: &str) -> Result<String, JsValue> {
    shared::derive_batch_id_from_str(harvest_date, crop, variety)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn crop_code(crop: &str) -> String {
    shared::crop_abbreviation(crop)
}

/// Validate a harvest form; returns a JSON array of field errors (empty when valid)
#[wasm_bindgen]
pub fn validate_harvest_form(input_json: &str) -> Result<String, JsValue> {
    let input: NewHarvestBatch = serde_json::from_str(input_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid harvest JSON: {}", e)))?;

    let errors = match validate_new_harvest(&input) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    };
    serde_json::to_string(&errors).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Preview the audit note a distribution will leave on its batch
#[wasm_bindgen]
pub fn preview_distribution_note(input_json: &str) -> Result<String, JsValue> {
    let input: NewDistribution = serde_json::from_str(input_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid distribution JSON: {}", e)))?;

    let draft = validate_new_distribution(&input)
        .map_err(|errors| JsValue::from_str(&shared::describe_field_errors(&errors)))?;
    let quantity = draft.quantity.unwrap_or(Decimal::ZERO);
    Ok(distribution_note(quantity, &draft.purpose, &draft.recipient))
}

/// Balance left after drawing `quantity` kg, or `None` if it would overdraw
#[wasm_bindgen]
pub fn remaining_balance(balance: &str, quantity: &str) -> Option<String> {
    let balance: Decimal = balance.trim().parse().ok()?;
    let quantity: Decimal = quantity.trim().parse().ok()?;
    if quantity <= Decimal::ZERO || quantity > balance {
        return None;
    }
    Some((balance - quantity).normalize().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_code() {
        assert_eq!(crop_code("Soybean"), "SB");
        assert_eq!(crop_code("sorghum"), "SO");
    }

    #[test]
    fn test_validate_harvest_form_lists_errors() {
        let errors = validate_harvest_form(r#"{"crop":"Soybean"}"#).unwrap();
        let parsed: Vec<FieldError> = serde_json::from_str(&errors).unwrap();
        assert!(parsed.iter().any(|e| e.field == "inQuantity"));
        assert!(!parsed.iter().any(|e| e.field == "crop"));
    }

    #[test]
    fn test_preview_note() {
        let note = preview_distribution_note(
            r#"{"date":"2024-01-05","seedBatchId":"2023-09-SB-TIWALA_6","quantity":"12","mode":"breeding","requestedBy":"Dr. Reyes","area":"Plot B"}"#,
        )
        .unwrap();
        assert_eq!(note, "Distributed 12kg for breeding to Dr. Reyes (Area: Plot B)");
    }

    #[test]
    fn test_remaining_balance() {
        assert_eq!(remaining_balance("100", "30").as_deref(), Some("70"));
        assert_eq!(remaining_balance("10", "30"), None);
        assert_eq!(remaining_balance("10", "-1"), None);
    }
}
