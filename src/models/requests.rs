use crate::models::domain::{PropertyType, SearchCriteria};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// Request to resolve search criteria into listing counts
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResolveRequest {
    #[serde(alias = "property_type", rename = "propertyType")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub bedrooms: Option<u8>,
    #[validate(range(exclusive_min = 0.0))]
    #[serde(alias = "max_budget", rename = "maxBudget", default)]
    pub max_budget: Option<f64>,
    #[serde(default)]
    pub neighborhoods: BTreeSet<String>,
    #[serde(alias = "must_haves", rename = "mustHaves", default)]
    pub must_haves: BTreeSet<String>,
    #[validate(range(min = 0.0))]
    #[serde(alias = "discount_threshold", rename = "discountThreshold", default)]
    pub discount_threshold: Option<f64>,
    #[serde(default = "default_allow_relaxation")]
    #[serde(alias = "allow_relaxation", rename = "allowRelaxation")]
    pub allow_relaxation: bool,
    /// Also return up to this many matching listings
    #[validate(range(min = 1, max = 100))]
    #[serde(alias = "include_listings", rename = "includeListings", default)]
    pub include_listings: Option<usize>,
    /// Caller's request generation, echoed back unchanged
    #[serde(default)]
    pub generation: Option<u64>,
}

fn default_allow_relaxation() -> bool {
    true
}

impl ResolveRequest {
    pub fn to_criteria(&self) -> SearchCriteria {
        SearchCriteria {
            property_type: self.property_type,
            bedrooms: self.bedrooms,
            max_budget: self.max_budget,
            neighborhoods: self.neighborhoods.clone(),
            must_haves: self.must_haves.clone(),
            discount_threshold: self.discount_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let request: ResolveRequest = serde_json::from_value(json!({"propertyType": "buy"})).unwrap();
        assert!(request.allow_relaxation);
        assert!(request.include_listings.is_none());
        assert!(request.validate().is_ok());
        assert_eq!(request.to_criteria(), SearchCriteria::new(PropertyType::Buy));
    }

    #[test]
    fn test_validation_rules() {
        let negative_discount: ResolveRequest = serde_json::from_value(json!({
            "propertyType": "rent",
            "discountThreshold": -1
        }))
        .unwrap();
        assert!(negative_discount.validate().is_err());

        let zero_budget: ResolveRequest = serde_json::from_value(json!({
            "propertyType": "rent",
            "maxBudget": 0
        }))
        .unwrap();
        assert!(zero_budget.validate().is_err());

        let too_many_rows: ResolveRequest = serde_json::from_value(json!({
            "propertyType": "rent",
            "includeListings": 500
        }))
        .unwrap();
        assert!(too_many_rows.validate().is_err());
    }
}
