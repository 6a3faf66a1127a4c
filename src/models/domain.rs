use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Neighborhood token that disables location filtering entirely
pub const ANYWHERE: &str = "anywhere";

/// Must-have tag requiring listings without a broker fee
pub const NO_BROKER_FEE: &str = "no-broker-fee";

/// Must-have tag restricting rentals to the rent-stabilized collection
pub const RENT_STABILIZED: &str = "rent-stabilized";

/// Status value every queried listing must carry
pub const ACTIVE_STATUS: &str = "active";

pub const ID_FIELD: &str = "id";
pub const ADDRESS_FIELD: &str = "address";
pub const BEDROOMS_FIELD: &str = "bedrooms";
pub const BOROUGH_FIELD: &str = "borough";
pub const NEIGHBORHOOD_FIELD: &str = "neighborhood";

/// Whether the user is looking to rent or to buy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Rent,
    Buy,
}

/// User search criteria
///
/// Treated as an immutable value for the duration of one resolution;
/// relaxation strategies always derive modified copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(rename = "propertyType")]
    pub property_type: PropertyType,
    /// Exact bedroom count, studio = 0
    #[serde(default)]
    pub bedrooms: Option<u8>,
    /// Monthly rent or sale price ceiling, depending on `property_type`
    #[serde(rename = "maxBudget", default)]
    pub max_budget: Option<f64>,
    #[serde(default)]
    pub neighborhoods: BTreeSet<String>,
    #[serde(rename = "mustHaves", default)]
    pub must_haves: BTreeSet<String>,
    /// Minimum below-market discount, in percent
    #[serde(rename = "discountThreshold", default)]
    pub discount_threshold: Option<f64>,
}

impl SearchCriteria {
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            bedrooms: None,
            max_budget: None,
            neighborhoods: BTreeSet::new(),
            must_haves: BTreeSet::new(),
            discount_threshold: None,
        }
    }

    pub fn with_bedrooms(mut self, bedrooms: u8) -> Self {
        self.bedrooms = Some(bedrooms);
        self
    }

    pub fn with_max_budget(mut self, budget: f64) -> Self {
        self.max_budget = Some(budget);
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhoods.insert(neighborhood.into());
        self
    }

    pub fn with_must_have(mut self, tag: impl Into<String>) -> Self {
        self.must_haves.insert(tag.into());
        self
    }

    pub fn with_discount_threshold(mut self, threshold: f64) -> Self {
        self.discount_threshold = Some(threshold);
        self
    }

    pub fn has_must_have(&self, tag: &str) -> bool {
        self.must_haves.contains(tag)
    }

    /// Rent searches that asked for rent-stabilized units only
    pub fn wants_rent_stabilized_only(&self) -> bool {
        self.property_type == PropertyType::Rent && self.has_must_have(RENT_STABILIZED)
    }

    /// Discount floor to filter on; negative thresholds clamp to zero
    pub fn discount_floor(&self) -> Option<f64> {
        self.discount_threshold.map(|t| t.max(0.0))
    }
}

/// Outcome of resolving search criteria against the listing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaxationResult {
    #[serde(rename = "directCount")]
    pub direct_count: u64,
    #[serde(rename = "similarCount")]
    pub similar_count: u64,
    #[serde(rename = "adjustedCriteria", default, skip_serializing_if = "Option::is_none")]
    pub adjusted_criteria: Option<SearchCriteria>,
}

impl RelaxationResult {
    pub fn direct(count: u64) -> Self {
        Self {
            direct_count: count,
            similar_count: 0,
            adjusted_criteria: None,
        }
    }

    pub fn relaxed(count: u64, criteria: SearchCriteria) -> Self {
        Self {
            direct_count: 0,
            similar_count: count,
            adjusted_criteria: Some(criteria),
        }
    }

    pub fn empty() -> Self {
        Self::direct(0)
    }

    pub fn is_empty(&self) -> bool {
        self.direct_count == 0 && self.similar_count == 0
    }
}

/// Logical listing collections exposed by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Sales,
    Rentals,
    RentStabilized,
}

/// Field names that differ between collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub price_field: &'static str,
    pub discount_field: &'static str,
    pub status_field: &'static str,
    pub no_fee_field: Option<&'static str>,
}

impl Collection {
    pub const fn schema(self) -> CollectionSchema {
        match self {
            Collection::Sales => CollectionSchema {
                price_field: "price",
                discount_field: "discount_percent",
                status_field: "status",
                no_fee_field: None,
            },
            Collection::Rentals => CollectionSchema {
                price_field: "monthly_rent",
                discount_field: "discount_percent",
                status_field: "status",
                no_fee_field: Some("no_fee"),
            },
            Collection::RentStabilized => CollectionSchema {
                price_field: "monthly_rent",
                discount_field: "undervaluation_percent",
                status_field: "display_status",
                no_fee_field: None,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Sales => "sales",
            Collection::Rentals => "rentals",
            Collection::RentStabilized => "rent_stabilized",
        }
    }

    /// Collections whose counts make up a result for the given criteria
    pub fn for_criteria(criteria: &SearchCriteria) -> &'static [Collection] {
        match criteria.property_type {
            PropertyType::Buy => &[Collection::Sales],
            PropertyType::Rent if criteria.has_must_have(RENT_STABILIZED) => {
                &[Collection::RentStabilized]
            }
            PropertyType::Rent => &[Collection::Rentals, Collection::RentStabilized],
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing row projected onto the fields shared by all collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub collection: Collection,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub borough: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<u8>,
    /// Sale price or monthly rent
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "discountPercent", default)]
    pub discount_percent: Option<f64>,
    #[serde(rename = "noFee", default)]
    pub no_fee: bool,
}

impl Listing {
    /// Build a listing from a raw store document, using the collection's schema
    /// to find the price and discount columns. Returns `None` without an id.
    pub fn from_document(collection: Collection, doc: &Value) -> Option<Self> {
        let schema = collection.schema();
        let id = match doc.get(ID_FIELD)? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        let text = |field: &str| doc.get(field).and_then(Value::as_str).map(str::to_string);
        let number = |field: &str| doc.get(field).and_then(Value::as_f64);

        Some(Self {
            id,
            collection,
            address: text(ADDRESS_FIELD),
            neighborhood: text(NEIGHBORHOOD_FIELD),
            borough: text(BOROUGH_FIELD),
            bedrooms: doc
                .get(BEDROOMS_FIELD)
                .and_then(Value::as_u64)
                .and_then(|b| u8::try_from(b).ok()),
            price: number(schema.price_field),
            discount_percent: number(schema.discount_field),
            no_fee: schema
                .no_fee_field
                .and_then(|field| doc.get(field))
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}
