use crate::core::neighborhoods::{borough_for_token, is_anywhere};
use crate::models::{
    Collection, SearchCriteria, ACTIVE_STATUS, BEDROOMS_FIELD, BOROUGH_FIELD,
    NEIGHBORHOOD_FIELD, NO_BROKER_FEE,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Scalar compared against a listing field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl FieldValue {
    /// Equality against a JSON document value; numbers compare numerically
    fn equals(&self, value: &Value) -> bool {
        match self {
            FieldValue::Bool(b) => value.as_bool() == Some(*b),
            FieldValue::Int(i) => value.as_f64() == Some(*i as f64),
            FieldValue::Number(n) => value.as_f64() == Some(*n),
            FieldValue::Text(s) => value.as_str() == Some(s.as_str()),
        }
    }
}

/// A single filter understood by every listing store
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { field: &'static str, value: FieldValue },
    Lte { field: &'static str, value: f64 },
    Gte { field: &'static str, value: f64 },
    In { field: &'static str, values: Vec<FieldValue> },
    /// Case-insensitive substring match
    Contains { field: &'static str, needle: String },
    /// Logical OR over the inner predicates
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &'static str, value: impl Into<FieldValue>) -> Self {
        Predicate::Eq {
            field,
            value: value.into(),
        }
    }

    /// Evaluate against a JSON document. Missing or null fields never match.
    pub fn matches(&self, doc: &Value) -> bool {
        let field_value = |field: &str| doc.get(field).filter(|v| !v.is_null());

        match self {
            Predicate::Eq { field, value } => field_value(field).is_some_and(|v| value.equals(v)),
            Predicate::Lte { field, value } => field_value(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v <= *value),
            Predicate::Gte { field, value } => field_value(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *value),
            Predicate::In { field, values } => {
                field_value(field).is_some_and(|v| values.iter().any(|candidate| candidate.equals(v)))
            }
            Predicate::Contains { field, needle } => field_value(field)
                .and_then(Value::as_str)
                .is_some_and(|v| v.to_lowercase().contains(&needle.to_lowercase())),
            Predicate::AnyOf(predicates) => predicates.iter().any(|p| p.matches(doc)),
        }
    }
}

/// Backslash-escape the characters the canonical rendering uses as syntax
fn escape_rendered(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | ',' | '(' | ')' | '&' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Canonical, stable rendering used for logs and cache keys.
/// Distinct predicate lists never render the same.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Eq { field, value } => {
                write!(f, "{}=eq.{}", field, escape_rendered(&value.to_string()))
            }
            Predicate::Lte { field, value } => write!(f, "{}=lte.{}", field, value),
            Predicate::Gte { field, value } => write!(f, "{}=gte.{}", field, value),
            Predicate::In { field, values } => {
                let values = values
                    .iter()
                    .map(|v| escape_rendered(&v.to_string()))
                    .collect::<Vec<_>>();
                write!(f, "{}=in.({})", field, values.join(","))
            }
            Predicate::Contains { field, needle } => {
                write!(f, "{}=ilike.*{}*", field, escape_rendered(needle))
            }
            Predicate::AnyOf(predicates) => {
                let inner = predicates.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "or({})", inner.join(","))
            }
        }
    }
}

/// Spellings tried for a neighborhood token: as given, space-to-hyphen,
/// hyphen-to-space, each also with apostrophes stripped. Lowercased, deduplicated.
pub fn spelling_variants(token: &str) -> Vec<String> {
    let base = token.trim().to_lowercase();
    let forms = [base.clone(), base.replace(' ', "-"), base.replace('-', " ")];

    let mut variants: Vec<String> = Vec::with_capacity(forms.len() * 2);
    for form in forms {
        let stripped: String = form.chars().filter(|c| *c != '\'' && *c != '’').collect();
        for variant in [form, stripped] {
            if !variant.is_empty() && !variants.contains(&variant) {
                variants.push(variant);
            }
        }
    }
    variants
}

/// Location filter for a neighborhood selection.
///
/// `None` when nothing is selected or the "anywhere" sentinel is present.
/// Borough tokens become exact matches on the borough field, everything else
/// fuzzy matches on the neighborhood field; all alternatives are OR-ed.
pub fn location_predicate(neighborhoods: &BTreeSet<String>) -> Option<Predicate> {
    if neighborhoods.iter().any(|n| is_anywhere(n)) {
        return None;
    }

    let mut boroughs = BTreeSet::new();
    let mut alternatives = Vec::new();

    for token in neighborhoods {
        match borough_for_token(token) {
            Some(borough) => {
                boroughs.insert(borough);
            }
            None => {
                for needle in spelling_variants(token) {
                    let predicate = Predicate::Contains {
                        field: NEIGHBORHOOD_FIELD,
                        needle,
                    };
                    if !alternatives.contains(&predicate) {
                        alternatives.push(predicate);
                    }
                }
            }
        }
    }

    let mut group: Vec<Predicate> = boroughs
        .into_iter()
        .map(|b| Predicate::eq(BOROUGH_FIELD, b))
        .collect();
    group.extend(alternatives);

    if group.is_empty() {
        None
    } else {
        Some(Predicate::AnyOf(group))
    }
}

/// Translate criteria into the predicate list for one collection
pub fn build_predicates(criteria: &SearchCriteria, collection: Collection) -> Vec<Predicate> {
    let schema = collection.schema();
    let mut predicates = vec![Predicate::eq(schema.status_field, ACTIVE_STATUS)];

    if let Some(budget) = criteria.max_budget {
        predicates.push(Predicate::Lte {
            field: schema.price_field,
            value: budget,
        });
    }

    if let Some(bedrooms) = criteria.bedrooms {
        predicates.push(Predicate::eq(BEDROOMS_FIELD, bedrooms));
    }

    if let Some(location) = location_predicate(&criteria.neighborhoods) {
        predicates.push(location);
    }

    if let Some(floor) = criteria.discount_floor() {
        predicates.push(Predicate::Gte {
            field: schema.discount_field,
            value: floor,
        });
    }

    if criteria.has_must_have(NO_BROKER_FEE) {
        if let Some(field) = schema.no_fee_field {
            predicates.push(Predicate::eq(field, true));
        }
    }

    predicates
}
