use crate::models::ANYWHERE;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

/// Borough tokens and the canonical value stored in the `borough` column
const BOROUGHS: &[(&str, &str)] = &[
    ("manhattan", "Manhattan"),
    ("brooklyn", "Brooklyn"),
    ("queens", "Queens"),
    ("bronx", "Bronx"),
    ("the-bronx", "Bronx"),
    ("staten-island", "Staten Island"),
];

/// Built-in neighborhood adjacency, keyed by normalized neighborhood id
const BUILTIN_SIMILAR: &[(&str, &[&str])] = &[
    // Brooklyn
    ("carroll-gardens", &["cobble-hill", "boerum-hill", "red-hook", "gowanus"]),
    ("cobble-hill", &["carroll-gardens", "boerum-hill", "brooklyn-heights"]),
    ("boerum-hill", &["cobble-hill", "carroll-gardens", "downtown-brooklyn", "gowanus"]),
    ("brooklyn-heights", &["dumbo", "cobble-hill", "downtown-brooklyn"]),
    ("dumbo", &["brooklyn-heights", "vinegar-hill", "downtown-brooklyn"]),
    ("downtown-brooklyn", &["brooklyn-heights", "boerum-hill", "fort-greene"]),
    ("gowanus", &["park-slope", "carroll-gardens", "boerum-hill"]),
    ("red-hook", &["carroll-gardens", "columbia-street-waterfront"]),
    ("park-slope", &["prospect-heights", "windsor-terrace", "gowanus"]),
    ("prospect-heights", &["park-slope", "crown-heights", "fort-greene"]),
    ("fort-greene", &["clinton-hill", "prospect-heights", "boerum-hill"]),
    ("clinton-hill", &["fort-greene", "bedford-stuyvesant"]),
    ("williamsburg", &["greenpoint", "east-williamsburg", "bushwick"]),
    ("greenpoint", &["williamsburg", "long-island-city"]),
    ("bushwick", &["east-williamsburg", "ridgewood", "bedford-stuyvesant"]),
    ("bedford-stuyvesant", &["clinton-hill", "crown-heights", "bushwick"]),
    ("crown-heights", &["prospect-heights", "bedford-stuyvesant", "prospect-lefferts-gardens"]),
    ("prospect-lefferts-gardens", &["crown-heights", "flatbush"]),
    // Manhattan
    ("east-village", &["lower-east-side", "greenwich-village", "noho"]),
    ("west-village", &["greenwich-village", "chelsea"]),
    ("greenwich-village", &["west-village", "east-village", "soho"]),
    ("lower-east-side", &["east-village", "chinatown"]),
    ("chelsea", &["west-village", "flatiron", "hells-kitchen"]),
    ("hells-kitchen", &["chelsea", "midtown-west", "upper-west-side"]),
    ("upper-west-side", &["morningside-heights", "hells-kitchen"]),
    ("upper-east-side", &["yorkville", "lenox-hill"]),
    ("harlem", &["east-harlem", "morningside-heights", "hamilton-heights"]),
    ("washington-heights", &["inwood", "hamilton-heights"]),
    // Queens
    ("astoria", &["long-island-city", "sunnyside", "ditmars-steinway"]),
    ("long-island-city", &["astoria", "sunnyside", "greenpoint"]),
    ("sunnyside", &["woodside", "long-island-city"]),
    ("ridgewood", &["bushwick", "glendale"]),
    ("jackson-heights", &["elmhurst", "woodside"]),
    // Bronx
    ("mott-haven", &["port-morris", "melrose"]),
    ("riverdale", &["kingsbridge", "spuyten-duyvil"]),
];

/// Normalize a user-facing token into a table key: trimmed, lowercase, hyphenated
pub fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

/// Whether a token is the "anywhere" sentinel
pub fn is_anywhere(token: &str) -> bool {
    normalize_token(token) == ANYWHERE
}

/// Canonical borough name for a borough-level token (`"brooklyn"`, `"all-brooklyn"`, ...)
pub fn borough_for_token(token: &str) -> Option<&'static str> {
    let normalized = normalize_token(token);
    let key = normalized.strip_prefix("all-").unwrap_or(&normalized);
    BOROUGHS
        .iter()
        .find(|(token, _)| *token == key)
        .map(|(_, canonical)| *canonical)
}

#[derive(Debug, Error)]
pub enum NeighborhoodTableError {
    #[error("Failed to read similarity table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse similarity table: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct TableFile {
    similar: HashMap<String, Vec<String>>,
}

/// Static, read-only lookup from a neighborhood id to similar neighborhood ids
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodSimilarityTable {
    entries: HashMap<String, Vec<String>>,
}

impl NeighborhoodSimilarityTable {
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_SIMILAR.iter().map(|(id, similar)| {
            (id.to_string(), similar.iter().map(|s| s.to_string()).collect())
        }))
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let entries = entries
            .into_iter()
            .map(|(id, similar)| {
                let similar = similar.iter().map(|s| normalize_token(s)).collect();
                (normalize_token(&id), similar)
            })
            .collect();
        Self { entries }
    }

    /// Parse a table of the form:
    ///
    /// ```toml
    /// [similar]
    /// carroll-gardens = ["cobble-hill", "boerum-hill"]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, NeighborhoodTableError> {
        let file: TableFile = toml::from_str(s)?;
        Ok(Self::from_entries(file.similar))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NeighborhoodTableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Similar neighborhoods for an id; empty for unknown ids
    pub fn similar(&self, id: &str) -> &[String] {
        self.entries
            .get(&normalize_token(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Similar neighborhoods for every expandable entry of `neighborhoods`.
    /// Borough tokens and the "anywhere" sentinel are not expanded.
    pub fn expand(&self, neighborhoods: &BTreeSet<String>) -> BTreeSet<String> {
        neighborhoods
            .iter()
            .filter(|n| !is_anywhere(n) && borough_for_token(n).is_none())
            .flat_map(|n| self.similar(n).iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
