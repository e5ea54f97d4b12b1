use serde::{Deserialize, Serialize};
use std::fmt;

/// Substring tokens: renewable fuel codes vary in suffixes and formatting
/// ("Wind1", "Hydro-North"), so containment is the right test.
const RENEWABLE_TOKENS: &[&str] = &["hydro", "wind", "solar", "geothermal", "biomass", "battery"];

/// Exact tokens: the non-renewable vocabulary is small and closed, and a
/// substring test would let "gas" swallow unrelated longer codes.
const NON_RENEWABLE_TOKENS: &[&str] = &["gas", "coal", "diesel", "co-generation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Renewable,
    NonRenewable,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Renewable => "Renewable",
            Category::NonRenewable => "Non-Renewable",
            Category::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Map a free-text fuel identifier to its category. Renewable tokens are
/// checked first; a missing or empty identifier is always `Other`.
pub fn classify(fuel: Option<&str>) -> Category {
    let name = match fuel {
        Some(f) => f.trim().to_lowercase(),
        None => return Category::Other,
    };
    if name.is_empty() {
        return Category::Other;
    }

    if RENEWABLE_TOKENS.iter().any(|t| name.contains(t)) {
        return Category::Renewable;
    }
    if NON_RENEWABLE_TOKENS.iter().any(|t| name == *t) {
        return Category::NonRenewable;
    }
    Category::Other
}
