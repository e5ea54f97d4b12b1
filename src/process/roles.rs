use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use super::RawTable;

/// How many rows to sample when deciding whether a column is numeric.
const SAMPLE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Timestamp,
    Period,
    Fuel,
    Generation,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Timestamp => "timestamp",
            Role::Period => "period",
            Role::Fuel => "fuel",
            Role::Generation => "generation",
        }
    }
}

/// Substring rules, one entry per role. For each role the columns are scanned
/// in declaration order and the leftmost column containing any pattern wins,
/// so ties break on column position, not pattern position.
const SUBSTRING_RULES: &[(Role, &[&str])] = &[
    (Role::Timestamp, &["date", "time", "trading"]),
    (Role::Period, &["period"]),
    (Role::Fuel, &["fuel"]),
];

/// Known generation column names, tried as exact (trimmed) matches in this
/// priority order before any substring guessing.
const GENERATION_COLUMNS: &[&str] = &[
    "Generation_MWh",
    "Generation_kWh",
    "Generation",
    "GENERATION",
    "Generation_MW",
    "GEN_MW",
];

const GENERATION_SUBSTRINGS: &[&str] = &["generation", "mw"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub name: String,
    pub index: usize,
}

/// Logical role → resolved column. `period` is optional; the other three are
/// required by `resolve` and their absence is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleMap {
    pub timestamp: Option<ResolvedColumn>,
    pub period: Option<ResolvedColumn>,
    pub fuel: Option<ResolvedColumn>,
    pub generation: Option<ResolvedColumn>,
}

/// Infer which columns carry the timestamp, trading period, fuel identifier
/// and generation quantity. Deterministic: the same header set (and sample
/// values, for the numeric fallback) always yields the same map.
///
/// `quantity_override` names the generation column explicitly and wins over
/// every heuristic; it must exist in the table.
pub fn resolve(table: &RawTable, quantity_override: Option<&str>) -> Result<RoleMap> {
    if table.headers.is_empty() {
        return Err(anyhow!("{}: table has no columns", table.source));
    }

    let mut map = RoleMap::default();

    for &(role, patterns) in SUBSTRING_RULES {
        let resolved = match_substring(&table.headers, patterns);
        if let Some(col) = &resolved {
            debug!(role = role.name(), column = %col.name, "resolved by substring");
        }
        match role {
            Role::Timestamp => map.timestamp = resolved,
            Role::Period => map.period = resolved,
            Role::Fuel => map.fuel = resolved,
            Role::Generation => unreachable!("generation is resolved separately"),
        }
    }

    map.generation = resolve_generation(table, &map, quantity_override)?;

    let missing: Vec<&str> = [
        (Role::Timestamp, map.timestamp.is_none()),
        (Role::Fuel, map.fuel.is_none()),
        (Role::Generation, map.generation.is_none()),
    ]
    .iter()
    .filter(|(_, absent)| *absent)
    .map(|(role, _)| role.name())
    .collect();

    if !missing.is_empty() {
        return Err(anyhow!(
            "{}: schema resolution failed, unresolved role(s): {}",
            table.source,
            missing.join(", ")
        ));
    }

    Ok(map)
}

fn match_substring(headers: &[String], patterns: &[&str]) -> Option<ResolvedColumn> {
    headers.iter().enumerate().find_map(|(index, raw)| {
        let lowered = raw.trim().to_lowercase();
        patterns
            .iter()
            .any(|p| lowered.contains(p))
            .then(|| ResolvedColumn {
                name: raw.trim().to_string(),
                index,
            })
    })
}

fn resolve_generation(
    table: &RawTable,
    others: &RoleMap,
    quantity_override: Option<&str>,
) -> Result<Option<ResolvedColumn>> {
    if let Some(name) = quantity_override {
        let index = table
            .headers
            .iter()
            .position(|h| h.trim() == name.trim())
            .ok_or_else(|| {
                anyhow!(
                    "{}: quantity override column `{}` not present",
                    table.source,
                    name
                )
            })?;
        return Ok(Some(ResolvedColumn {
            name: table.headers[index].trim().to_string(),
            index,
        }));
    }

    // 1) exact known names, in priority order of the allow-list
    for &candidate in GENERATION_COLUMNS {
        if let Some(index) = table.headers.iter().position(|h| h.trim() == candidate) {
            debug!(column = candidate, "resolved generation by exact name");
            return Ok(Some(ResolvedColumn {
                name: candidate.to_string(),
                index,
            }));
        }
    }

    // 2) substring guess, leftmost column wins
    if let Some(col) = match_substring(&table.headers, GENERATION_SUBSTRINGS) {
        debug!(column = %col.name, "resolved generation by substring");
        return Ok(Some(col));
    }

    // 3) numeric fallback, but only when unambiguous. Columns already claimed
    // by another role are not generation candidates (a trading-period index is
    // numeric too).
    let claimed: Vec<usize> = [&others.timestamp, &others.period, &others.fuel]
        .iter()
        .filter_map(|c| c.as_ref().map(|c| c.index))
        .collect();

    let numeric: Vec<ResolvedColumn> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(index, _)| !claimed.contains(index))
        .filter(|(index, _)| is_numeric_column(table, *index))
        .map(|(index, raw)| ResolvedColumn {
            name: raw.trim().to_string(),
            index,
        })
        .collect();

    match numeric.as_slice() {
        [] => Ok(None),
        [only] => {
            warn!(
                column = %only.name,
                "no named generation column; falling back to the only numeric column"
            );
            Ok(Some(only.clone()))
        }
        many => Err(anyhow!(
            "{}: ambiguous generation column, multiple numeric candidates: {}",
            table.source,
            many.iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

/// A column counts as numeric when it has at least one non-empty sample and
/// every sampled non-empty cell parses as a float.
fn is_numeric_column(table: &RawTable, index: usize) -> bool {
    let mut saw_value = false;
    for row in table.rows.iter().take(SAMPLE_LIMIT) {
        let cell = row
            .get(index)
            .map(|s| s.trim().trim_matches('"'))
            .unwrap_or("");
        if cell.is_empty() {
            continue;
        }
        if cell.parse::<f64>().is_err() {
            return false;
        }
        saw_value = true;
    }
    saw_value
}
