use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use super::fuel::{classify, Category};
use super::roles::RoleMap;

// Parse chain: strict ISO-8601 first, then day-first locale forms, then the
// formats seen in published market files.
const ISO_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d"];
const DAY_FIRST_DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];
const DAY_FIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y"];
const FREE_FORM_DATETIME_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S"];
const FREE_FORM_DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%d %b %Y", "%Y%m%d"];

#[derive(Debug, Clone)]
pub struct CoerceOptions {
    /// Trading periods per hour; NZ publishes half-hour periods.
    pub periods_per_hour: u32,
    /// When a period column resolved, derive the timestamp from
    /// date + period and let it supersede a directly parsed one.
    pub derive_from_period: bool,
}

impl Default for CoerceOptions {
    fn default() -> Self {
        CoerceOptions {
            periods_per_hour: 2,
            derive_from_period: true,
        }
    }
}

/// One canonical row. `quantity` is always a number (malformed cells become
/// `0.0`) so downstream sums never hit a null; a `None` timestamp only drops
/// the row from the time series, not from the fuel mixes.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedRow {
    pub timestamp: Option<NaiveDateTime>,
    pub fuel: Option<String>,
    pub quantity: f64,
    pub category: Category,
}

pub fn coerce_row(row: &[String], roles: &RoleMap, opts: &CoerceOptions) -> CoercedRow {
    let cell = |index: usize| row.get(index).map(|s| s.trim().trim_matches('"')).unwrap_or("");

    let mut timestamp = roles
        .timestamp
        .as_ref()
        .and_then(|col| parse_timestamp(cell(col.index)));

    if opts.derive_from_period {
        if let (Some(parsed), Some(col)) = (timestamp, &roles.period) {
            if let Some(derived) = derive_from_period(parsed, cell(col.index), opts.periods_per_hour)
            {
                timestamp = Some(derived);
            }
        }
    }

    let quantity = roles
        .generation
        .as_ref()
        .map(|col| {
            let raw = cell(col.index);
            raw.parse::<f64>().unwrap_or_else(|_| {
                if !raw.is_empty() {
                    debug!(value = raw, "unparseable quantity, coercing to 0.0");
                }
                0.0
            })
        })
        .unwrap_or(0.0);

    let fuel = roles.fuel.as_ref().and_then(|col| {
        let name = cell(col.index);
        (!name.is_empty()).then(|| name.to_uppercase())
    });

    let category = classify(fuel.as_deref());

    CoercedRow {
        timestamp,
        fuel,
        quantity,
        category,
    }
}

/// Parse a raw cell into a timestamp. Bare dates land on midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let v = value.trim().trim_matches('"');
    if v.is_empty() {
        return None;
    }

    for group in [
        ISO_DATETIME_FORMATS,
        DAY_FIRST_DATETIME_FORMATS,
        FREE_FORM_DATETIME_FORMATS,
    ] {
        for fmt in group {
            if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
                return Some(dt);
            }
        }
    }

    for group in [ISO_DATE_FORMATS, DAY_FIRST_DATE_FORMATS, FREE_FORM_DATE_FORMATS] {
        for fmt in group {
            if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
                return d.and_hms_opt(0, 0, 0);
            }
        }
    }

    debug!(value = v, "unparseable timestamp");
    None
}

/// Period 1 starts the day: `hour = (period - 1) / periods_per_hour`. Periods
/// outside the day (or a malformed cell) leave the parsed timestamp alone.
fn derive_from_period(
    parsed: NaiveDateTime,
    period_cell: &str,
    periods_per_hour: u32,
) -> Option<NaiveDateTime> {
    let period: u32 = period_cell.parse().ok()?;
    if period < 1 || periods_per_hour == 0 {
        return None;
    }
    let hour = (period - 1) / periods_per_hour;
    if hour >= 24 {
        return None;
    }
    parsed.date().and_hms_opt(hour, 0, 0)
}
