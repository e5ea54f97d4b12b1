use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::coerce::CoercedRow;
use super::fuel::Category;

/// Bucket for rows whose fuel identifier was missing or non-string.
pub const UNKNOWN_FUEL: &str = "UNKNOWN";

/// One timestamp of the pivoted series. Field names double as the CSV export
/// header, so renaming one renames the export column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub timestamp: NaiveDateTime,
    pub renewable: f64,
    pub non_renewable: f64,
    pub other: f64,
    pub total: f64,
    pub renewable_share_pct: f64,
    pub renewable_share_pct_smoothed: f64,
}

/// Timestamp-ascending, unique-keyed generation summary. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateTable {
    pub rows: Vec<AggregateRow>,
}

/// Pivot coerced rows into one row per distinct timestamp with per-category
/// sums, total, renewable share (0 when the total is 0) and a trailing
/// min-periods-1 rolling mean of the share over `window` points.
///
/// Rows without a timestamp are excluded here; they still count toward the
/// category and fuel mixes.
pub fn aggregate(rows: &[CoercedRow], window: usize) -> AggregateTable {
    let mut groups: BTreeMap<NaiveDateTime, [f64; 3]> = BTreeMap::new();

    for row in rows {
        let ts = match row.timestamp {
            Some(ts) => ts,
            None => continue,
        };
        let sums = groups.entry(ts).or_insert([0.0; 3]);
        match row.category {
            Category::Renewable => sums[0] += row.quantity,
            Category::NonRenewable => sums[1] += row.quantity,
            Category::Other => sums[2] += row.quantity,
        }
    }

    let mut out: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(timestamp, [renewable, non_renewable, other])| {
            let total = renewable + non_renewable + other;
            let renewable_share_pct = if total == 0.0 {
                0.0
            } else {
                renewable / total * 100.0
            };
            AggregateRow {
                timestamp,
                renewable,
                non_renewable,
                other,
                total,
                renewable_share_pct,
                renewable_share_pct_smoothed: 0.0,
            }
        })
        .collect();

    let window = window.max(1);
    for i in 0..out.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &out[start..=i];
        let mean = slice.iter().map(|r| r.renewable_share_pct).sum::<f64>() / slice.len() as f64;
        out[i].renewable_share_pct_smoothed = mean;
    }

    AggregateTable { rows: out }
}

impl AggregateTable {
    /// The most recent renewable share reading, if any data made it through.
    pub fn latest_share(&self) -> Option<f64> {
        self.rows.last().map(|r| r.renewable_share_pct)
    }

    /// Contiguous suffix with `timestamp >= max(timestamp) - days`.
    pub fn trailing_days(&self, days: i64) -> &[AggregateRow] {
        let last = match self.rows.last() {
            Some(r) => r.timestamp,
            None => return &[],
        };
        let cutoff = last - Duration::days(days);
        let start = self.rows.partition_point(|r| r.timestamp < cutoff);
        &self.rows[start..]
    }

    /// UTF-8 CSV with a header row; column names are the `AggregateRow`
    /// field names.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            wtr.serialize(row).context("serializing aggregate row")?;
        }
        wtr.into_inner().context("flushing aggregate CSV")
    }

    /// Read the export format back. Numeric columns round-trip losslessly
    /// within float tolerance.
    pub fn from_csv_bytes(data: &[u8]) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(data);
        let mut rows = Vec::new();
        for (idx, result) in rdr.deserialize::<AggregateRow>().enumerate() {
            rows.push(result.with_context(|| format!("aggregate CSV record {}", idx))?);
        }
        Ok(AggregateTable { rows })
    }
}

/// Category → summed quantity, including rows with no timestamp.
pub fn category_mix(rows: &[CoercedRow]) -> BTreeMap<Category, f64> {
    let mut mix = BTreeMap::new();
    for row in rows {
        *mix.entry(row.category).or_insert(0.0) += row.quantity;
    }
    mix
}

/// Normalized fuel identifier → summed quantity; rows without a fuel land
/// under [`UNKNOWN_FUEL`].
pub fn fuel_mix(rows: &[CoercedRow]) -> BTreeMap<String, f64> {
    let mut mix = BTreeMap::new();
    for row in rows {
        let key = row.fuel.clone().unwrap_or_else(|| UNKNOWN_FUEL.to_string());
        *mix.entry(key).or_insert(0.0) += row.quantity;
    }
    mix
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn coerced(
        timestamp: Option<NaiveDateTime>,
        fuel: Option<&str>,
        quantity: f64,
        category: Category,
    ) -> CoercedRow {
        CoercedRow {
            timestamp,
            fuel: fuel.map(|s| s.to_string()),
            quantity,
            category,
        }
    }

    #[test]
    fn pivots_by_timestamp_with_zero_filled_categories() {
        let rows = vec![
            coerced(Some(ts(1, 0)), Some("HYDRO"), 100.0, Category::Renewable),
            coerced(Some(ts(1, 0)), Some("GAS"), 50.0, Category::NonRenewable),
            coerced(Some(ts(2, 0)), Some("HYDRO"), 80.0, Category::Renewable),
        ];
        let agg = aggregate(&rows, 3);

        assert_eq!(agg.rows.len(), 2);
        assert_eq!(agg.rows[0].timestamp, ts(1, 0));
        assert_eq!(agg.rows[0].total, 150.0);
        assert_eq!(agg.rows[1].non_renewable, 0.0);
        assert_eq!(agg.rows[1].other, 0.0);
        assert_eq!(agg.rows[1].renewable_share_pct, 100.0);
    }

    #[test]
    fn timestamps_come_out_ascending_and_unique() {
        let rows = vec![
            coerced(Some(ts(3, 0)), Some("HYDRO"), 1.0, Category::Renewable),
            coerced(Some(ts(1, 0)), Some("HYDRO"), 1.0, Category::Renewable),
            coerced(Some(ts(3, 0)), Some("GAS"), 1.0, Category::NonRenewable),
            coerced(Some(ts(2, 0)), Some("HYDRO"), 1.0, Category::Renewable),
        ];
        let agg = aggregate(&rows, 3);
        let stamps: Vec<_> = agg.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![ts(1, 0), ts(2, 0), ts(3, 0)]);
    }

    #[test]
    fn zero_total_means_zero_share() {
        let rows = vec![coerced(Some(ts(1, 0)), Some("HYDRO"), 0.0, Category::Renewable)];
        let agg = aggregate(&rows, 3);
        assert_eq!(agg.rows[0].total, 0.0);
        assert_eq!(agg.rows[0].renewable_share_pct, 0.0);
        assert!(agg.rows[0].renewable_share_pct.is_finite());
    }

    #[test]
    fn share_stays_within_bounds() {
        let rows = vec![
            coerced(Some(ts(1, 0)), Some("HYDRO"), 3.0, Category::Renewable),
            coerced(Some(ts(1, 0)), Some("GAS"), 7.0, Category::NonRenewable),
            coerced(Some(ts(2, 0)), Some("HYDRO"), 5.0, Category::Renewable),
        ];
        for row in &aggregate(&rows, 3).rows {
            assert!((0.0..=100.0).contains(&row.renewable_share_pct));
        }
    }

    #[test]
    fn rolling_mean_uses_min_periods_one() {
        // shares by construction: 0, 30, 60, 90
        let rows = vec![
            coerced(Some(ts(1, 0)), Some("GAS"), 100.0, Category::NonRenewable),
            coerced(Some(ts(2, 0)), Some("HYDRO"), 30.0, Category::Renewable),
            coerced(Some(ts(2, 0)), Some("GAS"), 70.0, Category::NonRenewable),
            coerced(Some(ts(3, 0)), Some("HYDRO"), 60.0, Category::Renewable),
            coerced(Some(ts(3, 0)), Some("GAS"), 40.0, Category::NonRenewable),
            coerced(Some(ts(4, 0)), Some("HYDRO"), 90.0, Category::Renewable),
            coerced(Some(ts(4, 0)), Some("GAS"), 10.0, Category::NonRenewable),
        ];
        let agg = aggregate(&rows, 3);
        let smoothed: Vec<f64> = agg
            .rows
            .iter()
            .map(|r| r.renewable_share_pct_smoothed)
            .collect();

        let expect = [0.0, 15.0, 30.0, 60.0]; // raw[0], mean(0,30), mean(0,30,60), mean(30,60,90)
        for (got, want) in smoothed.iter().zip(expect) {
            assert!((got - want).abs() < 1e-9, "{} vs {}", got, want);
        }
    }

    #[test]
    fn null_timestamps_skip_the_series_but_not_the_mixes() {
        let rows = vec![
            coerced(Some(ts(1, 0)), Some("HYDRO"), 10.0, Category::Renewable),
            coerced(None, Some("GAS"), 5.0, Category::NonRenewable),
            coerced(None, None, 2.0, Category::Other),
        ];

        let agg = aggregate(&rows, 3);
        assert_eq!(agg.rows.len(), 1);
        assert_eq!(agg.rows[0].total, 10.0);

        let by_category = category_mix(&rows);
        assert_eq!(by_category[&Category::NonRenewable], 5.0);
        assert_eq!(by_category[&Category::Other], 2.0);

        let by_fuel = fuel_mix(&rows);
        assert_eq!(by_fuel["GAS"], 5.0);
        assert_eq!(by_fuel[UNKNOWN_FUEL], 2.0);
    }

    #[test]
    fn latest_share_and_trailing_window() {
        let rows: Vec<CoercedRow> = (1..=10)
            .map(|day| coerced(Some(ts(day, 12)), Some("HYDRO"), day as f64, Category::Renewable))
            .collect();
        let agg = aggregate(&rows, 3);

        assert_eq!(agg.latest_share(), Some(100.0));

        // last timestamp is day 10 at 12:00; cutoff is day 3 at 12:00
        let tail = agg.trailing_days(7);
        assert_eq!(tail.len(), 8);
        assert_eq!(tail[0].timestamp, ts(3, 12));

        let empty = AggregateTable::default();
        assert!(empty.latest_share().is_none());
        assert!(empty.trailing_days(7).is_empty());
    }

    #[test]
    fn export_round_trips_through_csv() -> Result<()> {
        let rows = vec![
            coerced(Some(ts(1, 0)), Some("HYDRO"), 100.0, Category::Renewable),
            coerced(Some(ts(1, 0)), Some("GAS"), 50.0, Category::NonRenewable),
            coerced(Some(ts(2, 0)), Some("WIND"), 33.3, Category::Renewable),
        ];
        let agg = aggregate(&rows, 3);

        let bytes = agg.to_csv_bytes()?;
        let header = String::from_utf8(bytes.clone())?;
        assert!(header.starts_with(
            "timestamp,renewable,non_renewable,other,total,renewable_share_pct,renewable_share_pct_smoothed"
        ));

        let back = AggregateTable::from_csv_bytes(&bytes)?;
        assert_eq!(back.rows.len(), agg.rows.len());
        for (a, b) in agg.rows.iter().zip(back.rows.iter()) {
            assert_eq!(a.timestamp, b.timestamp);
            assert!((a.renewable - b.renewable).abs() < 1e-9);
            assert!((a.renewable_share_pct - b.renewable_share_pct).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn export_round_trips_through_a_file() -> Result<()> {
        let rows = vec![
            coerced(Some(ts(1, 0)), Some("HYDRO"), 2.0, Category::Renewable),
            coerced(Some(ts(1, 0)), Some("GAS"), 1.0, Category::NonRenewable),
        ];
        let agg = aggregate(&rows, 3);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("processed.csv");
        std::fs::write(&path, agg.to_csv_bytes()?)?;
        let back = AggregateTable::from_csv_bytes(&std::fs::read(&path)?)?;

        // re-deriving shares from the reconstructed sums changes nothing
        for (a, b) in agg.rows.iter().zip(back.rows.iter()) {
            let reshare = if b.total == 0.0 {
                0.0
            } else {
                b.renewable / b.total * 100.0
            };
            assert!((a.renewable_share_pct - reshare).abs() < 1e-9);
        }
        Ok(())
    }
}
