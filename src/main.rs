use anyhow::{anyhow, Context, Result};
use emiscraper::{
    fetch,
    process::{
        aggregate, category_mix, coerce_row, fuel_mix, page, resolve, CoerceOptions, CoercedRow,
        RawTable,
    },
};
use reqwest::Client;
use std::{env, fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const SMOOTHING_WINDOW: usize = 3;
const TRAILING_DAYS: i64 = 7;
const PREVIEW_PAGE_SIZE: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,emiscraper=info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) configure run ────────────────────────────────────────────
    // optional first arg: how many of the newest monthly datasets to merge
    let dataset_count: usize = match env::args().nth(1) {
        Some(arg) => arg
            .parse::<usize>()
            .with_context(|| format!("dataset count argument `{}` is not a number", arg))?
            .max(1),
        None => 1,
    };
    let out_dir = PathBuf::from("processed");
    fs::create_dir_all(&out_dir)?;
    let client = Client::new();

    // ─── 3) discover datasets ────────────────────────────────────────
    let urls =
        fetch::urls::fetch_generation_csv_urls(&client, fetch::urls::EMI_GENERATION_PAGE).await?;
    if urls.is_empty() {
        return Err(anyhow!(
            "no Generation_MD dataset links found on {} (page layout may have changed)",
            fetch::urls::EMI_GENERATION_PAGE
        ));
    }
    info!(found = urls.len(), "discovered datasets");

    // ─── 4) download the newest N and merge ──────────────────────────
    let mut table: Option<RawTable> = None;
    for url in urls.iter().take(dataset_count) {
        let name = fetch::datasets::dataset_name(url);
        info!(name = %name, "downloading");
        let bytes = fetch::datasets::download_csv(&client, url).await?;
        let parsed = RawTable::from_csv_bytes(&name, &bytes)?;
        info!(name = %name, rows = parsed.rows.len(), "parsed");

        match &mut table {
            None => table = Some(parsed),
            Some(existing) => {
                existing.merge(parsed);
            }
        }
    }
    let table = table.ok_or_else(|| anyhow!("no dataset downloaded"))?;
    info!(source = %table.source, rows = table.rows.len(), "raw table ready");

    // ─── 5) resolve schema & coerce rows ─────────────────────────────
    let roles = resolve(&table, None)?;
    info!(?roles, "resolved column roles");

    let opts = CoerceOptions::default();
    let coerced: Vec<CoercedRow> = table
        .rows
        .iter()
        .map(|row| coerce_row(row, &roles, &opts))
        .collect();

    let no_timestamp = coerced.iter().filter(|c| c.timestamp.is_none()).count();
    let no_fuel = coerced.iter().filter(|c| c.fuel.is_none()).count();
    if no_timestamp > 0 {
        warn!(rows = no_timestamp, "rows excluded from the time series (bad timestamp)");
    }
    if no_fuel > 0 {
        warn!(rows = no_fuel, "rows with no fuel identifier, bucketed as Other");
    }

    // ─── 6) aggregate ────────────────────────────────────────────────
    let agg = aggregate(&coerced, SMOOTHING_WINDOW);
    info!(timestamps = agg.rows.len(), "aggregated");

    for (category, quantity) in category_mix(&coerced) {
        info!(%category, quantity = %format!("{:.1}", quantity), "category mix");
    }

    let mut fuels: Vec<(String, f64)> = fuel_mix(&coerced).into_iter().collect();
    fuels.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (fuel, quantity) in &fuels {
        info!(fuel = %fuel, quantity = %format!("{:.1}", quantity), "fuel mix");
    }

    if let Some(share) = agg.latest_share() {
        if share >= 70.0 {
            info!(share = %format!("{:.2}%", share), "renewables high: great window for heavy loads");
        } else if share >= 45.0 {
            info!(share = %format!("{:.2}%", share), "moderate renewable share");
        } else {
            warn!(share = %format!("{:.2}%", share), "renewables low");
        }
    }
    info!(
        days = TRAILING_DAYS,
        points = agg.trailing_days(TRAILING_DAYS).len(),
        "trailing window"
    );

    // ─── 7) preview + export ─────────────────────────────────────────
    let (preview, total_pages) = page(&agg.rows, PREVIEW_PAGE_SIZE, 1);
    info!(page = 1, total_pages, "preview");
    for row in preview {
        info!(
            timestamp = %row.timestamp,
            total = %format!("{:.1}", row.total),
            share = %format!("{:.2}%", row.renewable_share_pct),
            smoothed = %format!("{:.2}%", row.renewable_share_pct_smoothed),
            "row"
        );
    }

    let out_path = out_dir.join(&table.source);
    fs::write(&out_path, agg.to_csv_bytes()?)
        .with_context(|| format!("writing {}", out_path.display()))?;
    info!(path = %out_path.display(), "wrote processed table");

    info!("all done");
    Ok(())
}
