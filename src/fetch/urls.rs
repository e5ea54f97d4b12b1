use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

/// EMI's wholesale generation dataset listing. The page lists one
/// `YYYYMM_Generation_MD.csv` per month, newest first.
pub static EMI_GENERATION_PAGE: &str =
    "https://www.emi.ea.govt.nz/Wholesale/Datasets/Generation/Generation_MD";

/// Case-insensitive because EMI has published both `_Generation_MD.csv`
/// and lowercased variants over time.
static GENERATION_CSV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)_generation_md\.csv$").expect("suffix regex should parse"));

/// Fetches all Generation_MD CSV links from the dataset page, in document
/// order (newest first). An empty result means the page layout changed or the
/// datasets moved; callers treat that as fatal for the run.
pub async fn fetch_generation_csv_urls(client: &Client, page_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(page_url).with_context(|| format!("parsing page URL {}", page_url))?;

    let html = client
        .get(base.clone())
        .send()
        .await
        .with_context(|| format!("GET {}", base))?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("reading body from {}", base))?;

    Ok(extract_generation_csv_urls(&html, &base))
}

fn extract_generation_csv_urls(html: &str, base: &Url) -> Vec<String> {
    let selector = Selector::parse("a[href]").expect("selector should parse");

    Html::parse_document(html)
        .select(&selector)
        .filter_map(|elem| elem.value().attr("href"))
        .filter(|href| GENERATION_CSV.is_match(href))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
}
