use anyhow::{Context, Result};
use reqwest::Client;
use url::Url;

/// Download the given dataset URL into memory. The pipeline consumes the
/// bytes directly; nothing is written to disk. Any network failure or non-2xx
/// status is fatal for the run (no retry).
pub async fn download_csv(client: &Client, url_str: &str) -> Result<Vec<u8>> {
    let url = Url::parse(url_str).with_context(|| format!("parsing dataset URL {}", url_str))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?;

    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;

    Ok(bytes.to_vec())
}

/// The dataset's own name, for provenance and output file naming.
pub fn dataset_name(url_str: &str) -> String {
    Url::parse(url_str)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(|s| s.to_string()))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "dataset.csv".to_string())
}
