//! Quote Provider Framework
//!
//! One module per upstream source, each decoding that provider's wire format
//! into canonical per-instrument records:
//! - Eastmoney (JSON snapshot table)
//! - Sina HQ (GBK delimited strings, venue-prefixed keys)
//! - THS (JSON dictionary wrapped in a script assignment)
//!
//! Decoding is best-effort: a malformed record drops that instrument from the
//! batch, never the whole batch. Only transport failures or a payload with no
//! recognizable structure count as fetch-level errors, and the dispatch layer
//! degrades those to an empty result so the report shows data-missing markers.

pub mod eastmoney;
pub mod sina;
pub mod ths;

use crate::config::InstrumentSpec;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Normalized per-instrument metric record
///
/// Metric fields use `0.0` as the "not reported by this provider" sentinel.
/// A record exists only for instruments the adapter could parse; absence from
/// the map means the instrument was missing upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalQuote {
    pub code: String,
    pub price: f64,
    pub pe_ttm: f64,
    pub pb: f64,
    pub dv_ratio: f64,
    /// Sector leader metadata; only the THS dictionary feed carries this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<SectorLeader>,
}

/// Leader stock of the instrument's sector (name and day change percent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorLeader {
    pub name: String,
    pub change_pct: f64,
}

/// Mapping from instrument code to its canonical quote
pub type QuoteMap = HashMap<String, CanonicalQuote>;

/// Batch-level fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),
    #[error("no JSON object found in payload")]
    NoJsonObject,
    #[error("unexpected payload structure: {0}")]
    Payload(String),
}

/// Provider selection for the fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    Eastmoney,
    Sina,
    Ths,
}

impl ProviderType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "EASTMONEY" | "EM" => Some(Self::Eastmoney),
            "SINA" => Some(Self::Sina),
            "THS" | "10JQKA" => Some(Self::Ths),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eastmoney => "EASTMONEY",
            Self::Sina => "SINA",
            Self::Ths => "THS",
        }
    }
}

/// Max instruments per upstream request (URL length limits)
const CHUNK_SIZE: usize = 30;

/// Split the watch-list into request-sized batches
fn batches(targets: &[InstrumentSpec]) -> impl Iterator<Item = &[InstrumentSpec]> {
    targets.chunks(CHUNK_SIZE)
}

/// Fetch quotes for the whole watch-list through one provider
///
/// Batches are requested sequentially in fixed-size chunks. A failed chunk is
/// logged and skipped; the instruments of that chunk simply stay absent from
/// the result.
pub async fn fetch_quotes(provider: ProviderType, targets: &[InstrumentSpec]) -> QuoteMap {
    let mut quotes = QuoteMap::new();

    for chunk in batches(targets) {
        let result = match provider {
            ProviderType::Eastmoney => eastmoney::fetch(chunk).await,
            ProviderType::Sina => sina::fetch(chunk).await,
            ProviderType::Ths => ths::fetch(chunk).await,
        };
        match result {
            Ok(batch) => {
                log::debug!(
                    "{}: {} of {} instruments in batch",
                    provider.as_str(),
                    batch.len(),
                    chunk.len()
                );
                quotes.extend(batch);
            }
            Err(e) => {
                log::error!(
                    "{}: batch of {} instruments failed: {}",
                    provider.as_str(),
                    chunk.len(),
                    e
                );
            }
        }
    }

    quotes
}

/// HTTP client with a browser User-Agent
pub(crate) fn create_client() -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"),
    );

    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// Parse one metric field; `"-"`, empty or unparsable input is the `0.0` sentinel
pub(crate) fn parse_metric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return 0.0;
    }
    trimmed.parse().unwrap_or(0.0)
}
