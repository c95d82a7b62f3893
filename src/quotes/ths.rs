//! THS Quote Provider (JSON dictionary)
//!
//! The valuation endpoint wraps a JSON object in a script assignment:
//!
//! ```text
//! var radar_data={"600519":"贵州茅台,1500.00,22.5,8.1,3.6,山西汾酒,1.2",...};
//! ```
//!
//! The object is located with a balanced-brace scan (the blob around it is
//! not trusted to be well formed). Each dictionary value is a comma-delimited
//! string at fixed positions: name, price, PE-TTM, PB, dividend yield, and an
//! optional sector leader name/percent pair that lands in
//! `CanonicalQuote::leader`.

use super::{create_client, parse_metric, CanonicalQuote, FetchError, QuoteMap, SectorLeader};
use crate::config::InstrumentSpec;
use serde_json::Value;
use std::collections::HashSet;

const BASE_URL: &str = "https://qd.10jqka.com.cn/quote.php";

/// Minimum fields for a usable record (name through dividend yield)
const MIN_FIELDS: usize = 5;

/// Fetch quotes for one batch of instruments
pub async fn fetch(targets: &[InstrumentSpec]) -> Result<QuoteMap, FetchError> {
    let requested: HashSet<&str> = targets.iter().map(|t| t.code.as_str()).collect();
    let codes = targets
        .iter()
        .map(|t| t.code.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let client = create_client()?;
    let response = client
        .get(BASE_URL)
        .query(&[("cate", "valuation"), ("codes", codes.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        log::error!("THS API error: {}", status);
        return Err(FetchError::Http(status));
    }

    // Some mirrors still answer in GBK; decode leniently
    let text = response.text_with_charset("gbk").await?;
    parse_dictionary(&text, &requested)
}

/// Extract the outermost balanced `{...}` span from a script blob
///
/// Brace counting is string-aware so braces inside JSON strings do not
/// unbalance the scan. No span means the payload is unusable.
fn extract_json_object(text: &str) -> Result<&str, FetchError> {
    let start = text.find('{').ok_or(FetchError::NoJsonObject)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    Err(FetchError::NoJsonObject)
}

/// Decode the dictionary, keeping only requested codes
fn parse_dictionary(text: &str, requested: &HashSet<&str>) -> Result<QuoteMap, FetchError> {
    let span = extract_json_object(text)?;
    let data: Value = serde_json::from_str(span)
        .map_err(|e| FetchError::Payload(format!("invalid JSON object: {}", e)))?;
    let entries = data
        .as_object()
        .ok_or_else(|| FetchError::Payload("top-level value is not an object".to_string()))?;

    let mut quotes = QuoteMap::new();

    for (code, value) in entries {
        if !requested.contains(code.as_str()) {
            continue;
        }
        // Values must be delimited strings; anything else is a bad record
        let Some(raw) = value.as_str() else { continue };
        let fields: Vec<&str> = raw.split(',').collect();
        if fields.len() < MIN_FIELDS {
            log::warn!("THS record for {} too short ({} fields)", code, fields.len());
            continue;
        }

        // Positions 5/6 carry the sector leader name and day change percent
        let leader = match (fields.get(5), fields.get(6)) {
            (Some(name), Some(pct)) if !name.trim().is_empty() => Some(SectorLeader {
                name: name.trim().to_string(),
                change_pct: parse_metric(pct),
            }),
            _ => None,
        };

        quotes.insert(
            code.clone(),
            CanonicalQuote {
                code: code.clone(),
                price: parse_metric(fields[1]),
                pe_ttm: parse_metric(fields[2]),
                pb: parse_metric(fields[3]),
                dv_ratio: parse_metric(fields[4]),
                leader,
            },
        );
    }

    Ok(quotes)
}
