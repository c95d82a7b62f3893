//! Eastmoney Quote Provider (snapshot table)
//!
//! Queries the push2 ulist endpoint, which returns a JSON row table for the
//! requested security list. Metric columns map 1:1 by fixed field name:
//! f12 code, f2 price, f9 PE-TTM, f23 PB, f133/f115 dividend yield.
//!
//! Requested codes absent from the table are simply missing from the output.

use super::{create_client, parse_metric, CanonicalQuote, FetchError, QuoteMap};
use crate::config::{InstrumentSpec, Market};
use serde_json::Value;
use std::collections::HashSet;

const BASE_URL: &str = "https://push2.eastmoney.com/api/qt/ulist.np/get";

/// Required token for the ulist endpoint
const UT_TOKEN: &str = "f057cbcbce2a86e2866ab8877db1d059";

/// Requested columns: code, name, price, PE-TTM, PB, dividend yield (HK/A)
const FIELDS: &str = "f12,f14,f2,f9,f23,f133,f115";

/// Fetch quotes for one batch of instruments
pub async fn fetch(targets: &[InstrumentSpec]) -> Result<QuoteMap, FetchError> {
    let secids = targets.iter().map(secid).collect::<Vec<_>>().join(",");
    let requested: HashSet<&str> = targets.iter().map(|t| t.code.as_str()).collect();

    let client = create_client()?;
    let response = client
        .get(BASE_URL)
        .query(&[
            ("ut", UT_TOKEN),
            ("invt", "2"),
            ("fltt", "2"),
            ("fields", FIELDS),
            ("secids", secids.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        log::error!("Eastmoney API error: {}", status);
        return Err(FetchError::Http(status));
    }

    let data: Value = response.json().await?;
    parse_snapshot(&data, &requested)
}

/// Eastmoney secid: Shanghai 1.xxx, Shenzhen 0.xxx, Hong Kong 116.xxx
fn secid(spec: &InstrumentSpec) -> String {
    match spec.market {
        Market::H => format!("116.{}", spec.code),
        Market::A if spec.code.starts_with('6') => format!("1.{}", spec.code),
        Market::A => format!("0.{}", spec.code),
    }
}

/// Numeric field that may arrive as a JSON number or as the `"-"` sentinel
fn field_f64(row: &Value, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_metric(s),
        _ => 0.0,
    }
}

/// Decode the snapshot table, keeping only requested codes
///
/// A row without a usable code is skipped; a missing `data.diff` structure is
/// a fetch-level failure.
fn parse_snapshot(data: &Value, requested: &HashSet<&str>) -> Result<QuoteMap, FetchError> {
    let rows = data
        .get("data")
        .and_then(|d| d.get("diff"))
        .and_then(|d| d.as_array())
        .ok_or_else(|| FetchError::Payload("missing data.diff".to_string()))?;

    let mut quotes = QuoteMap::new();

    for row in rows {
        let code = match row.get("f12").and_then(|c| c.as_str()) {
            Some(c) => c,
            None => continue,
        };
        if !requested.contains(code) {
            continue;
        }

        // Dividend yield: f133 (HK and some A-shares) with f115 fallback
        let mut dv_ratio = field_f64(row, "f133");
        if dv_ratio == 0.0 {
            dv_ratio = field_f64(row, "f115");
        }

        quotes.insert(
            code.to_string(),
            CanonicalQuote {
                code: code.to_string(),
                price: field_f64(row, "f2"),
                pe_ttm: field_f64(row, "f9"),
                pb: field_f64(row, "f23"),
                dv_ratio,
                leader: None,
            },
        );
    }

    Ok(quotes)
}
