//! Sina HQ Quote Provider (delimited strings)
//!
//! The list endpoint answers with GBK-encoded script lines, one per symbol:
//!
//! ```text
//! var hq_str_sh600519="600519,1500.00,...";
//! var hq_str_rt_hk00700="TENCENT,腾讯控股,...";
//! ```
//!
//! Keys are venue-prefixed aliases (`sh`/`sz` for A-shares, `rt_hk` for Hong
//! Kong) and the field offsets differ between the two sub-formats. Offsets
//! live in named field tables, so wiring up another list format is a data
//! change. A line with fewer fields than its table's minimum is skipped.

use super::{create_client, parse_metric, CanonicalQuote, FetchError, QuoteMap};
use crate::config::{InstrumentSpec, Market};
use reqwest::header::REFERER;
use std::collections::HashSet;

const BASE_URL: &str = "https://hq.sinajs.cn";

/// The endpoint rejects requests without a finance.sina.com.cn referer
const REFERER_URL: &str = "https://finance.sina.com.cn";

/// Field positions of one hq sub-format
struct FieldTable {
    /// Records with fewer fields than this are skipped
    min_fields: usize,
    price: usize,
    pe_ttm: usize,
    pb: usize,
    dv_ratio: usize,
}

/// A-share extended valuation list (sh/sz prefixed keys)
const A_FIELDS: FieldTable = FieldTable {
    min_fields: 42,
    price: 3,
    pe_ttm: 39,
    pb: 40,
    dv_ratio: 41,
};

/// Hong Kong realtime list (rt_hk prefixed keys)
const HK_FIELDS: FieldTable = FieldTable {
    min_fields: 19,
    price: 6,
    pe_ttm: 16,
    pb: 17,
    dv_ratio: 18,
};

/// Fetch quotes for one batch of instruments
pub async fn fetch(targets: &[InstrumentSpec]) -> Result<QuoteMap, FetchError> {
    let aliases: Vec<String> = targets.iter().map(alias).collect();
    let requested: HashSet<&str> = targets.iter().map(|t| t.code.as_str()).collect();

    let url = format!("{}/list={}", BASE_URL, aliases.join(","));
    log::debug!("Fetching Sina quotes from {}", url);

    let client = create_client()?;
    let response = client.get(&url).header(REFERER, REFERER_URL).send().await?;

    let status = response.status();
    if !status.is_success() {
        log::error!("Sina API error: {}", status);
        return Err(FetchError::Http(status));
    }

    // GBK payload; undecodable bytes are replaced, not fatal
    let text = response.text_with_charset("gbk").await?;
    parse_hq_text(&text, &requested)
}

/// Provider-specific code alias: sh600519, sz000858, rt_hk00700
fn alias(spec: &InstrumentSpec) -> String {
    match spec.market {
        Market::H => format!("rt_hk{}", spec.code),
        Market::A if spec.code.starts_with('6') => format!("sh{}", spec.code),
        Market::A => format!("sz{}", spec.code),
    }
}

/// Split an alias back into (is_hong_kong, instrument code)
fn split_alias(alias: &str) -> Option<(bool, &str)> {
    if let Some(code) = alias.strip_prefix("rt_hk") {
        return Some((true, code));
    }
    if alias.len() > 2 && (alias.starts_with("sh") || alias.starts_with("sz")) {
        return Some((false, &alias[2..]));
    }
    None
}

/// Decode the script lines, keeping only requested codes
///
/// A payload without a single `hq_str_` marker has no recognizable structure
/// and fails the batch; anything less degrades per record.
fn parse_hq_text(text: &str, requested: &HashSet<&str>) -> Result<QuoteMap, FetchError> {
    if !text.contains("hq_str_") {
        return Err(FetchError::Payload("no hq_str lines".to_string()));
    }

    let mut quotes = QuoteMap::new();

    for line in text.lines() {
        let Some(rest) = line.trim().strip_prefix("var hq_str_") else {
            continue;
        };
        let Some(eq) = rest.find('=') else { continue };
        let key = &rest[..eq];
        let payload = rest[eq + 1..].trim().trim_matches(';').trim_matches('"');

        // Unknown symbols come back as an empty string
        if payload.is_empty() {
            continue;
        }

        let Some((is_hk, code)) = split_alias(key) else {
            continue;
        };
        if !requested.contains(code) {
            continue;
        }

        let table = if is_hk { &HK_FIELDS } else { &A_FIELDS };
        let fields: Vec<&str> = payload.split(',').collect();
        if fields.len() < table.min_fields {
            log::warn!("Sina record for {} too short ({} fields)", code, fields.len());
            continue;
        }

        quotes.insert(
            code.to_string(),
            CanonicalQuote {
                code: code.to_string(),
                price: parse_metric(fields[table.price]),
                pe_ttm: parse_metric(fields[table.pe_ttm]),
                pb: parse_metric(fields[table.pb]),
                dv_ratio: parse_metric(fields[table.dv_ratio]),
                leader: None,
            },
        );
    }

    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstrumentSpec, Market};

    fn requested<'a>(codes: &[&'a str]) -> HashSet<&'a str> {
        codes.iter().copied().collect()
    }

    /// A-share line with the valuation fields at offsets 39..41
    fn a_line(code: &str, price: f64, pe: f64, pb: f64, dv: f64) -> String {
        let mut fields = vec!["0".to_string(); A_FIELDS.min_fields];
        fields[0] = "name".to_string();
        fields[A_FIELDS.price] = price.to_string();
        fields[A_FIELDS.pe_ttm] = pe.to_string();
        fields[A_FIELDS.pb] = pb.to_string();
        fields[A_FIELDS.dv_ratio] = dv.to_string();
        format!("var hq_str_sh{}=\"{}\";", code, fields.join(","))
    }

    fn hk_line(code: &str, price: f64, pe: f64) -> String {
        let mut fields = vec!["0".to_string(); HK_FIELDS.min_fields];
        fields[HK_FIELDS.price] = price.to_string();
        fields[HK_FIELDS.pe_ttm] = pe.to_string();
        fields[HK_FIELDS.dv_ratio] = "-".to_string();
        format!("var hq_str_rt_hk{}=\"{}\";", code, fields.join(","))
    }

    #[test]
    fn test_alias_by_market() {
        let sh = InstrumentSpec::new("600519", "Moutai", Market::A, vec![]);
        let sz = InstrumentSpec::new("000858", "Wuliangye", Market::A, vec![]);
        let hk = InstrumentSpec::new("00700", "Tencent", Market::H, vec![]);
        assert_eq!(alias(&sh), "sh600519");
        assert_eq!(alias(&sz), "sz000858");
        assert_eq!(alias(&hk), "rt_hk00700");
    }

    #[test]
    fn test_field_table_selected_by_hk_marker() {
        let text = format!("{}\n{}", a_line("600519", 1500.0, 22.5, 8.1, 3.6), hk_line("00700", 410.0, 19.8));
        let quotes = parse_hq_text(&text, &requested(&["600519", "00700"])).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["600519"].price, 1500.0);
        assert_eq!(quotes["600519"].dv_ratio, 3.6);
        assert_eq!(quotes["00700"].price, 410.0);
        assert_eq!(quotes["00700"].pe_ttm, 19.8);
        // "-" sentinel maps to 0.0, not an error
        assert_eq!(quotes["00700"].dv_ratio, 0.0);
    }

    #[test]
    fn test_short_record_is_skipped() {
        let text = format!(
            "var hq_str_sh600000=\"too,short,record\";\n{}",
            a_line("600519", 1500.0, 22.5, 8.1, 3.6)
        );
        let quotes = parse_hq_text(&text, &requested(&["600000", "600519"])).unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(!quotes.contains_key("600000"));
    }

    #[test]
    fn test_empty_payload_for_unknown_symbol() {
        let text = format!("var hq_str_sh600000=\"\";\n{}", a_line("600519", 1.0, 2.0, 3.0, 4.0));
        let quotes = parse_hq_text(&text, &requested(&["600000", "600519"])).unwrap();
        assert_eq!(quotes.len(), 1);
    }

    #[test]
    fn test_unrecognizable_payload_fails_batch() {
        assert!(parse_hq_text("<html>blocked</html>", &requested(&["600519"])).is_err());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let text = a_line("600519", 1500.0, 22.5, 8.1, 3.6);
        let req = requested(&["600519"]);
        assert_eq!(
            parse_hq_text(&text, &req).unwrap(),
            parse_hq_text(&text, &req).unwrap()
        );
    }
}
