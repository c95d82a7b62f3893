//! Watch-list and rule configuration
//!
//! The watch-list is an explicit, immutable configuration object that gets
//! passed into the pipeline entry point. Nothing in here is mutated after
//! process start; tests substitute their own small rule sets.

use serde::{Deserialize, Serialize};

/// Environment variable holding the comma-separated push delivery keys
pub const PUSH_KEY_ENV: &str = "SERVERCHAN_KEY";

/// Metric kinds a rule can be evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    PeTtm,
    Pb,
    DvRatio,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeTtm => "pe_ttm",
            Self::Pb => "pb",
            Self::DvRatio => "dv_ratio",
        }
    }

    /// Dividend yield is reported as a percentage
    pub fn is_percent(&self) -> bool {
        matches!(self, Self::DvRatio)
    }
}

/// Trading venue of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    /// Mainland A-shares (Shanghai/Shenzhen)
    A,
    /// Hong Kong listed shares
    H,
}

/// Single valuation rule for one metric
///
/// `buy` marks the attractive boundary, `sell` the expensive one. Either may
/// be absent; a rule with neither is a configuration error and shows up as an
/// incomplete-rule marker in the report instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRule {
    pub metric: Metric,
    pub buy: Option<f64>,
    pub sell: Option<f64>,
    /// false: smaller is better (PE/PB); true: larger is better (dividend yield)
    pub reverse: bool,
    pub description: String,
}

impl MetricRule {
    pub fn new(
        metric: Metric,
        buy: Option<f64>,
        sell: Option<f64>,
        reverse: bool,
        description: &str,
    ) -> Self {
        Self {
            metric,
            buy,
            sell,
            reverse,
            description: description.to_string(),
        }
    }

    pub fn pe(buy: Option<f64>, sell: Option<f64>, description: &str) -> Self {
        Self::new(Metric::PeTtm, buy, sell, false, description)
    }

    pub fn pb(buy: Option<f64>, sell: Option<f64>, description: &str) -> Self {
        Self::new(Metric::Pb, buy, sell, false, description)
    }

    pub fn dividend(buy: Option<f64>, sell: Option<f64>, description: &str) -> Self {
        Self::new(Metric::DvRatio, buy, sell, true, description)
    }
}

/// One watched instrument with its ordered rule list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSpec {
    pub code: String,
    pub display_name: String,
    pub market: Market,
    pub rules: Vec<MetricRule>,
}

impl InstrumentSpec {
    pub fn new(code: &str, display_name: &str, market: Market, rules: Vec<MetricRule>) -> Self {
        Self {
            code: code.to_string(),
            display_name: display_name.to_string(),
            market,
            rules,
        }
    }
}

/// Parse push delivery keys from the environment
///
/// An absent or empty variable disables delivery; it is not an error.
pub fn push_keys() -> Vec<String> {
    std::env::var(PUSH_KEY_ENV)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// The built-in watch-list: core holdings, cash cows and cyclicals
pub fn default_watchlist() -> Vec<InstrumentSpec> {
    use Market::{A, H};

    vec![
        // Core holdings with pricing power
        InstrumentSpec::new(
            "600519",
            "Kweichow Moutai",
            A,
            vec![
                MetricRule::pe(Some(25.0), Some(40.0), "PE (prime <20)"),
                MetricRule::dividend(Some(3.5), Some(1.5), "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "000858",
            "Wuliangye",
            A,
            vec![
                MetricRule::pe(Some(16.0), Some(30.0), "PE (prime <13)"),
                MetricRule::dividend(Some(4.0), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "000333",
            "Midea Group",
            A,
            vec![
                MetricRule::pe(Some(15.0), Some(22.0), "PE (prime <12)"),
                MetricRule::dividend(Some(5.0), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "600436",
            "Pien Tze Huang",
            A,
            vec![
                MetricRule::pe(Some(35.0), Some(65.0), "PE (prime <30)"),
                MetricRule::dividend(Some(2.5), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "600329",
            "Darentang",
            A,
            vec![
                MetricRule::pe(Some(12.0), Some(28.0), "PE (prime <10)"),
                MetricRule::dividend(Some(3.0), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "300760",
            "Mindray Medical",
            A,
            vec![
                MetricRule::pe(Some(22.0), Some(42.0), "PE (prime <18)"),
                MetricRule::dividend(Some(1.5), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "600660",
            "Fuyao Glass",
            A,
            vec![
                MetricRule::pe(Some(16.0), Some(28.0), "PE (prime <13)"),
                MetricRule::dividend(Some(2.5), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "02328",
            "PICC P&C (H)",
            H,
            vec![
                MetricRule::pb(Some(0.7), Some(1.2), "PB"),
                MetricRule::dividend(Some(6.5), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "00700",
            "Tencent Holdings (H)",
            H,
            // Upstream reports IFRS PE, not the adjusted figure
            vec![MetricRule::pe(Some(18.0), Some(30.0), "PE")],
        ),
        InstrumentSpec::new(
            "600900",
            "Yangtze Power",
            A,
            vec![MetricRule::dividend(Some(3.8), Some(2.6), "Dividend yield")],
        ),
        // Cash cows: high yield, low valuation
        InstrumentSpec::new(
            "00883",
            "CNOOC (H)",
            H,
            vec![
                MetricRule::pe(Some(7.0), None, "PE"),
                MetricRule::dividend(Some(7.0), Some(5.5), "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "03988",
            "Bank of China (H)",
            H,
            vec![
                MetricRule::pb(Some(0.4), Some(0.65), "PB"),
                MetricRule::dividend(Some(8.0), Some(5.0), "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "00939",
            "China Construction Bank (H)",
            H,
            vec![
                MetricRule::pb(Some(0.48), Some(0.70), "PB"),
                MetricRule::dividend(Some(7.0), Some(4.5), "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "00941",
            "China Mobile (H)",
            H,
            vec![
                MetricRule::pe(Some(11.0), None, "PE"),
                MetricRule::dividend(Some(6.5), Some(4.5), "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "00874",
            "Baiyunshan (H)",
            H,
            vec![
                MetricRule::pe(Some(10.0), Some(15.0), "PE"),
                MetricRule::dividend(Some(4.5), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "000651",
            "Gree Electric",
            A,
            vec![
                MetricRule::pe(Some(8.0), Some(12.0), "PE"),
                MetricRule::dividend(Some(7.0), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "603288",
            "Haitian Flavouring",
            A,
            vec![MetricRule::pe(Some(22.0), Some(42.0), "PE (prime <18)")],
        ),
        InstrumentSpec::new(
            "002027",
            "Focus Media",
            A,
            vec![MetricRule::pe(Some(14.0), Some(23.0), "PE (prime <11)")],
        ),
        // Cyclicals: accumulate at the trough, exit at the peak
        InstrumentSpec::new(
            "01919",
            "COSCO Shipping (H)",
            H,
            vec![
                MetricRule::pb(Some(0.7), Some(1.3), "PB (freight trough)"),
                MetricRule::dividend(Some(8.0), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "601668",
            "China State Construction",
            A,
            vec![
                MetricRule::pb(Some(0.55), Some(0.8), "PB"),
                MetricRule::pe(Some(5.0), None, "PE"),
            ],
        ),
        InstrumentSpec::new(
            "01099",
            "Sinopharm (H)",
            H,
            vec![
                MetricRule::pe(Some(8.0), Some(14.0), "PE"),
                MetricRule::dividend(Some(5.5), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "06030",
            "CITIC Securities (H)",
            H,
            vec![MetricRule::pb(Some(0.9), Some(1.7), "PB (bull/bear cycle)")],
        ),
        InstrumentSpec::new(
            "600019",
            "Baoshan Iron & Steel",
            A,
            vec![
                MetricRule::pb(Some(0.55), Some(0.9), "PB"),
                MetricRule::dividend(Some(6.0), None, "Dividend yield"),
            ],
        ),
        InstrumentSpec::new(
            "002714",
            "Muyuan Foods",
            A,
            // PE is meaningless in loss years; thresholds are a rough guide only
            vec![MetricRule::pe(Some(10.0), Some(25.0), "PE (hog cycle)")],
        ),
        InstrumentSpec::new(
            "601088",
            "China Shenhua",
            A,
            vec![
                MetricRule::dividend(Some(8.0), None, "Dividend yield"),
                MetricRule::pe(None, Some(12.0), "PE (exit)"),
            ],
        ),
        InstrumentSpec::new(
            "601899",
            "Zijin Mining",
            A,
            vec![
                MetricRule::pe(Some(15.0), Some(30.0), "PE"),
                MetricRule::pb(None, Some(5.5), "PB (exit)"),
                MetricRule::dividend(Some(5.0), None, "Dividend yield"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_watchlist_codes_unique() {
        let watchlist = default_watchlist();
        let codes: HashSet<_> = watchlist.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes.len(), watchlist.len(), "duplicate instrument codes");
    }

    #[test]
    fn test_watchlist_rules_have_a_bound() {
        for spec in default_watchlist() {
            assert!(!spec.rules.is_empty(), "{} has no rules", spec.code);
            for rule in &spec.rules {
                assert!(
                    rule.buy.is_some() || rule.sell.is_some(),
                    "{} rule '{}' has neither buy nor sell",
                    spec.code,
                    rule.description
                );
            }
        }
    }

    #[test]
    fn test_h_share_codes_are_five_digits() {
        for spec in default_watchlist() {
            if spec.market == Market::H {
                assert_eq!(spec.code.len(), 5, "H code {} not 5 digits", spec.code);
            }
        }
    }

    #[test]
    fn test_dividend_rules_are_reverse() {
        for spec in default_watchlist() {
            for rule in &spec.rules {
                if rule.metric == Metric::DvRatio {
                    assert!(rule.reverse, "{} dividend rule not reverse", spec.code);
                }
            }
        }
    }

    #[test]
    fn test_push_keys_empty_when_unset() {
        // Only meaningful when the variable is not set in the test environment
        if std::env::var(PUSH_KEY_ENV).is_err() {
            assert!(push_keys().is_empty());
        }
    }
}
