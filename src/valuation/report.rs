//! Signal report aggregation and rendering
//!
//! Builds one entry per watched instrument, in watch-list order (the output
//! order is a display-stability contract, never sorted by computed values),
//! and renders the result as a markdown push notification.

use super::{evaluate, Evaluation, IndeterminateReason};
use crate::config::{InstrumentSpec, Metric, MetricRule};
use crate::quotes::{CanonicalQuote, QuoteMap};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Evaluation of one rule, with the context needed for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub rule: MetricRule,
    /// Current metric value; `None` when the provider did not report it
    pub current: Option<f64>,
    pub evaluation: Evaluation,
}

/// Per-instrument result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntryOutcome {
    /// No quote came back for this instrument at all
    DataMissing,
    /// Quote present; one outcome per configured rule, in rule order
    Quoted { price: f64, rows: Vec<RuleOutcome> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub code: String,
    pub display_name: String,
    pub outcome: EntryOutcome,
}

/// Aggregated fetch-cycle result, ready for rendering and delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub generated_at: DateTime<Local>,
    pub entries: Vec<ReportEntry>,
}

/// Metric value for evaluation; the `0.0` sentinel means "not reported"
fn metric_of(quote: &CanonicalQuote, metric: Metric) -> Option<f64> {
    let value = match metric {
        Metric::PeTtm => quote.pe_ttm,
        Metric::Pb => quote.pb,
        Metric::DvRatio => quote.dv_ratio,
    };
    if value == 0.0 {
        None
    } else {
        Some(value)
    }
}

impl SignalReport {
    /// Evaluate every rule of every watched instrument
    pub fn build(watchlist: &[InstrumentSpec], quotes: &QuoteMap) -> Self {
        let entries = watchlist
            .iter()
            .map(|spec| {
                let outcome = match quotes.get(&spec.code) {
                    None => EntryOutcome::DataMissing,
                    Some(quote) => EntryOutcome::Quoted {
                        price: quote.price,
                        rows: spec
                            .rules
                            .iter()
                            .map(|rule| {
                                let current = metric_of(quote, rule.metric);
                                RuleOutcome {
                                    rule: rule.clone(),
                                    current,
                                    evaluation: evaluate(current, rule),
                                }
                            })
                            .collect(),
                    },
                };
                ReportEntry {
                    code: spec.code.clone(),
                    display_name: spec.display_name.clone(),
                    outcome,
                }
            })
            .collect();

        Self {
            generated_at: Local::now(),
            entries,
        }
    }

    /// Render into a push notification (title, markdown body)
    pub fn render(&self) -> (String, String) {
        let title = format!("Valuation radar {}", self.generated_at.format("%H:%M"));

        let mut lines = vec![
            "Legend: 🔥 extreme value | ✅ undervalued | ⚖️ fair | ⚠️ watch | 🔴 expensive"
                .to_string(),
            "-".repeat(30),
        ];

        for entry in &self.entries {
            match &entry.outcome {
                EntryOutcome::DataMissing => {
                    lines.push(format!("⚪ **{}**: no data", entry.display_name));
                }
                EntryOutcome::Quoted { price, rows } => {
                    lines.push(format!("**{}** (¥{})", entry.display_name, price));
                    for row in rows {
                        lines.push(render_row(row));
                    }
                }
            }
            lines.push(String::new());
        }

        (title, lines.join("\n"))
    }
}

/// Display form of a metric value ("%" suffix for dividend yield)
fn value_str(row: &RuleOutcome) -> String {
    let suffix = if row.rule.metric.is_percent() { "%" } else { "" };
    match row.current {
        Some(v) => format!("{}{}", v, suffix),
        None => "n/a".to_string(),
    }
}

fn render_row(row: &RuleOutcome) -> String {
    let icon = row.evaluation.icon();
    let desc = &row.rule.description;
    let val = value_str(row);

    match &row.evaluation {
        Evaluation::Percentile { pct, .. } => {
            let buy = row.rule.buy.unwrap_or_default();
            let sell = row.rule.sell.unwrap_or_default();
            format!(
                "• {} {}: {}-{} | now **{:.0}%** of band ({})",
                icon, desc, buy, sell, pct, val
            )
        }
        Evaluation::BuyBar { .. } => {
            let op = if row.rule.reverse { ">" } else { "<" };
            let buy = row.rule.buy.unwrap_or_default();
            format!("• {} {}: {}{} | now {}", icon, desc, op, buy, val)
        }
        Evaluation::SellBar { .. } => {
            let op = if row.rule.reverse { "<" } else { ">" };
            let sell = row.rule.sell.unwrap_or_default();
            format!("• {} {}: {}{} | now {}", icon, desc, op, sell, val)
        }
        Evaluation::Indeterminate { reason } => match reason {
            IndeterminateReason::IncompleteRule => {
                format!("• {} {}: incomplete rule ({})", icon, desc, val)
            }
            IndeterminateReason::MissingValue => {
                format!("• {} {}: {} not reported", icon, desc, row.rule.metric.as_str())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstrumentSpec, Market, MetricRule};
    use crate::valuation::Tier;

    fn quote(code: &str, price: f64, pe: f64, pb: f64, dv: f64) -> CanonicalQuote {
        CanonicalQuote {
            code: code.to_string(),
            price,
            pe_ttm: pe,
            pb,
            dv_ratio: dv,
            leader: None,
        }
    }

    fn watchlist() -> Vec<InstrumentSpec> {
        vec![
            InstrumentSpec::new(
                "600519",
                "Kweichow Moutai",
                Market::A,
                vec![
                    MetricRule::pe(Some(25.0), Some(40.0), "PE"),
                    MetricRule::dividend(Some(3.5), None, "Dividend yield"),
                ],
            ),
            InstrumentSpec::new(
                "00700",
                "Tencent Holdings (H)",
                Market::H,
                vec![MetricRule::pe(Some(18.0), Some(30.0), "PE")],
            ),
        ]
    }

    #[test]
    fn test_missing_instrument_gets_single_marker() {
        let mut quotes = QuoteMap::new();
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 3.8));

        let report = SignalReport::build(&watchlist(), &quotes);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[1].outcome, EntryOutcome::DataMissing);
    }

    #[test]
    fn test_entries_follow_watchlist_order() {
        let mut quotes = QuoteMap::new();
        // Insert in reverse of the configured order
        quotes.insert("00700".to_string(), quote("00700", 410.0, 19.8, 4.2, 0.9));
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 3.8));

        let report = SignalReport::build(&watchlist(), &quotes);
        let codes: Vec<_> = report.entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["600519", "00700"]);
    }

    #[test]
    fn test_rows_mirror_rule_order() {
        let mut quotes = QuoteMap::new();
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 3.8));

        let report = SignalReport::build(&watchlist(), &quotes);
        match &report.entries[0].outcome {
            EntryOutcome::Quoted { price, rows } => {
                assert_eq!(*price, 1500.0);
                assert_eq!(rows.len(), 2);
                assert!(matches!(rows[0].evaluation, Evaluation::Percentile { .. }));
                assert_eq!(rows[1].evaluation.tier(), Some(Tier::Attractive));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unreported_metric_is_indeterminate() {
        let mut quotes = QuoteMap::new();
        // Dividend yield not reported: 0.0 sentinel
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 0.0));

        let report = SignalReport::build(&watchlist(), &quotes);
        match &report.entries[0].outcome {
            EntryOutcome::Quoted { rows, .. } => {
                assert_eq!(rows[1].current, None);
                assert_eq!(
                    rows[1].evaluation,
                    Evaluation::Indeterminate {
                        reason: IndeterminateReason::MissingValue
                    }
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_render_contains_legend_and_markers() {
        let quotes = QuoteMap::new();
        let report = SignalReport::build(&watchlist(), &quotes);
        let (title, body) = report.render();

        assert!(title.starts_with("Valuation radar"));
        assert!(body.starts_with("Legend:"));
        assert!(body.contains("⚪ **Kweichow Moutai**: no data"));
        assert!(body.contains("⚪ **Tencent Holdings (H)**: no data"));
    }

    #[test]
    fn test_render_percentile_and_bar_rows() {
        let mut quotes = QuoteMap::new();
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 3.8));

        let report = SignalReport::build(&watchlist(), &quotes);
        let (_, body) = report.render();

        // (30 - 25) / 15 * 100 ≈ 33%: fair tier
        assert!(body.contains("• ⚖️ PE: 25-40 | now **33%** of band (30)"));
        // Reverse buy bar met at 3.8 >= 3.5, "%" suffix on dividend values
        assert!(body.contains("• ✅ Dividend yield: >3.5 | now 3.8%"));
    }

    #[test]
    fn test_render_names_unreported_metric() {
        let mut quotes = QuoteMap::new();
        // Dividend yield not reported: 0.0 sentinel
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 0.0));

        let (_, body) = SignalReport::build(&watchlist(), &quotes).render();
        assert!(body.contains("• ⚪ Dividend yield: dv_ratio not reported"));
    }

    #[test]
    fn test_incomplete_rule_is_rendered() {
        let spec = vec![InstrumentSpec::new(
            "600519",
            "Kweichow Moutai",
            Market::A,
            vec![MetricRule::pe(None, None, "PE")],
        )];
        let mut quotes = QuoteMap::new();
        quotes.insert("600519".to_string(), quote("600519", 1500.0, 30.0, 8.0, 3.8));

        let (_, body) = SignalReport::build(&spec, &quotes).render();
        assert!(body.contains("incomplete rule"));
    }
}
