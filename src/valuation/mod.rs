//! Rule evaluation
//!
//! Maps a current metric value and a `MetricRule` to a signal tier and, when
//! both thresholds are defined, a continuous percentile score
//! (0% = buy threshold, 100% = sell threshold). Pure and side-effect free.

pub mod report;

use crate::config::MetricRule;
use serde::{Deserialize, Serialize};

/// Signal tier for one evaluated rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Below the buy threshold (percentile < 0)
    ExtremeBuy,
    /// Near the buy threshold, or a single buy bar that is met
    Attractive,
    /// Mid range
    Fair,
    /// Approaching the sell threshold
    Watch,
    /// Single buy bar not yet met; weaker than Watch, not alarming
    WatchLite,
    /// Beyond the sell threshold
    Expensive,
}

impl Tier {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::ExtremeBuy => "🔥",
            Self::Attractive => "✅",
            Self::Fair => "⚖️",
            Self::Watch => "⚠️",
            Self::WatchLite => "🔸",
            Self::Expensive => "🔴",
        }
    }
}

/// Why a rule could not be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndeterminateReason {
    /// The metric was absent from the quote (or unreported by the provider)
    MissingValue,
    /// Neither buy nor sell threshold is configured
    IncompleteRule,
}

/// Result of evaluating one rule, tagged by which thresholds were present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Evaluation {
    /// Both thresholds present: continuous percentile plus tier
    Percentile { pct: f64, tier: Tier },
    /// Only the buy threshold present
    BuyBar { met: bool, tier: Tier },
    /// Only the sell threshold present
    SellBar { triggered: bool, tier: Tier },
    /// No verdict; the reason is surfaced, never silently dropped
    Indeterminate { reason: IndeterminateReason },
}

impl Evaluation {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::Percentile { tier, .. }
            | Self::BuyBar { tier, .. }
            | Self::SellBar { tier, .. } => Some(*tier),
            Self::Indeterminate { .. } => None,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.tier() {
            Some(tier) => tier.icon(),
            None => "⚪",
        }
    }
}

/// Evaluate a single rule against the current metric value
///
/// `current` is `None` when the metric is absent (instrument missing from the
/// fetch, or the provider did not report it); this short-circuits to
/// `Indeterminate` before any arithmetic.
pub fn evaluate(current: Option<f64>, rule: &MetricRule) -> Evaluation {
    let Some(current) = current else {
        return Evaluation::Indeterminate {
            reason: IndeterminateReason::MissingValue,
        };
    };
    if !current.is_finite() {
        return Evaluation::Indeterminate {
            reason: IndeterminateReason::MissingValue,
        };
    }

    match (rule.buy, rule.sell) {
        (Some(buy), Some(sell)) => {
            let pct = if buy == sell {
                // Degenerate band: treat as exactly at the boundary
                0.0
            } else if rule.reverse {
                (buy - current) / (buy - sell) * 100.0
            } else {
                (current - buy) / (sell - buy) * 100.0
            };
            if !pct.is_finite() {
                return Evaluation::Indeterminate {
                    reason: IndeterminateReason::MissingValue,
                };
            }
            Evaluation::Percentile {
                pct,
                tier: classify(pct),
            }
        }
        (Some(buy), None) => {
            let met = if rule.reverse {
                current >= buy
            } else {
                current <= buy
            };
            Evaluation::BuyBar {
                met,
                tier: if met { Tier::Attractive } else { Tier::WatchLite },
            }
        }
        (None, Some(sell)) => {
            let triggered = if rule.reverse {
                current <= sell
            } else {
                current >= sell
            };
            Evaluation::SellBar {
                triggered,
                tier: if triggered { Tier::Expensive } else { Tier::Fair },
            }
        }
        (None, None) => Evaluation::Indeterminate {
            reason: IndeterminateReason::IncompleteRule,
        },
    }
}

/// Classify a percentile into a tier
///
/// Boundaries are monotonic: 80 still counts as Fair, 100 as Watch.
fn classify(pct: f64) -> Tier {
    if pct < 0.0 {
        Tier::ExtremeBuy
    } else if pct < 20.0 {
        Tier::Attractive
    } else if pct <= 80.0 {
        Tier::Fair
    } else if pct <= 100.0 {
        Tier::Watch
    } else {
        Tier::Expensive
    }
}
