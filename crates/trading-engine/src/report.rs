//! Cycle reports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use trading_strategies::EntryDecision;

/// Where the sequencer is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Idle,
    EnteringMarket,
    AwaitingFill,
    LimitPlaced,
    Reconciling,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SequencerState::Idle => "Idle",
            SequencerState::EnteringMarket => "EnteringMarket",
            SequencerState::AwaitingFill => "AwaitingFill",
            SequencerState::LimitPlaced => "LimitPlaced",
            SequencerState::Reconciling => "Reconciling",
        };
        write!(f, "{}", s)
    }
}

/// Monitoring view of one resting order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenOrderStatus {
    pub order_id: String,
    pub description: String,
    pub limit_price: Option<Decimal>,
    /// Whole minutes until expiry, rounded down; `None` without an expiry
    pub expiration_mins: Option<i64>,
    /// Market distance from the limit in percent, 4 decimals
    pub gap_pct: Option<f64>,
}

/// What a completed cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Funds available but the entry rule did not trigger
    StayedPut { decision: EntryDecision },
    /// Market buy filled and take-profit placed
    Entered {
        decision: EntryDecision,
        buy_id: String,
        volume: Decimal,
        fill_price: Decimal,
        limit_id: Option<String>,
        limit_price: Decimal,
    },
    /// Both orders validated by the exchange, nothing placed
    DryRunEntered {
        decision: EntryDecision,
        volume: Decimal,
        reference_price: Decimal,
        limit_price: Decimal,
        buy_description: String,
        limit_description: String,
    },
    /// Take-profit still resting; nothing changed
    Monitoring { orders: Vec<OpenOrderStatus> },
    /// Take-profit expired; position sold back at market
    Reverted {
        expired_order_id: String,
        order_id: Option<String>,
        volume: Decimal,
        sell_price: Option<Decimal>,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::StayedPut { .. } => "stayed_put",
            CycleOutcome::Entered { .. } => "entered",
            CycleOutcome::DryRunEntered { .. } => "dry_run_entered",
            CycleOutcome::Monitoring { .. } => "monitoring",
            CycleOutcome::Reverted { .. } => "reverted",
        }
    }

    /// Whether the cycle took the entry branch.
    pub fn is_entry_path(&self) -> bool {
        matches!(
            self,
            CycleOutcome::StayedPut { .. }
                | CycleOutcome::Entered { .. }
                | CycleOutcome::DryRunEntered { .. }
        )
    }
}

/// Complete record of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub pair: String,
    /// Time the cycle was evaluated at
    pub at: DateTime<Utc>,
    /// Base currency balance read at the start of the cycle
    pub balance: Decimal,
    /// Trade currency balance read at the start of the cycle
    pub held: Decimal,
    /// States visited, in order
    pub path: Vec<SequencerState>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("───────────────────────────────────────────────\n");
        s.push_str(&format!("  Pair:      {}\n", self.pair));
        s.push_str(&format!("  At:        {}\n", self.at.to_rfc3339()));
        s.push_str(&format!("  Balance:   {}\n", self.balance));
        s.push_str(&format!("  Held:      {}\n", self.held));
        s.push_str(&format!(
            "  Path:      {}\n",
            self.path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        ));
        s.push_str(&format!("  Outcome:   {}\n", self.outcome.label()));

        match &self.outcome {
            CycleOutcome::StayedPut { decision } => {
                s.push_str(&format!("  Close:     {:.2}\n", decision.close));
            }
            CycleOutcome::Entered {
                buy_id,
                volume,
                fill_price,
                limit_id,
                limit_price,
                ..
            } => {
                s.push_str(&format!("  Bought:    {} @ {} ({})\n", volume, fill_price, buy_id));
                s.push_str(&format!(
                    "  Limit:     {} ({})\n",
                    limit_price,
                    limit_id.as_deref().unwrap_or("-")
                ));
            }
            CycleOutcome::DryRunEntered {
                buy_description,
                limit_description,
                ..
            } => {
                s.push_str(&format!("  Buy:       {}\n", buy_description));
                s.push_str(&format!("  Limit:     {}\n", limit_description));
            }
            CycleOutcome::Monitoring { orders } => {
                for order in orders {
                    s.push_str(&format!(
                        "  Order:     {} | expires in {} min | gap {}%\n",
                        order.description,
                        order
                            .expiration_mins
                            .map_or_else(|| "-".to_string(), |m| m.to_string()),
                        order
                            .gap_pct
                            .map_or_else(|| "-".to_string(), |g| g.to_string()),
                    ));
                }
            }
            CycleOutcome::Reverted {
                volume, sell_price, ..
            } => {
                s.push_str(&format!(
                    "  Sold:      {} @ {}\n",
                    volume,
                    sell_price.map_or_else(|| "-".to_string(), |p| p.to_string())
                ));
            }
        }
        s.push_str("───────────────────────────────────────────────\n");
        s
    }
}
