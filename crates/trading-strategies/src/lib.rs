//! Entry rule for the trading bot.
//!
//! The rule is a conjunction of conditions evaluated on an enriched candle
//! series. Only the newest fully closed candle feeds the decision.

mod conditions;
mod entry_rule;

pub use conditions::{CloseAbove, ConditionConfig, EntryCondition, MaAbove};
pub use entry_rule::{EntryDecision, EntryRule, EntryRuleConfig};
