//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "intraday-trader")]
#[command(author, version, about = "Single-pair intraday trading bot")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "TRADING_CONFIG")]
    pub config: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Trade against the exchange on a fixed interval
    Run(RunArgs),
    /// Run a single cycle and exit
    Once(RunArgs),
    /// Trade live market data against an in-memory account
    Paper(PaperArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Only validate orders with the exchange, whatever the configuration says
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Starting balance in the base currency
    #[arg(long, default_value = "1000")]
    pub capital: Decimal,

    /// Stop after this many cycles
    #[arg(long)]
    pub cycles: Option<u64>,
}
