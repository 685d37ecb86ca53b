//! Command-line surface.
//!
//! Cron lines written for the old script use single-dash long flags
//! (`-market_name BTC-USD`); those are rewritten to `--market_name` before
//! clap sees them.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::RunSettings;
use crate::constants::defaults;

/// Long flags that historically took a single dash.
const LEGACY_FLAGS: &[&str] = &[
    "market_name",
    "order_side",
    "amount",
    "amount_currency",
    "sandbox",
    "warn_after",
    "poll_interval",
];

#[derive(Parser, Debug, Clone)]
#[command(name = "dcabot")]
#[command(about = "Dollar-cost-averaging bot that places a single market order")]
#[command(long_about = "Dollar-cost-averaging bot that places a single market order.

examples:
    BTC-USD BUY 14 USD          (buy $14 worth of BTC)
    BTC-USD BUY 0.00125 BTC     (buy 0.00125 BTC)
    ETH-BTC SELL 0.00125 BTC    (sell 0.00125 BTC worth of ETH)
    ETH-BTC SELL 0.1 ETH        (sell 0.1 ETH)")]
pub struct Cli {
    /// Market pair, e.g. BTC-USD or ETH-BTC
    #[arg(long = "market_name", alias = "market-name", default_value = defaults::MARKET_NAME)]
    pub market_name: String,

    #[arg(long = "order_side", alias = "order-side", default_value = defaults::ORDER_SIDE, value_parser = ["BUY", "SELL"])]
    pub order_side: String,

    /// Quantity to buy or sell, in amount_currency
    #[arg(long = "amount", default_value = defaults::AMOUNT, allow_hyphen_values = true)]
    pub amount: String,

    /// Currency the amount is denominated in
    #[arg(long = "amount_currency", alias = "amount-currency", default_value = defaults::AMOUNT_CURRENCY)]
    pub amount_currency: String,

    /// Run against the sandbox; skips the confirmation prompt
    #[arg(long = "sandbox")]
    pub sandbox: bool,

    /// Seconds to wait before alerting that an order isn't done
    #[arg(long = "warn_after", alias = "warn-after", default_value_t = 30)]
    pub warn_after: u64,

    /// Seconds between order status checks
    #[arg(
        long = "poll_interval",
        alias = "poll-interval",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Suppresses the confirmation prompt
    #[arg(short = 'j', long = "job")]
    pub job: bool,

    /// Config file location
    #[arg(short = 'c', long = "config", default_value = defaults::CONFIG_FILE)]
    pub config: PathBuf,

    /// Credentials profile inside the config file
    #[arg(long = "profile", default_value = defaults::PROFILE)]
    pub profile: String,

    /// Trigger payload (JSON with an `attributes` map) overriding the flags above
    #[arg(long = "event")]
    pub event: Option<PathBuf>,

    /// Listen for triggers over HTTP on this address instead of running once
    #[arg(long = "serve")]
    pub serve: Option<String>,
}

impl Cli {
    pub fn parse_args<I>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = String>,
    {
        Self::try_parse_from(normalize_legacy_args(args))
    }

    pub fn to_settings(&self) -> RunSettings {
        RunSettings {
            market_name: self.market_name.clone(),
            order_side: self.order_side.clone(),
            amount: self.amount.clone(),
            amount_currency: self.amount_currency.clone(),
            config_file: self.config.clone(),
            profile: self.profile.clone(),
            sandbox: self.sandbox,
            job: self.job,
            warn_after: Duration::from_secs(self.warn_after),
            poll_interval: Duration::from_secs(self.poll_interval),
        }
    }
}

/// Rewrites `-market_name` style flags to `--market_name`. The program name
/// and everything after a bare `--` are left alone.
pub fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut passthrough = false;

    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        if arg == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let is_legacy = arg
            .strip_prefix('-')
            .filter(|rest| !rest.starts_with('-'))
            .map(|rest| rest.split('=').next().unwrap_or(rest))
            .is_some_and(|name| LEGACY_FLAGS.contains(&name));

        if is_legacy {
            out.push(format!("-{}", arg));
        } else {
            out.push(arg);
        }
    }
    out
}
