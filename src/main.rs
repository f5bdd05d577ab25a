//! Leonardo CLI
//!
//! Drives the synchronized store against a running backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use leonardo_client::api::{GatewayConfig, HttpGateway, DEFAULT_BASE_URL};
use leonardo_client::models::{
    InstrumentSummary, OrderRequest, OrderType, SettingsPatch, TradingMode,
};
use leonardo_client::sizing::{snap_to_tick, SizingConfig, SizingOutcome, TickRounding};
use leonardo_client::store::Store;

/// Leonardo trading client CLI.
#[derive(Parser)]
#[command(name = "leonardo")]
#[command(about = "Inspect and drive the Leonardo trading backend", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "LEONARDO_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "LEONARDO_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Paper,
    Live,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current settings
    Settings {
        /// Set the ATR period
        #[arg(long)]
        atr_period: Option<u32>,

        /// Set the maximum loss ratio (e.g. -0.01)
        #[arg(long, allow_hyphen_values = true)]
        max_loss_ratio: Option<Decimal>,
    },

    /// Switch the trading mode
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },

    /// List the watchlist
    Watchlist,

    /// Add an instrument to the watchlist
    Watch {
        /// Instrument code (e.g. 005930)
        code: String,
    },

    /// Remove an instrument from the watchlist
    Unwatch {
        /// Instrument code
        code: String,
    },

    /// Show instruments near their 52-week high
    Directory {
        /// Maximum number of rows to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Find instruments by name or code
    Search {
        /// Part of a name (any case) or code
        query: String,

        /// Maximum number of matches
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show the account total
    Total,

    /// Recommend a position size for an instrument
    Size {
        /// Instrument code
        code: String,

        /// Stop distance in ATRs
        #[arg(long, default_value = "2")]
        stop_multiplier: Decimal,

        /// Cap the investment at this share of total assets (e.g. 0.8)
        #[arg(long)]
        max_investment: Option<Decimal>,
    },

    /// Place a buy order
    Buy {
        /// Instrument code
        code: String,

        /// Number of shares; defaults to the recommended size
        #[arg(short, long)]
        quantity: Option<u64>,

        /// Limit price; snapped to the exchange tick
        #[arg(short, long)]
        price: Option<Decimal>,

        /// Buy at market instead of at a limit
        #[arg(long)]
        market: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let gateway = HttpGateway::with_config(GatewayConfig {
        base_url: cli.base_url.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
    })?;
    info!(base_url = %gateway.base_url(), "Connecting to backend");
    let store = Store::new(Arc::new(gateway));

    match cli.command {
        Commands::Settings {
            atr_period,
            max_loss_ratio,
        } => {
            let current = store.load_settings().await?;
            let settings = if atr_period.is_some() || max_loss_ratio.is_some() {
                let patch = SettingsPatch {
                    atr_period,
                    max_loss_ratio,
                    is_paper_trading: None,
                };
                store.save_settings(patch).await?
            } else {
                current
            };

            println!("\n=== Settings ===\n");
            println!("  ATR Period:      {}", settings.atr_period);
            println!("  Max Loss Ratio:  {}", settings.max_loss_ratio);
            println!("  Trading Mode:    {}", settings.mode());
        }

        Commands::Mode { mode } => {
            store.load_settings().await?;
            let paper = matches!(mode, ModeArg::Paper);
            let settings = store.set_trading_mode(paper).await?;

            println!("Trading mode: {}", settings.mode());
            if let Some(total) = store.account_total().await {
                println!("Total assets: {}", format_won(total.total_asset_value));
            }
            if let Some(failure) = store.last_error().await {
                println!("Warning: reload incomplete ({}: {})", failure.entity, failure.error);
            }
        }

        Commands::Watchlist => {
            let entries = store.fetch_watchlist().await?;
            if entries.is_empty() {
                println!("Watchlist is empty. Use 'leonardo watch <code>' to add one.");
                return Ok(());
            }

            // Failed lookups print as pending.
            join_all(entries.iter().map(|e| store.resolve_name(&e.code))).await;
            let entries = store.watchlist().await;

            println!("\n{:<10} {:<24}", "CODE", "NAME");
            println!("{}", "-".repeat(36));
            for entry in entries {
                println!("{:<10} {:<24}", entry.code, truncate(entry.display_name(), 22));
            }
        }

        Commands::Watch { code } => {
            store.add_to_watchlist(&code).await?;
            let name = store.resolve_name(&code).await.unwrap_or_else(|_| code.clone());
            println!("Now watching: {} ({})", name, code);
        }

        Commands::Unwatch { code } => {
            store.remove_from_watchlist(&code).await?;
            println!("Stopped watching: {}", code);
        }

        Commands::Directory { limit } => {
            store.load_instrument_directory().await?;
            let rows = store.recommendations().await;
            print_directory(rows.iter().take(limit));
        }

        Commands::Search { query, limit } => {
            store.load_instrument_directory().await?;
            let rows = store.search(&query, limit).await;
            if rows.is_empty() {
                println!("No instrument matches '{}'", query);
            } else {
                print_directory(rows.iter());
            }
        }

        Commands::Total => {
            let settings = store.load_settings().await?;
            let total = store
                .load_account_total()
                .await?
                .context("Account total not loaded")?;

            println!("Mode:         {}", settings.mode());
            println!("Total assets: {}", format_won(total.total_asset_value));
        }

        Commands::Size {
            code,
            stop_multiplier,
            max_investment,
        } => {
            let config = sizing_config(stop_multiplier, max_investment);
            store.load_settings().await?;
            store.load_account_total().await?;

            let rec = store.recommend(&code, &config).await?;
            println!("\n=== {} ({}) [{}] ===", rec.quote.name, rec.code, rec.mode);
            println!("Candles: {} used, {} discarded", rec.candles, rec.discarded);

            match &rec.outcome {
                SizingOutcome::Sized(size) => {
                    println!("\n--- Inputs ---");
                    println!("Total Assets:    {}", format_won(size.total_asset));
                    println!("Current Price:   {}", size.current_price);
                    println!("Risk Ratio:      {}", size.risk_ratio);
                    println!("Risk Amount:     {}", size.risk_amount.round());
                    println!("ATR Period:      {}", size.atr_period);

                    println!("\n--- Recommendation ---");
                    println!(
                        "ATR:             {}{}",
                        size.atr.value.round_dp(2),
                        if size.atr.fallback { " (fallback)" } else { "" }
                    );
                    println!("Quantity:        {}", size.quantity);
                    println!("Stop Loss:       {} (tick {})", size.stop_loss.round_dp(2), size.stop_loss_tick);
                    println!("Investment:      {}", size.total_investment.round());
                    println!(
                        "Investment %:    {:.1}%{}",
                        size.investment_ratio * Decimal::from(100),
                        if size.capped { " (capped)" } else { "" }
                    );
                }
                SizingOutcome::NoResult(reason) => {
                    println!("\nNo recommendation: {}", reason);
                }
            }
        }

        Commands::Buy {
            code,
            quantity,
            price,
            market,
        } => {
            store.load_settings().await?;
            store.load_account_total().await?;
            let rec = store.recommend(&code, &SizingConfig::default()).await?;
            let size = rec.outcome.size();

            let quantity = match (quantity, size) {
                (Some(q), _) => q,
                (None, Some(size)) => size.quantity,
                (None, None) => anyhow::bail!("No recommended size; pass --quantity"),
            };
            let atr = size.map(|s| s.atr.value).unwrap_or_default();

            let (order_type, price) = if market {
                (OrderType::Market, Decimal::ZERO)
            } else {
                let price = price
                    .or(rec.quote.current_price)
                    .context("No limit price; pass --price or --market")?;
                (OrderType::Limit, snap_to_tick(price, TickRounding::Round))
            };

            let order = OrderRequest {
                code: code.clone(),
                price,
                quantity,
                order_type,
                atr,
            };

            info!(code = %code, quantity = quantity, mode = %rec.mode, "Submitting order");
            if rec.mode == TradingMode::Live {
                println!("LIVE account order");
            }
            let receipt = store.submit_order(&order).await?;
            println!(
                "{}: {}",
                if receipt.accepted { "Accepted" } else { "Not accepted" },
                receipt.message
            );
        }
    }

    Ok(())
}

fn sizing_config(stop_multiplier: Decimal, max_investment: Option<Decimal>) -> SizingConfig {
    let config = SizingConfig {
        stop_multiplier,
        ..Default::default()
    };
    match max_investment {
        Some(ratio) => config.with_investment_cap(ratio),
        None => config,
    }
}

fn format_won(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-{}원", grouped)
    } else {
        format!("{}원", grouped)
    }
}

fn print_directory<'a>(rows: impl Iterator<Item = &'a InstrumentSummary>) {
    println!(
        "\n{:<10} {:<20} {:>12} {:>12} {:>8}",
        "CODE", "NAME", "PRICE", "52W HIGH", "RATIO"
    );
    println!("{}", "-".repeat(66));
    for row in rows {
        println!(
            "{:<10} {:<20} {:>12} {:>12} {:>7.1}%",
            row.code,
            truncate(&row.name, 18),
            row.current_price,
            row.high_52_week,
            row.ratio * Decimal::from(100)
        );
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
