//! hlx - basket/stop-loss manager and order signer.
//!
//! Subcommands:
//! - `run`: guard the configured baskets against a stdin price feed
//! - `sign`: build and sign one order, optionally send it
//! - `plan`: print a split order plan

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hlx_basket::{plan, to_orders, ScaleBias, SplitPlanRequest};
use hlx_bot::{AppConfig, Application};
use hlx_core::{OrderKind, OrderRequest, OrderSide, Price, Size, TimeInForce};
use hlx_telemetry::Metrics;
use tokio::io::BufReader;
use tracing::info;

/// hlx basket manager and order signer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via HLX_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read `{"symbol":..,"price":..}` lines from stdin and fire basket exits
    Run {
        /// Print Prometheus metrics to stdout on exit
        #[arg(long)]
        dump_metrics: bool,
    },
    /// Build and sign one order; print the exchange payload
    Sign {
        symbol: String,
        #[arg(value_enum)]
        side: SideArg,
        size: Size,
        price: Price,
        /// Send as IOC at `price` as the worst acceptable fill
        #[arg(long, conflicts_with = "tif")]
        market: bool,
        #[arg(long, value_enum, default_value_t = TifArg::Gtc)]
        tif: TifArg,
        #[arg(long)]
        reduce_only: bool,
        /// Submit the signed payload to the exchange
        #[arg(long)]
        send: bool,
    },
    /// Print the legs of a split order
    Plan {
        min_price: Price,
        max_price: Price,
        count: usize,
        total: Size,
        #[arg(long, value_enum, default_value_t = BiasArg::Mid)]
        bias: BiasArg,
        /// Round to this asset's precision (from the config asset table)
        #[arg(long)]
        symbol: Option<String>,
        /// With --symbol, print limit orders on this side instead of legs
        #[arg(long, value_enum, requires = "symbol")]
        side: Option<SideArg>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for OrderSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => OrderSide::Buy,
            SideArg::Sell => OrderSide::Sell,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TifArg {
    Alo,
    Ioc,
    Gtc,
}

impl From<TifArg> for TimeInForce {
    fn from(tif: TifArg) -> Self {
        match tif {
            TifArg::Alo => TimeInForce::Alo,
            TifArg::Ioc => TimeInForce::Ioc,
            TifArg::Gtc => TimeInForce::Gtc,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BiasArg {
    Lower,
    Mid,
    Upper,
}

impl From<BiasArg> for ScaleBias {
    fn from(bias: BiasArg) -> Self {
        match bias {
            BiasArg::Lower => ScaleBias::Lower,
            BiasArg::Mid => ScaleBias::Mid,
            BiasArg::Upper => ScaleBias::Upper,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    hlx_telemetry::init_logging()?;

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)
        .with_context(|| format!("loading {config_path}"))?;

    match args.command {
        Command::Run { dump_metrics } => {
            info!("Starting hlx-bot v{}", env!("CARGO_PKG_VERSION"));
            let app = Application::new(config)?;
            let stdin = BufReader::new(tokio::io::stdin());
            app.run(stdin).await?;
            if dump_metrics {
                print!("{}", Metrics::gather_text()?);
            }
        }
        Command::Sign {
            symbol,
            side,
            size,
            price,
            market,
            tif,
            reduce_only,
            send,
        } => {
            let kind = if market {
                OrderKind::Market
            } else {
                OrderKind::Limit { tif: tif.into() }
            };
            let order = OrderRequest::new(symbol, side.into(), size, price, reduce_only, kind, None)?;

            let app = Application::new(config)?;
            let signed = app.sign(&order)?;
            println!("{}", serde_json::to_string_pretty(&signed.to_value()?)?);

            if send {
                let report = app.submit(signed).await?;
                info!(nonce = report.nonce, statuses = ?report.statuses, "order submitted");
                if let Some(error) = report.first_error() {
                    anyhow::bail!("exchange refused order: {error}");
                }
            }
        }
        Command::Plan {
            min_price,
            max_price,
            count,
            total,
            bias,
            symbol,
            side,
        } => {
            let mut request = SplitPlanRequest::new(min_price, max_price, count, bias.into(), total);
            if let Some(symbol) = &symbol {
                let table = config.asset_table()?;
                request = request.with_asset(table.resolve(symbol)?);
            }
            let legs = plan(&request)?;

            match (symbol, side) {
                (Some(symbol), Some(side)) => {
                    for order in to_orders(&legs, &symbol, side.into(), TimeInForce::Gtc, false)? {
                        println!(
                            "{} {} {} @ {}",
                            order.side(),
                            order.size(),
                            order.asset(),
                            order.limit_price()
                        );
                    }
                }
                _ => println!("{}", serde_json::to_string_pretty(&legs)?),
            }
        }
    }

    Ok(())
}
