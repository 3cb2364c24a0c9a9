//! # backoffice
//!
//! Operator tool for the furniture back office.
//!
//! ```text
//! backoffice [low-stock]                   reorder list, biggest shortfall first
//! backoffice movements [PRODUCT_ID] [N]    movement log, newest first
//! backoffice health                        database and migration status
//! ```
//!
//! Output is JSON on stdout; logs go to stderr.

use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use tracing::info;

use furnish_backoffice::{telemetry, BackOffice, BackOfficeConfig};
use furnish_core::MovementFilter;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    LowStock,
    Movements {
        product_id: Option<String>,
        limit: Option<u32>,
    },
    Health,
}

impl Command {
    fn parse<I>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let command = match args.next().as_deref() {
            None | Some("low-stock") => Command::LowStock,
            Some("movements") => {
                let product_id = args.next();
                let limit = args
                    .next()
                    .map(|n| n.parse::<u32>())
                    .transpose()
                    .context("movement limit must be a positive number")?;
                Command::Movements { product_id, limit }
            }
            Some("health") => Command::Health,
            Some(other) => bail!("unknown command '{other}' (expected low-stock, movements or health)"),
        };

        if let Some(extra) = args.next() {
            bail!("unexpected argument '{extra}'");
        }
        Ok(command)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BackOfficeConfig::load().context("loading configuration")?;
    telemetry::init(&config.log_filter, config.log_json)
        .map_err(|e| anyhow!("initialising logging: {e}"))?;

    let command = Command::parse(std::env::args().skip(1))?;
    info!(?command, "Starting back office");

    let office = BackOffice::connect(&config)
        .await
        .context("opening database")?;

    let result = run(&office, command).await;
    office.close().await;
    result
}

async fn run(office: &BackOffice, command: Command) -> anyhow::Result<()> {
    match command {
        Command::LowStock => print_json(&office.list_low_stock().await?),
        Command::Movements { product_id, limit } => print_json(
            &office
                .list_movements(MovementFilter {
                    product_id,
                    limit,
                    ..Default::default()
                })
                .await?,
        ),
        Command::Health => print_json(&office.health().await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
