use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{Engine, IntakeRate, RecordIntakeCmd};
use migration::MigratorTrait;
use rust_decimal::Decimal;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use settings::Settings;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "cambio_admin")]
#[command(about = "Bookkeeping for a currency-exchange inventory (rates, intakes, sales)")]
struct Cli {
    /// Settings file, without extension.
    #[arg(long, default_value = "settings")]
    config: String,

    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Who is recording the operation. Defaults to the configured owner.
    #[arg(long, global = true)]
    by: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the database schema.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    Rate(Rate),
    /// Record a bulk purchase of target currency.
    Intake(IntakeArgs),
    /// Show what a sale would pay out at the current rate.
    Quote(QuoteArgs),
    /// Finalize a sale.
    Sell(SellArgs),
    /// Show the remaining lots.
    Inventory,
    /// Show the owner's accumulated profit.
    Profit(ProfitArgs),
    /// List recent sales.
    Sales(SalesArgs),
    /// Show one sale and the lots it consumed.
    Sale(SaleArgs),
    /// Delete a sale. Consumed lots are not restored.
    DeleteSale(SaleArgs),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    Up,
    Down,
    Fresh,
    Status,
}

#[derive(Args, Debug)]
struct Rate {
    #[command(subcommand)]
    command: RateCommand,
}

#[derive(Subcommand, Debug)]
enum RateCommand {
    /// Record a new market rate.
    Set { value: Decimal },
    /// Show the current market rate and the rates derived from it.
    Show,
    History {
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
}

#[derive(Args, Debug)]
struct IntakeArgs {
    /// Source-currency amount spent.
    amount: Decimal,
    /// Rate applied, or `current` for the latest market rate.
    #[arg(value_parser = parse_intake_rate)]
    rate: IntakeRate,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Source-currency amount received from the customer.
    amount: Decimal,
}

#[derive(Args, Debug)]
struct SellArgs {
    /// Source-currency amount received from the customer.
    amount: Decimal,
    /// Target amount actually paid. Defaults to the suggested amount.
    #[arg(long)]
    paid: Option<Decimal>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Debug)]
struct ProfitArgs {
    /// Also send the summary to the notifier.
    #[arg(long)]
    notify: bool,
}

#[derive(Args, Debug)]
struct SalesArgs {
    #[arg(long, default_value_t = 20)]
    limit: u64,
}

#[derive(Args, Debug)]
struct SaleArgs {
    id: Uuid,
}

fn parse_intake_rate(raw: &str) -> Result<IntakeRate, String> {
    match raw {
        "current" | "CURRENT" => Ok(IntakeRate::Current),
        other => other
            .parse::<Decimal>()
            .map(IntakeRate::Fixed)
            .map_err(|err| format!("invalid rate {other}: {err}")),
    }
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn migrate(
    database_url: &str,
    command: MigrateCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    match command {
        MigrateCommand::Up => migration::Migrator::up(&db, None).await?,
        MigrateCommand::Down => migration::Migrator::down(&db, None).await?,
        MigrateCommand::Fresh => migration::Migrator::fresh(&db).await?,
        MigrateCommand::Status => migration::Migrator::status(&db).await?,
    }
    tracing::info!(?command, "migration done");
    Ok(())
}

async fn build_engine(
    settings: &Settings,
    db: DatabaseConnection,
) -> Result<Engine, Box<dyn Error + Send + Sync>> {
    let mut builder = Engine::builder()
        .database(db)
        .low_balance_threshold(settings.ledger.low_balance_threshold);
    if let Some(owner_id) = &settings.ledger.owner_id {
        builder = builder.owner_id(owner_id.clone());
    }
    Ok(builder.build().await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "cambio_admin={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let database_url = settings.database_url(cli.database_url);
    if let Command::Migrate(command) = cli.command {
        return migrate(&database_url, command).await;
    }

    let db = connect_db(&database_url).await?;
    let engine = build_engine(&settings, db).await?;
    let by = cli
        .by
        .or_else(|| settings.ledger.owner_id.clone())
        .unwrap_or_else(|| "admin".to_string());
    let src = &settings.ledger.source_currency;
    let dst = &settings.ledger.target_currency;

    match cli.command {
        Command::Migrate(_) => {}
        Command::Rate(Rate { command }) => match command {
            RateCommand::Set { value } => {
                let rate = engine.record_market_rate(value, &by, Utc::now()).await?;
                let derived = rate.derived()?;
                println!(
                    "market rate {} {dst}/{src} (owner {}, intermediary {})",
                    rate.value, derived.owner, derived.intermediary
                );
            }
            RateCommand::Show => match engine.latest_market_rate().await? {
                Some(rate) => {
                    let derived = rate.derived()?;
                    println!(
                        "market {} owner {} intermediary {} ({dst}/{src}, set by {} at {})",
                        derived.market,
                        derived.owner,
                        derived.intermediary,
                        rate.entered_by,
                        rate.recorded_at
                    );
                }
                None => println!("no market rate recorded yet"),
            },
            RateCommand::History { limit } => {
                for rate in engine.market_rate_history(limit).await? {
                    println!("{}\t{}\t{}", rate.recorded_at, rate.value, rate.entered_by);
                }
            }
        },
        Command::Intake(args) => {
            let mut cmd = RecordIntakeCmd::new(args.amount, args.rate, &by, Utc::now());
            if let Some(note) = args.note {
                cmd = cmd.note(note);
            }
            let intake = engine.record_intake(cmd).await?;
            println!(
                "intake #{}: {} {src} at {} -> {} {dst}",
                intake.id, intake.source_amount, intake.rate_applied, intake.target_received
            );
        }
        Command::Quote(args) => {
            let quote = engine.quote_sale(args.amount).await?;
            println!(
                "{} {src}: suggested {} {dst} at {}, at most {} {dst} at {}",
                quote.source_received,
                quote.suggested.round_dp(2),
                quote.rates.intermediary,
                quote.owner_share.round_dp(2),
                quote.rates.owner
            );
        }
        Command::Sell(args) => {
            let quote = engine.quote_sale(args.amount).await?;
            let mut cmd = match args.paid {
                Some(paid) => quote.into_finalize(paid, &by, Utc::now()),
                None => quote.accept(&by, Utc::now()),
            };
            if let Some(note) = args.note {
                cmd = cmd.note(note);
            }
            let receipt = engine.finalize_sale(cmd).await?;
            let tx = &receipt.transaction;
            println!(
                "sale {}: paid {} {dst} for {} {src}, owner profit {} {src}",
                tx.id,
                tx.actual_target_paid.round_dp(2),
                tx.source_received,
                tx.owner_profit.round_dp(2)
            );
            println!("remaining inventory {} {dst}", receipt.remaining.round_dp(2));
            if receipt.low_balance {
                println!(
                    "warning: inventory below {} {dst}",
                    engine.low_balance_threshold()
                );
            }
        }
        Command::Inventory => {
            let ledger = engine.inventory_ledger().await?;
            for lot in ledger.lots().iter().filter(|lot| !lot.is_depleted()) {
                println!(
                    "lot #{} (intake #{}): {} {dst} at {} {src}/{dst}",
                    lot.id,
                    lot.bulk_intake_id,
                    lot.remaining_quantity.round_dp(2),
                    lot.unit_cost.round_dp(6)
                );
            }
            let summary = engine.inventory_summary().await?;
            println!(
                "total {} {dst} in {} lots, cost {} {src}",
                summary.total_remaining.round_dp(2),
                summary.open_lots,
                summary.total_value.round_dp(2)
            );
            if let Some(rate) = summary.average_rate {
                println!("average rate {} {dst}/{src}", rate.round_dp(4));
            }
        }
        Command::Profit(args) => {
            let summary = if args.notify {
                engine.report_profit().await?
            } else {
                engine.profit_summary().await?
            };
            println!(
                "owner profit {} {src} over {} sales",
                summary.total_owner_profit.round_dp(2),
                summary.transactions
            );
        }
        Command::Sales(args) => {
            for tx in engine.sales_history(args.limit).await? {
                println!(
                    "{}\t{}\t{}\t{} {src}\t{} {dst}\t{} {src}",
                    tx.id,
                    tx.recorded_at,
                    tx.recorded_by,
                    tx.source_received,
                    tx.actual_target_paid.round_dp(2),
                    tx.owner_profit.round_dp(2)
                );
            }
        }
        Command::Sale(args) => {
            let tx = engine.sale(args.id).await?;
            println!(
                "sale {} by {} at {}: {} {src} -> {} {dst} (suggested {}, market {})",
                tx.id,
                tx.recorded_by,
                tx.recorded_at,
                tx.source_received,
                tx.actual_target_paid.round_dp(2),
                tx.suggested_target.round_dp(2),
                tx.market_rate_at_time
            );
            for usage in engine.sale_usages(args.id).await? {
                println!(
                    "  lot #{}: {} {dst}, cost {} {src}",
                    usage.lot_id,
                    usage.quantity_used.round_dp(2),
                    usage.cost()?.round_dp(2)
                );
            }
        }
        Command::DeleteSale(args) => {
            let tx = engine.delete_sale(args.id, &by).await?;
            println!(
                "deleted sale {} ({} {dst}), inventory was not restored",
                tx.id,
                tx.actual_target_paid.round_dp(2)
            );
        }
    }

    Ok(())
}
