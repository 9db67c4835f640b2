use std::{collections::HashMap, fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use retail_ledger::{
    auth::{BranchScope, Permission, Principal, Role},
    config,
    entities::StockLocation,
    errors::ServiceError,
    events::process_events,
    services::{
        accounts::SupplierInvoiceRequest,
        allocation::{CountAdjustment, ReceiveLotRequest, TransferRequest},
        ingestion::{ImportDecision, ImportRow, InvoiceConfirmation},
        reports::BasketThresholds,
        settlement::SettleSaleRequest,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "retail-cli", about = "Branch stock, sales and forecasting operations", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, value_enum, default_value_t = RoleArg::Admin)]
    role: RoleArg,
    #[arg(long, global = true, help = "Branch to act on; required for operators")]
    branch: Option<Uuid>,
    #[arg(long, global = true, default_value = "cli")]
    user: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Operator,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Forecast(ForecastCommands),
    #[command(subcommand)]
    Risk(RiskCommands),
    #[command(subcommand)]
    Stock(StockCommands),
    #[command(subcommand)]
    Sale(SaleCommands),
    #[command(subcommand)]
    Accounts(AccountCommands),
    #[command(subcommand)]
    Ingest(IngestCommands),
    #[command(subcommand)]
    Reports(ReportCommands),
}

#[derive(Args)]
struct DateArg {
    #[arg(long, help = "Run date (YYYY-MM-DD); defaults to today")]
    date: Option<NaiveDate>,
}

impl DateArg {
    fn today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Args)]
struct FileArg {
    #[arg(long, help = "JSON input file")]
    file: String,
}

#[derive(Subcommand)]
enum ForecastCommands {
    /// Regenerate forecasts for every product/branch pair with sales
    Run(DateArg),
    Show {
        #[arg(long)]
        product: Option<Uuid>,
        #[command(flatten)]
        date: DateArg,
    },
}

#[derive(Subcommand)]
enum RiskCommands {
    Report(DateArg),
}

#[derive(Subcommand)]
enum StockCommands {
    Receive {
        #[arg(long)]
        product: Uuid,
        #[arg(long)]
        quantity: i32,
        #[arg(long)]
        expires: Option<NaiveDate>,
        #[arg(long, default_value = "backroom")]
        location: String,
    },
    Transfer {
        #[arg(long)]
        lot: Uuid,
        #[arg(long)]
        quantity: i32,
        #[arg(long, default_value = "shelf")]
        to: String,
    },
    /// Apply an inventory count difference (positive surplus, negative shortage)
    Adjust {
        #[arg(long)]
        product: Uuid,
        #[arg(long, allow_hyphen_values = true)]
        difference: i32,
    },
    /// Compare a count file ({"<product id>": counted}) with the system
    Count {
        #[arg(long)]
        file: String,
        #[arg(long, action = ArgAction::SetTrue, help = "Apply the differences")]
        apply: bool,
    },
    Lots {
        #[arg(long)]
        product: Uuid,
    },
}

#[derive(Subcommand)]
enum SaleCommands {
    Settle(FileArg),
}

#[derive(Subcommand)]
enum AccountCommands {
    CustomerPayment {
        #[arg(long)]
        customer: Uuid,
        #[arg(long)]
        amount: Decimal,
    },
    SupplierInvoice(FileArg),
    SupplierPayment {
        #[arg(long)]
        supplier: Uuid,
        #[arg(long)]
        amount: Decimal,
    },
}

#[derive(Subcommand)]
enum IngestCommands {
    /// Classify normalized import rows without writing
    Classify(FileArg),
    /// Load import rows, accepting every suggestion
    Apply(FileArg),
    /// Load reviewed decisions
    Decisions(FileArg),
    /// Confirm a supplier invoice
    Invoice(FileArg),
}

#[derive(Subcommand)]
enum ReportCommands {
    Purchases(DateArg),
    Shift,
    CloseShift {
        #[arg(long)]
        declared: Decimal,
    },
    DailySales {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[command(flatten)]
        date: DateArg,
    },
    Expiry(DateArg),
    /// Income, collections and payments between two dates
    Income {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Products frequently bought together
    Basket {
        #[arg(long, default_value_t = 0.01)]
        min_support: f64,
        #[arg(long, default_value_t = 0.1)]
        min_confidence: f64,
        #[arg(long, default_value_t = 1.1)]
        min_lift: f64,
    },
}

struct CliContext {
    state: AppState,
    principal: Principal,
    branch: Option<Uuid>,
    json: bool,
}

impl CliContext {
    async fn initialize(cli: &Cli) -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let (state, rx) = AppState::connect(config)
            .await
            .context("failed to connect to database")?;
        tokio::spawn(process_events(rx));

        let principal = Principal {
            user: cli.user.clone(),
            role: match cli.role {
                RoleArg::Admin => Role::GlobalAdmin,
                RoleArg::Operator => Role::BranchOperator {
                    branch_id: cli.branch,
                },
            },
        };

        Ok(Self {
            state,
            principal,
            branch: cli.branch,
            json: cli.json,
        })
    }

    fn scope(&self, permission: Permission) -> Result<BranchScope, ServiceError> {
        self.state
            .authorizer
            .authorize(&self.principal, permission, self.branch)
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let raw = fs::read_to_string(Path::new(path)).with_context(|| format!("failed to read {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path))
}

fn parse_location(raw: &str) -> Result<StockLocation, ServiceError> {
    StockLocation::from_str(raw)
        .map_err(|_| ServiceError::InvalidInput(format!("unknown location '{}'", raw)))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let result = match CliContext::initialize(&cli).await {
        Ok(context) => run(&context, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(error) = result {
        match error.downcast_ref::<ServiceError>() {
            Some(service_error) if json => {
                let body = json!({
                    "error": service_error.error_code(),
                    "message": service_error.response_message(),
                });
                eprintln!("{}", body);
            }
            _ => eprintln!("error: {:#}", error),
        }
        std::process::exit(1);
    }
}

async fn run(ctx: &CliContext, command: Commands) -> Result<()> {
    match command {
        Commands::Forecast(c) => handle_forecast(ctx, c).await,
        Commands::Risk(c) => handle_risk(ctx, c).await,
        Commands::Stock(c) => handle_stock(ctx, c).await,
        Commands::Sale(c) => handle_sale(ctx, c).await,
        Commands::Accounts(c) => handle_accounts(ctx, c).await,
        Commands::Ingest(c) => handle_ingest(ctx, c).await,
        Commands::Reports(c) => handle_reports(ctx, c).await,
    }
}

async fn handle_forecast(ctx: &CliContext, command: ForecastCommands) -> Result<()> {
    let pipeline = &ctx.state.services.forecast;
    match command {
        ForecastCommands::Run(date) => {
            ctx.scope(Permission::ForecastRun)?;
            let summary = pipeline.run(date.today()).await?;
            ctx.emit(&summary, |s| {
                println!(
                    "Forecast run: {} pairs, {} forecasted, {} skipped, {} failed",
                    s.pairs_seen,
                    s.pairs_forecasted,
                    s.pairs_skipped,
                    s.failures.len()
                );
                for f in &s.failures {
                    println!("  ! product {} branch {}: {}", f.product_id, f.branch_id, f.reason);
                }
            })
        }
        ForecastCommands::Show { product, date } => {
            let scope = ctx.scope(Permission::ReportsRead)?;
            let points = pipeline.forecasts_for(scope, product, date.today()).await?;
            ctx.emit(&points, |points| {
                for p in points {
                    println!(
                        "- {} • product {} • branch {} • {}",
                        p.forecast_date, p.product_id, p.branch_id, p.predicted_quantity
                    );
                }
            })
        }
    }
}

async fn handle_risk(ctx: &CliContext, command: RiskCommands) -> Result<()> {
    match command {
        RiskCommands::Report(date) => {
            let scope = ctx.scope(Permission::InventoryRead)?;
            let entries = ctx.state.services.risk.evaluate(scope, date.today()).await?;
            ctx.emit(&entries, |entries| {
                for e in entries {
                    let flag = if e.at_risk { "AT RISK" } else { "ok" };
                    println!(
                        "- {} • stock {} • expires {} • {:.2}/day • {}",
                        e.name,
                        e.total_stock,
                        e.nearest_expiration
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "-".into()),
                        e.velocity,
                        flag
                    );
                }
            })
        }
    }
}

async fn handle_stock(ctx: &CliContext, command: StockCommands) -> Result<()> {
    let allocation = &ctx.state.services.allocation;
    match command {
        StockCommands::Receive {
            product,
            quantity,
            expires,
            location,
        } => {
            let scope = ctx.scope(Permission::InventoryIngest)?;
            let lot = allocation
                .receive_lot(
                    scope,
                    ReceiveLotRequest {
                        product_id: product,
                        quantity,
                        expiration_date: expires,
                        location: parse_location(&location)?,
                    },
                )
                .await?;
            ctx.emit(&lot, |lot| println!("Lot {} received ({} units)", lot.id, lot.quantity))
        }
        StockCommands::Transfer { lot, quantity, to } => {
            let scope = ctx.scope(Permission::InventoryTransfer)?;
            let outcome = allocation
                .transfer(
                    scope,
                    TransferRequest {
                        lot_id: lot,
                        quantity,
                        destination: parse_location(&to)?,
                    },
                )
                .await?;
            ctx.emit(&outcome, |o| {
                println!(
                    "Moved {} units to {} lot {}",
                    o.quantity, o.destination_location, o.destination.lot_id
                )
            })
        }
        StockCommands::Adjust {
            product,
            difference,
        } => {
            let scope = ctx.scope(Permission::InventoryAdjust)?;
            let outcomes = allocation
                .apply_count_adjustments(
                    scope,
                    vec![CountAdjustment {
                        product_id: product,
                        difference,
                    }],
                )
                .await?;
            ctx.emit(&outcomes, |o| println!("{} adjustment(s) applied", o.len()))
        }
        StockCommands::Count { file, apply } => {
            let counted: HashMap<Uuid, i64> = read_json(&file)?;
            let scope = ctx.scope(if apply {
                Permission::InventoryAdjust
            } else {
                Permission::InventoryRead
            })?;
            let found = ctx
                .state
                .services
                .reports
                .count_discrepancies(scope, counted)
                .await?;
            if apply {
                let adjustments = found
                    .iter()
                    .map(|d| {
                        i32::try_from(d.difference)
                            .map(|difference| CountAdjustment {
                                product_id: d.product_id,
                                difference,
                            })
                            .map_err(|_| {
                                ServiceError::InvalidQuantity(format!(
                                    "difference {} out of range",
                                    d.difference
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if !adjustments.is_empty() {
                    allocation.apply_count_adjustments(scope, adjustments).await?;
                }
            }
            ctx.emit(&found, |found| {
                for d in found {
                    println!(
                        "- {} • system {} • counted {} • {:+}",
                        d.product_name, d.system, d.counted, d.difference
                    );
                }
            })
        }
        StockCommands::Lots { product } => {
            let scope = ctx.scope(Permission::InventoryRead)?;
            let lots = allocation.lots_for_product(product, scope).await?;
            ctx.emit(&lots, |lots| {
                for lot in lots {
                    println!(
                        "- {} • {} • {} units • expires {}",
                        lot.id,
                        lot.location,
                        lot.quantity,
                        lot.expiration_date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "-".into())
                    );
                }
            })
        }
    }
}

async fn handle_sale(ctx: &CliContext, command: SaleCommands) -> Result<()> {
    match command {
        SaleCommands::Settle(args) => {
            let request: SettleSaleRequest = read_json(&args.file)?;
            let scope = ctx.scope(Permission::SalesCreate)?;
            let settled = ctx
                .state
                .services
                .settlement
                .settle(scope, request, &ctx.state.config.pricing)
                .await?;
            ctx.emit(&settled, |s| {
                println!(
                    "Sale {} • {} • subtotal {} • adjustment {} • total {}",
                    s.sale.id, s.sale.payment_method, s.sale.subtotal, s.sale.adjustment, s.sale.total
                )
            })
        }
    }
}

async fn handle_accounts(ctx: &CliContext, command: AccountCommands) -> Result<()> {
    let accounts = &ctx.state.services.accounts;
    match command {
        AccountCommands::CustomerPayment { customer, amount } => {
            let scope = ctx.scope(Permission::CustomerPayments)?;
            let payment = accounts
                .record_customer_payment(scope, customer, amount, Utc::now())
                .await?;
            ctx.emit(&payment, |p| println!("Payment {} recorded ({})", p.id, p.amount))
        }
        AccountCommands::SupplierInvoice(args) => {
            let request: SupplierInvoiceRequest = read_json(&args.file)?;
            let scope = ctx.scope(Permission::SupplierInvoices)?;
            let invoice = accounts.register_supplier_invoice(scope, request).await?;
            ctx.emit(&invoice, |i| println!("Invoice {} registered ({})", i.id, i.amount))
        }
        AccountCommands::SupplierPayment { supplier, amount } => {
            let scope = ctx.scope(Permission::SupplierPayments)?;
            let payment = accounts
                .record_supplier_payment(scope, supplier, amount, Utc::now())
                .await?;
            ctx.emit(&payment, |p| println!("Payment {} recorded ({})", p.id, p.amount))
        }
    }
}

async fn handle_ingest(ctx: &CliContext, command: IngestCommands) -> Result<()> {
    let ingestion = &ctx.state.services.ingestion;
    match command {
        IngestCommands::Classify(args) => {
            let rows: Vec<ImportRow> = read_json(&args.file)?;
            ctx.scope(Permission::InventoryIngest)?;
            let classification = ingestion.classify(rows).await?;
            ctx.emit(&classification, |c| {
                println!(
                    "{} restock, {} new, {} rejected",
                    c.restock.len(),
                    c.new_products.len(),
                    c.rejected.len()
                );
                for r in &c.rejected {
                    println!("  ! row {}: {}", r.index + 1, r.reason);
                }
            })
        }
        IngestCommands::Apply(args) => {
            let rows: Vec<ImportRow> = read_json(&args.file)?;
            let scope = ctx.scope(Permission::InventoryIngest)?;
            let decisions = ingestion.classify(rows).await?.into_decisions();
            let summary = ingestion.apply_import(scope, decisions).await?;
            ctx.emit(&summary, print_import_summary)
        }
        IngestCommands::Decisions(args) => {
            let decisions: Vec<ImportDecision> = read_json(&args.file)?;
            let scope = ctx.scope(Permission::InventoryIngest)?;
            let summary = ingestion.apply_import(scope, decisions).await?;
            ctx.emit(&summary, print_import_summary)
        }
        IngestCommands::Invoice(args) => {
            let confirmation: InvoiceConfirmation = read_json(&args.file)?;
            let scope = ctx.scope(Permission::InventoryIngest)?;
            let loaded = ingestion.confirm_invoice(scope, confirmation).await?;
            ctx.emit(&json!({ "lots_loaded": loaded }), |_| {
                println!("{} lot(s) loaded", loaded)
            })
        }
    }
}

fn print_import_summary(s: &retail_ledger::services::ingestion::ImportSummary) {
    println!(
        "{} lot(s) loaded, {} product(s) created, {} supplier(s) created",
        s.lots_loaded, s.products_created, s.suppliers_created
    );
}

async fn handle_reports(ctx: &CliContext, command: ReportCommands) -> Result<()> {
    let reports = &ctx.state.services.reports;
    match command {
        ReportCommands::Purchases(date) => {
            let scope = ctx.scope(Permission::ReportsRead)?;
            let groups = reports.purchase_suggestions(scope, date.today()).await?;
            ctx.emit(&groups, |groups| {
                for g in groups {
                    println!("{}", g.supplier_name);
                    for item in &g.items {
                        println!(
                            "  - {} • stock {} / min {} • order {}",
                            item.product_name, item.stock, item.stock_minimo, item.suggested_quantity
                        );
                    }
                }
            })
        }
        ReportCommands::Shift => {
            let scope = ctx.scope(Permission::ReportsRead)?;
            let summary = reports.shift_summary(scope, Utc::now()).await?;
            ctx.emit(&summary, |s| {
                println!(
                    "cash {} • card {} • qr {} • collections {} • supplier payments {} • expected cash {}",
                    s.cash_sales,
                    s.card_sales,
                    s.qr_sales,
                    s.customer_collections,
                    s.supplier_payments,
                    s.expected_cash
                )
            })
        }
        ReportCommands::CloseShift { declared } => {
            let scope = ctx.scope(Permission::ShiftsClose)?;
            let closed = reports
                .close_shift(scope, &ctx.principal.user, declared, Utc::now())
                .await?;
            ctx.emit(&closed, |c| {
                println!(
                    "Shift closed • expected {} • declared {} • difference {}",
                    c.expected_cash, c.declared_cash, c.cash_difference
                )
            })
        }
        ReportCommands::DailySales { days, date } => {
            let scope = ctx.scope(Permission::ReportsRead)?;
            let series = reports.daily_sales(scope, date.today(), days).await?;
            ctx.emit(&series, |series| {
                for d in series {
                    println!("{} {}", d.date, d.total);
                }
            })
        }
        ReportCommands::Expiry(date) => {
            let scope = ctx.scope(Permission::InventoryRead)?;
            let alerts = reports.expiry_alerts(scope, date.today()).await?;
            ctx.emit(&alerts, |alerts| {
                for a in alerts {
                    println!(
                        "- {} • {} units • expires {} ({} days)",
                        a.product_name, a.quantity, a.expiration_date, a.days_left
                    );
                }
            })
        }
        ReportCommands::Income { from, to } => {
            let scope = ctx.scope(Permission::ReportsRead)?;
            let report = reports.period_report(scope, from, to).await?;
            ctx.emit(&report, |r| {
                println!("{} to {}", r.from, r.to);
                for m in &r.income_by_method {
                    println!("  {} {}", m.payment_method, m.total);
                }
                println!(
                    "running account {} • collections {} • supplier payments {}",
                    r.running_account_sales, r.customer_collections, r.supplier_payments
                );
                println!(
                    "customers owe {} • owed to suppliers {}",
                    r.customer_balances, r.supplier_balances
                );
            })
        }
        ReportCommands::Basket {
            min_support,
            min_confidence,
            min_lift,
        } => {
            let scope = ctx.scope(Permission::ReportsRead)?;
            let thresholds = BasketThresholds {
                min_support,
                min_confidence,
                min_lift,
            };
            let rules = reports.basket_analysis(scope, thresholds).await?;
            ctx.emit(&rules, |rules| {
                for r in rules {
                    println!(
                        "{} -> {} • confidence {}% • support {}% • lift {}",
                        r.antecedent, r.consequent, r.confidence_pct, r.support_pct, r.lift
                    );
                }
            })
        }
    }
}
