use std::error::Error;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use vaultx_client::config::{ClientConfig, ConfigOverrides};
use vaultx_client::forms::{
    AccountDraft, CustomerDraft, DepositRequest, PaymentRow, PortfolioDraft, TradeOrder,
    TradeSide, TransactionDraft,
};
use vaultx_client::logging::{init_tracing, LogOptions};
use vaultx_client::models::{
    Account, Asset, Credentials, Customer, Deposit, Portfolio, Position, RegistrationForm, Trade,
    Transaction,
};
use vaultx_client::navigator::{GuardState, Route};
use vaultx_client::query::{DateRange, FilterTerm, TradeFilter};
use vaultx_client::resource::{Resource, ResourceList, Writable};
use vaultx_client::trading::{self, PaymentDesk, TradeStats};
use vaultx_client::{ClientContext, ClientError};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "vaultx-cli")]
#[command(about = "Command-line client for the VaultX banking backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (defaults to VAULTX_API_URL or http://localhost:8080/api)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Directory of the persisted session
    #[arg(long, global = true)]
    storage: Option<String>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// What happens when a signed-in user opens login/register: permissive | redirect
    #[arg(long, global = true)]
    public_route_policy: Option<String>,

    #[arg(long, global = true)]
    log_json: bool,

    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date_of_birth: Option<NaiveDate>,
    },
    Whoami,
    Dashboard,
    /// Balance of the first account of the signed-in user
    Balance,
    Customers {
        #[command(subcommand)]
        command: CustomerCommands,
    },
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },
    Transactions {
        #[command(subcommand)]
        command: TransactionCommands,
    },
    Trades {
        #[command(subcommand)]
        command: TradeCommands,
    },
    Buy(OrderArgs),
    Sell(OrderArgs),
    Deposit {
        #[arg(short, long)]
        amount: String,
        #[arg(short = 'm', long, default_value = "BANK_TRANSFER")]
        method: String,
    },
    Deposits {
        #[command(subcommand)]
        command: ListOnly,
    },
    Portfolios {
        #[command(subcommand)]
        command: PortfolioCommands,
    },
    Assets {
        #[command(subcommand)]
        command: ListOnly,
    },
    Payments {
        #[command(subcommand)]
        command: PaymentCommands,
    },
}

#[derive(Subcommand)]
enum ListOnly {
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[derive(Subcommand)]
enum CustomerCommands {
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    Create {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        date_of_birth: String,
    },
    /// Edit a customer; fields not given keep their stored value
    Update {
        #[arg(short, long)]
        id: i64,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        date_of_birth: Option<String>,
    },
    Delete {
        #[arg(short, long)]
        id: i64,
        /// Confirm the deletion; without it the request is cancelled
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    Create {
        #[arg(short = 'n', long)]
        account_number: String,
        #[arg(short = 't', long, default_value = "SAVINGS")]
        account_type: String,
        #[arg(short, long)]
        customer_id: String,
        #[arg(short, long, default_value = "0")]
        balance: String,
        #[arg(long, default_value = "")]
        interest_rate: String,
        #[arg(long, default_value = "ACTIVE")]
        status: String,
    },
    /// Edit an account; fields not given keep their stored value
    Update {
        #[arg(short, long)]
        id: i64,
        #[arg(short = 'n', long)]
        account_number: Option<String>,
        #[arg(short = 't', long)]
        account_type: Option<String>,
        #[arg(short, long)]
        customer_id: Option<String>,
        #[arg(short, long)]
        balance: Option<String>,
        #[arg(long)]
        interest_rate: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    Delete {
        #[arg(short, long)]
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TransactionCommands {
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    Create {
        #[arg(short = 't', long = "type")]
        transaction_type: String,
        #[arg(short, long)]
        amount: String,
        #[arg(long)]
        account_id: String,
        #[arg(long, default_value = "")]
        destination_account_id: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    Delete {
        #[arg(short, long)]
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TradeCommands {
    List {
        #[arg(short, long)]
        filter: Option<String>,
        /// ALL, BUY or SELL
        #[arg(short = 't', long = "type")]
        trade_type: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        /// all, 7days, 30days, 90days or 1year
        #[arg(short, long, default_value = "all")]
        range: DateRange,
    },
}

#[derive(clap::Args)]
struct OrderArgs {
    #[arg(short, long)]
    asset_id: String,
    #[arg(short, long)]
    quantity: String,
    #[arg(short = 'p', long)]
    price: String,
    #[arg(long)]
    portfolio_id: String,
}

#[derive(Subcommand)]
enum PortfolioCommands {
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    Create {
        #[arg(short, long)]
        name: String,
    },
    Delete {
        #[arg(short, long)]
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    Positions {
        #[arg(short, long)]
        id: i64,
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Revalue a portfolio at current prices
    Refresh {
        #[arg(short, long)]
        id: i64,
    },
}

#[derive(Subcommand)]
enum PaymentCommands {
    Submit {
        /// FROM:TO:AMOUNT, repeatable
        #[arg(long = "payment", value_parser = parse_payment_row)]
        payments: Vec<PaymentRow>,
        /// Extra generated payments for the backend to process
        #[arg(short, long, default_value_t = 0)]
        count: usize,
    },
    Metrics,
    Reset,
}

fn parse_payment_row(raw: &str) -> Result<PaymentRow, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [from, to, amount] => Ok(PaymentRow {
            from_account_id: from.to_string(),
            to_account_id: to.to_string(),
            amount: amount.to_string(),
        }),
        _ => Err(format!("expected FROM:TO:AMOUNT, got '{raw}'")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The flag value when given, otherwise the value loaded from the backend.
fn or_current(given: Option<String>, current: Option<String>) -> String {
    given.or(current).unwrap_or_default()
}

fn or_current_number<N: ToString>(given: Option<String>, current: Option<N>) -> String {
    or_current(given, current.map(|n| n.to_string()))
}

/// Loads the record behind an edit form.
async fn edit_target<R: Writable>(items: &ResourceList<R>, id: i64) -> Result<R, Box<dyn Error>> {
    items
        .fetch(id)
        .await?
        .ok_or_else(|| format!("no {} with id {id}", R::ENTITY).into())
}

/// Runs the navigation guard for `route`; a denied mount stops the command.
fn enter(ctx: &ClientContext, route: Route) -> CliResult {
    match ctx.navigator().navigate(route) {
        GuardState::Granted { .. } => Ok(()),
        GuardState::Denied {
            redirect: Route::Login,
        } => Err(ClientError::NotSignedIn.into()),
        GuardState::Denied { redirect } => {
            Err(format!("already signed in, continue at {redirect}").into())
        }
    }
}

async fn list<R: Resource + Serialize>(
    ctx: &ClientContext,
    route: Route,
    filter: Option<String>,
) -> CliResult {
    enter(ctx, route)?;
    let items = ResourceList::<R>::new(ctx.clone());
    items.load().await?;
    if let Some(term) = filter {
        items.set_filter(&term);
    }
    print_json(&items.filtered())
}

/// Stages the deletion, then confirms or cancels it according to `confirmed`.
async fn delete<R: Resource>(ctx: &ClientContext, route: Route, id: i64, confirmed: bool) -> CliResult {
    enter(ctx, route)?;
    let items = ResourceList::<R>::new(ctx.clone());
    items.load().await?;
    let target = items
        .find(id)
        .ok_or_else(|| format!("no {} with id {id}", R::ENTITY))?;
    items.request_delete(target)?;
    if confirmed {
        items.confirm_delete().await?;
    } else {
        items.cancel_delete();
        println!("Deletion of {} {id} cancelled (pass --yes to confirm)", R::ENTITY);
    }
    Ok(())
}

async fn run_command(ctx: &ClientContext, command: Commands) -> CliResult {
    match command {
        Commands::Login { email, password } => {
            enter(ctx, Route::Login)?;
            let session = ctx
                .session()
                .sign_in(&Credentials { email, password })
                .await?;
            ctx.navigator().navigate(Route::Dashboard);
            println!("Logged in as {}", session.profile.display_name());
        }
        Commands::Logout => {
            ctx.session().sign_out()?;
            ctx.navigator().redirect_to_login();
            println!("Logged out.");
        }
        Commands::Register {
            first_name,
            last_name,
            email,
            password,
            confirm_password,
            address,
            phone,
            date_of_birth,
        } => {
            enter(ctx, Route::Register)?;
            let form = RegistrationForm {
                first_name,
                last_name,
                email,
                password,
                confirm_password,
                address,
                phone,
                date_of_birth,
            };
            let message = ctx
                .session()
                .register_on(form, Local::now().date_naive())
                .await?;
            println!("{message}");
        }
        Commands::Whoami => match ctx.session().try_current_session()? {
            Some(session) => {
                println!("{}", session.profile.display_name());
                if let Some(id) = &session.user_id {
                    println!("user id: {id}");
                }
                print_json(&session.profile)?;
            }
            None => println!("Not signed in."),
        },
        Commands::Dashboard => {
            enter(ctx, Route::Dashboard)?;
            print_json(&trading::dashboard_stats(ctx).await?)?;
        }
        Commands::Balance => {
            enter(ctx, Route::Dashboard)?;
            match trading::available_balance(ctx).await? {
                Some(balance) => println!("Available balance: {balance:.2}"),
                None => println!("No accounts found."),
            }
        }
        Commands::Customers { command } => match command {
            CustomerCommands::List { filter } => {
                list::<Customer>(ctx, Route::Customers, filter).await?
            }
            CustomerCommands::Create {
                first_name,
                last_name,
                email,
                phone,
                address,
                date_of_birth,
            } => {
                enter(ctx, Route::CustomerNew)?;
                let draft = CustomerDraft::parse(
                    &first_name,
                    &last_name,
                    &email,
                    &phone,
                    &address,
                    &date_of_birth,
                )?;
                ResourceList::<Customer>::new(ctx.clone())
                    .create(&draft)
                    .await?;
            }
            CustomerCommands::Update {
                id,
                first_name,
                last_name,
                email,
                phone,
                address,
                date_of_birth,
            } => {
                enter(ctx, Route::CustomerEdit(id))?;
                let customers = ResourceList::<Customer>::new(ctx.clone());
                let current = edit_target(&customers, id).await?;
                let draft = CustomerDraft::parse(
                    &or_current(first_name, current.first_name),
                    &or_current(last_name, current.last_name),
                    &or_current(email, current.email),
                    &or_current(phone, current.phone),
                    &or_current(address, current.address),
                    &or_current(date_of_birth, current.date_of_birth),
                )?;
                customers.update(id, &draft).await?;
            }
            CustomerCommands::Delete { id, yes } => {
                delete::<Customer>(ctx, Route::Customers, id, yes).await?
            }
        },
        Commands::Accounts { command } => match command {
            AccountCommands::List { filter } => list::<Account>(ctx, Route::Accounts, filter).await?,
            AccountCommands::Create {
                account_number,
                account_type,
                customer_id,
                balance,
                interest_rate,
                status,
            } => {
                enter(ctx, Route::AccountNew)?;
                let draft = AccountDraft::parse(
                    &account_number,
                    &account_type,
                    &customer_id,
                    &balance,
                    &interest_rate,
                    &status,
                )?;
                ResourceList::<Account>::new(ctx.clone())
                    .create(&draft)
                    .await?;
            }
            AccountCommands::Update {
                id,
                account_number,
                account_type,
                customer_id,
                balance,
                interest_rate,
                status,
            } => {
                enter(ctx, Route::AccountEdit(id))?;
                let accounts = ResourceList::<Account>::new(ctx.clone());
                let current = edit_target(&accounts, id).await?;
                let draft = AccountDraft::parse(
                    &or_current(account_number, current.account_number),
                    &or_current(account_type, current.account_type),
                    &or_current_number(customer_id, current.customer_id),
                    &or_current_number(balance, current.balance),
                    &or_current_number(interest_rate, current.interest_rate),
                    &or_current(status, current.status),
                )?;
                accounts.update(id, &draft).await?;
            }
            AccountCommands::Delete { id, yes } => {
                delete::<Account>(ctx, Route::Accounts, id, yes).await?
            }
        },
        Commands::Transactions { command } => match command {
            TransactionCommands::List { filter } => {
                list::<Transaction>(ctx, Route::Transactions, filter).await?
            }
            TransactionCommands::Create {
                transaction_type,
                amount,
                account_id,
                destination_account_id,
                description,
            } => {
                enter(ctx, Route::TransactionNew)?;
                let draft = TransactionDraft::parse(
                    &transaction_type,
                    &amount,
                    &account_id,
                    &destination_account_id,
                    &description,
                )?;
                ResourceList::<Transaction>::new(ctx.clone())
                    .create(&draft)
                    .await?;
            }
            TransactionCommands::Delete { id, yes } => {
                delete::<Transaction>(ctx, Route::Transactions, id, yes).await?
            }
        },
        Commands::Trades {
            command:
                TradeCommands::List {
                    filter,
                    trade_type,
                    status,
                    range,
                },
        } => {
            enter(ctx, Route::TradeHistory)?;
            let trades = ResourceList::<Trade>::new(ctx.clone());
            trades.load().await?;
            let all = trades.items();
            let trade_filter = TradeFilter {
                trade_type,
                status,
                range,
                text: FilterTerm::new(filter.as_deref().unwrap_or_default()),
            };
            print_json(&trade_filter.apply(&all, Local::now().naive_local()))?;
            let stats = TradeStats::from_trades(&all);
            println!(
                "{} trades ({} buys, {} sells), commission {:.2}, profit {:.2}",
                stats.total, stats.buys, stats.sells, stats.total_commission, stats.profit
            );
        }
        Commands::Buy(args) => place_order(ctx, TradeSide::Buy, args).await?,
        Commands::Sell(args) => place_order(ctx, TradeSide::Sell, args).await?,
        Commands::Deposit { amount, method } => {
            enter(ctx, Route::Funding)?;
            let request = DepositRequest::parse(&amount, &method)?;
            let deposits = ResourceList::<Deposit>::new(ctx.clone());
            trading::process_deposit(&deposits, &request).await?;
            println!(
                "Total deposited: {:.2}",
                trading::total_deposited(&deposits.items())
            );
        }
        Commands::Deposits {
            command: ListOnly::List { filter },
        } => {
            enter(ctx, Route::Funding)?;
            let deposits = ResourceList::<Deposit>::new(ctx.clone());
            deposits.load().await?;
            if let Some(term) = filter {
                deposits.set_filter(&term);
            }
            print_json(&deposits.filtered())?;
            println!(
                "Total deposited: {:.2}",
                trading::total_deposited(&deposits.items())
            );
        }
        Commands::Portfolios { command } => match command {
            PortfolioCommands::List { filter } => {
                list::<Portfolio>(ctx, Route::Portfolio, filter).await?
            }
            PortfolioCommands::Create { name } => {
                enter(ctx, Route::Portfolio)?;
                let draft = PortfolioDraft::parse(&name)?;
                let portfolios = ResourceList::<Portfolio>::new(ctx.clone());
                trading::create_portfolio(&portfolios, &draft).await?;
            }
            PortfolioCommands::Delete { id, yes } => {
                delete::<Portfolio>(ctx, Route::Portfolio, id, yes).await?
            }
            PortfolioCommands::Positions { id, filter } => {
                enter(ctx, Route::Portfolio)?;
                let positions = ResourceList::<Position>::for_parent(ctx.clone(), id);
                positions.load().await?;
                if let Some(term) = filter {
                    positions.set_filter(&term);
                }
                print_json(&positions.filtered())?;
            }
            PortfolioCommands::Refresh { id } => {
                enter(ctx, Route::Portfolio)?;
                let stats = trading::refresh_portfolio_values(ctx, id).await?;
                println!(
                    "Value {:.2}, cost basis {:.2}, gain {:.2} ({:.2}%)",
                    stats.total_value,
                    stats.cost_basis,
                    stats.unrealized_gain,
                    stats.unrealized_gain_percent
                );
            }
        },
        Commands::Assets {
            command: ListOnly::List { filter },
        } => list::<Asset>(ctx, Route::Trading, filter).await?,
        Commands::Payments { command } => {
            enter(ctx, Route::Payments)?;
            let desk = PaymentDesk::new(ctx.clone());
            match command {
                PaymentCommands::Submit { payments, count } => {
                    print_json(&desk.submit_batch(&payments, count).await?)?
                }
                PaymentCommands::Metrics => print_json(&desk.metrics().await?)?,
                PaymentCommands::Reset => desk.reset_metrics().await?,
            }
        }
    }
    Ok(())
}

async fn place_order(ctx: &ClientContext, side: TradeSide, args: OrderArgs) -> CliResult {
    enter(ctx, Route::Trading)?;
    let order = TradeOrder::parse(
        side,
        &args.asset_id,
        &args.quantity,
        &args.price,
        &args.portfolio_id,
    )?;
    let trades = ResourceList::<Trade>::new(ctx.clone());
    match trading::execute_trade(&trades, &order).await? {
        Some(id) => println!("Order ID: {id}"),
        None => println!("Order placed."),
    }
    Ok(())
}

async fn run(cli: Cli) -> CliResult {
    let config = ClientConfig::from_env(ConfigOverrides {
        api_base_url: cli.url,
        storage_path: cli.storage,
        timeout_secs: cli.timeout_secs,
        policy: cli.public_route_policy,
    })?;
    let ctx = ClientContext::open(&config)?;

    let result = run_command(&ctx, cli.command).await;
    for notice in ctx.notices().drain() {
        eprintln!("{notice}");
    }
    result
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(&LogOptions {
        json: cli.log_json,
        file: cli.log_file.clone(),
        default_filter: Some("warn".to_string()),
    })?;
    run(cli).await
}
