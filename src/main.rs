use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod config;
mod error;
mod ui;
mod version;

mod auth;
mod client;
mod contacts;
mod guard;
mod jwt;
mod notifications;
mod parking;
mod payments;
mod session;
mod store;
mod subscriptions;

#[cfg(test)]
mod tests;

use cli::CliHandler;
use version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "parq",
    about = "Smart-parking client: find spots, book them, pay from the terminal",
    long_about = "parq - Smart-parking client

OVERVIEW:
  Browse parking spots, book reservations, manage payment methods and your
  wallet, and control the spot blocker, all against the parq backend.

WORKFLOW:
  1. Sign in (or register) once; the session is kept fresh automatically
  2. Find a free spot and a free hour window
  3. Reserve, pay, and raise the blocker when you arrive

QUICK START:
  parq login                            # Sign in with username/password
  parq parking spots --free             # Free spots right now
  parq parking windows A-01             # Free hour windows for a spot today
  parq parking reserve A-01 2025-06-01T10:00 2025-06-01T12:00
  parq payments pay 123 --wallet        # Pay a reservation from the wallet
  parq status                           # Session and server status",
    version = CURRENT_VERSION,
    author = "parq team",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with username and password
    Login(LoginArgs),

    /// Create an account and sign in
    Register(RegisterArgs),

    /// Sign out and forget stored credentials
    Logout,

    /// Show session and server status
    #[command(aliases = &["st"])]
    Status,

    /// Show or update the profile
    Profile(ProfileArgs),

    /// Spots, availability, reservations and blocker control
    #[command(aliases = &["p"])]
    Parking(ParkingArgs),

    /// Payment methods, wallet and payments
    Payments(PaymentsArgs),

    /// Subscription plans and tariffs
    Subs(SubsArgs),

    /// Tariff zones and pricing rules
    Tariffs(TariffsArgs),

    /// Send a message to support
    Contact(ContactArgs),

    /// Push-notification subscription
    Notify(NotifyArgs),

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    pub username: String,

    /// Read the password from this argument instead of prompting
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub username: String,

    #[arg(short, long)]
    pub email: String,

    #[arg(long, default_value = "")]
    pub car_number: String,

    #[arg(long, default_value = "")]
    pub car_model: String,

    /// Read the password from this argument instead of prompting
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Show the current profile
    Show,
    /// Update profile fields, optionally with a new avatar image
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        car_number: Option<String>,
        #[arg(long)]
        car_model: Option<String>,
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct ParkingArgs {
    #[command(subcommand)]
    pub command: ParkingCommand,
}

#[derive(Subcommand)]
pub enum ParkingCommand {
    /// List parking spots
    Spots {
        /// Only show free spots
        #[arg(long)]
        free: bool,
    },
    /// Show free hour windows for a spot
    Windows {
        spot: String,
        /// Date to query (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Reserve a spot for a time range (YYYY-MM-DDTHH:MM)
    Reserve {
        spot: String,
        start: String,
        end: String,
    },
    /// List your reservations
    #[command(aliases = &["ls"])]
    List {
        /// Filter by status (active, pending, cancelled)
        #[arg(long)]
        status: Option<String>,
    },
    /// Cancel a reservation
    Cancel { id: i64 },
    /// Raise or lower the spot blocker
    Blocker {
        #[command(subcommand)]
        command: BlockerCommand,
    },
}

#[derive(Subcommand)]
pub enum BlockerCommand {
    Raise { spot: String },
    Lower { spot: String },
}

#[derive(Args)]
pub struct PaymentsArgs {
    #[command(subcommand)]
    pub command: PaymentsCommand,
}

#[derive(Subcommand)]
pub enum PaymentsCommand {
    /// Manage stored payment methods
    Methods {
        #[command(subcommand)]
        command: MethodsCommand,
    },
    /// Wallet balance and deposits
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },
    /// Pay for a reservation
    Pay {
        reservation: i64,
        #[arg(long)]
        amount: f64,
        /// Pay with a stored card instead of the wallet
        #[arg(long, conflicts_with = "wallet")]
        method: Option<i64>,
        /// Pay from the wallet balance
        #[arg(long)]
        wallet: bool,
    },
    /// Payment history
    Transactions,
}

#[derive(Subcommand)]
pub enum MethodsCommand {
    List,
    Add {
        /// credit_card or debit_card
        #[arg(long, default_value = "credit_card")]
        kind: String,
        #[arg(long)]
        card_number: String,
        /// MM/YY
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        name: String,
        /// Read the CVV from this argument instead of prompting
        #[arg(long)]
        cvv: Option<String>,
        #[arg(long)]
        default: bool,
    },
    Remove {
        id: i64,
    },
    SetDefault {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum WalletCommand {
    Info,
    Deposit {
        amount: f64,
        #[arg(long)]
        method: i64,
    },
}

#[derive(Args)]
pub struct SubsArgs {
    #[command(subcommand)]
    pub command: SubsCommand,
}

#[derive(Subcommand)]
pub enum SubsCommand {
    /// List purchasable plans
    Plans,
    /// Show the active subscription
    Active,
    /// Purchase a plan
    Purchase {
        plan: i64,
        #[arg(long)]
        method: i64,
        #[arg(long)]
        auto_renew: bool,
    },
    /// Cancel the active subscription
    Cancel,
}

#[derive(Args)]
pub struct TariffsArgs {
    #[command(subcommand)]
    pub command: TariffsCommand,
}

#[derive(Subcommand)]
pub enum TariffsCommand {
    /// List tariff zones
    Zones,
    /// List pricing rules for a zone
    Rules { zone: i64 },
}

#[derive(Args)]
pub struct ContactArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    pub message: String,
}

#[derive(Args)]
pub struct NotifyArgs {
    #[command(subcommand)]
    pub command: NotifyCommand,
}

#[derive(Subcommand)]
pub enum NotifyCommand {
    /// Register a push subscription with the backend
    Subscribe {
        endpoint: String,
        #[arg(long)]
        p256dh: String,
        #[arg(long)]
        auth: String,
    },
    /// Print the public VAPID key subscriptions must use
    Key,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    SetTimeout { seconds: u64 },
    SetVerbose { enabled: String },
    SetVapidKey { key: String },
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(format!("parq={}", log_level));
    subscriber.init();

    let mut handler = CliHandler::new(None);

    if let Err(e) = handler.execute(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
