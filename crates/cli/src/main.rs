//! Tote CLI - Drive the cart and session client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Work with the persisted guest cart
//! tote cart add tee --name "Tee" --price 25.00 --size m
//! tote cart show
//!
//! # Log in; the guest cart is merged into the session cart
//! tote login password -e shopper@example.com
//!
//! # Submit refund details for a cancelled order
//! tote refund submit --order-id 1042 --full-name "Ann Lee" --upi-id ann@upi
//! ```
//!
//! # Commands
//!
//! - `cart` - Show and edit the cart
//! - `login` - Log in by password, passcode, or Google profile
//! - `register` - Create an account and log in
//! - `logout` - End the session, keeping the cart
//! - `refund submit` - Send payout details for a cancelled order

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tote_client::api::RefundDetails;
use tote_client::{ClientConfig, LoginMethod, ToteClient};

mod commands;
mod error;

use commands::cart::NewLine;
use error::CliError;

#[derive(Parser)]
#[command(name = "tote")]
#[command(author, version, about = "Tote cart and session client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Log in and merge the guest cart
    Login {
        #[command(subcommand)]
        method: LoginCommand,
    },
    /// Create an account, log in, and merge the guest cart
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "TOTE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session (the cart is kept)
    Logout,
    /// Refund details for cancelled orders
    Refund {
        #[command(subcommand)]
        action: RefundAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print every line and the totals
    Show,
    /// Add a line, merging with an existing line of the same key
    Add {
        /// Product ID
        product_id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Size ID
        #[arg(short, long)]
        size: Option<String>,

        /// Size shown to the shopper (e.g. "M")
        #[arg(long)]
        size_label: Option<String>,

        /// Variant ID
        #[arg(short, long)]
        variant: Option<String>,

        /// Color shown to the shopper
        #[arg(long)]
        color: Option<String>,

        /// Image URL
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: String,

        /// Size ID
        #[arg(short, long)]
        size: Option<String>,

        /// Variant ID
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Set a line's quantity (must be at least 1)
    Update {
        /// Product ID
        product_id: String,

        /// New quantity
        quantity: u32,

        /// Size ID
        #[arg(short, long)]
        size: Option<String>,

        /// Variant ID
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Remove every line
    Clear,
}

#[derive(Subcommand)]
enum LoginCommand {
    /// Email and password
    Password {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "TOTE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// One-time passcode by email
    Otp {
        #[command(subcommand)]
        step: OtpStep,
    },
    /// Google profile from the OAuth callback
    Google {
        /// Google account email
        #[arg(short, long)]
        email: String,

        /// Google display name
        #[arg(short, long)]
        name: String,

        /// Google subject ID
        #[arg(long)]
        google_id: String,
    },
}

#[derive(Subcommand)]
enum OtpStep {
    /// Email a passcode
    Send {
        /// Account email
        #[arg(short, long)]
        email: String,
    },
    /// Log in with a received passcode
    Verify {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Passcode from the email
        #[arg(short, long)]
        code: String,
    },
}

#[derive(Subcommand)]
enum RefundAction {
    /// Submit payout details (UPI ID or bank account)
    Submit {
        /// Cancelled order ID
        #[arg(long)]
        order_id: String,

        /// Account holder name
        #[arg(long)]
        full_name: String,

        /// UPI ID
        #[arg(long)]
        upi_id: Option<String>,

        /// Bank account number
        #[arg(long)]
        account_number: Option<String>,

        /// Bank IFSC code
        #[arg(long)]
        ifsc_code: Option<String>,

        /// Bank name
        #[arg(long)]
        bank_name: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tote_client=info,tote_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let client = ToteClient::new(config)?;

    match cli.command {
        Commands::Cart { action } => {
            let mut cart = client.open_cart();
            match action {
                CartAction::Show => commands::cart::show(&cart),
                CartAction::Add {
                    product_id,
                    name,
                    price,
                    quantity,
                    size,
                    size_label,
                    variant,
                    color,
                    image,
                } => commands::cart::add(
                    &mut cart,
                    NewLine {
                        product_id,
                        name,
                        price,
                        quantity,
                        size,
                        size_label,
                        variant,
                        color,
                        image,
                    },
                ),
                CartAction::Remove {
                    product_id,
                    size,
                    variant,
                } => {
                    let key = commands::cart::line_key(&product_id, size, variant);
                    commands::cart::remove(&mut cart, &key);
                }
                CartAction::Update {
                    product_id,
                    quantity,
                    size,
                    variant,
                } => {
                    let key = commands::cart::line_key(&product_id, size, variant);
                    commands::cart::update(&mut cart, &key, quantity);
                }
                CartAction::Clear => commands::cart::clear(&mut cart),
            }
        }
        Commands::Login { method } => {
            let method = match method {
                LoginCommand::Password { email, password } => {
                    LoginMethod::password(&email, SecretString::from(password))?
                }
                LoginCommand::Otp {
                    step: OtpStep::Send { email },
                } => return commands::session::send_otp(&client, &email).await,
                LoginCommand::Otp {
                    step: OtpStep::Verify { email, code },
                } => LoginMethod::otp(&email, code)?,
                LoginCommand::Google {
                    email,
                    name,
                    google_id,
                } => LoginMethod::google(&email, name, google_id)?,
            };
            commands::session::login(&client, method).await?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            let method = LoginMethod::register(name, &email, SecretString::from(password))?;
            commands::session::login(&client, method).await?;
        }
        Commands::Logout => commands::session::logout(&client)?,
        Commands::Refund {
            action:
                RefundAction::Submit {
                    order_id,
                    full_name,
                    upi_id,
                    account_number,
                    ifsc_code,
                    bank_name,
                },
        } => {
            let details = RefundDetails {
                order_id: order_id.into(),
                full_name,
                upi_id,
                account_number,
                ifsc_code,
                bank_name,
            };
            commands::refund::submit(&client, details).await?;
        }
    }
    Ok(())
}
