//! Medibook CLI - book lab tests from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Print the sign-in link, then finish sign-in with the callback URL
//! medibook login
//! medibook callback --url "https://medibook.in/?token=..."
//!
//! # Browse and fill the cart
//! medibook tests --category blood
//! medibook cart add cbc
//! medibook cart remove cbc --yes
//!
//! # Check out
//! medibook checkout --name "Jane Doe" --relation self --email jane@example.com \
//!     --phone 9876543210 --dob 1990-04-12 --gender female \
//!     --address "12 MG Road" --city Bengaluru --state Karnataka --pincode 560001 \
//!     --slot 10
//!
//! # Follow order history
//! medibook orders --watch
//! ```
//!
//! Configuration comes from the environment (see `ClientConfig`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use medibook_client::Medibook;
use medibook_client::config::ClientConfig;
use medibook_client::navigation::RecordingNavigator;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::checkout::CheckoutArgs;

#[derive(Parser)]
#[command(name = "medibook")]
#[command(author, version, about = "Medibook lab test booking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the link to sign in with Google
    Login,
    /// Finish sign-in with the callback URL or a raw token
    Callback {
        /// Full URL the sign-in flow redirected to
        #[arg(long, conflicts_with = "token", required_unless_present = "token")]
        url: Option<url::Url>,

        /// Session token
        #[arg(long)]
        token: Option<String>,
    },
    /// Show who is signed in
    Whoami,
    /// Sign out and forget the local session
    Logout,
    /// List test categories
    Categories,
    /// List tests
    Tests {
        /// Only tests in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for everything in the cart
    Checkout(CheckoutArgs),
    /// Show order history
    Orders {
        /// Keep polling and print changes until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Show family members tests were booked for
    Family,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a test by id
    Add {
        /// Test id
        test_id: String,
    },
    /// Remove a test by id
    Remove {
        /// Test id
        test_id: String,

        /// Confirm the removal
        #[arg(short, long)]
        yes: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.as_str().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            output::failure(&format!("Invalid configuration: {e}"));
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medibook_client=info,medibook_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        output::failure(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let navigator = Arc::new(RecordingNavigator::new());
    let app = Medibook::new(config, navigator.clone())?;

    let result = dispatch(cli.command, &app, config).await;
    output::navigation(&navigator.drain());
    result
}

async fn dispatch(
    command: Commands,
    app: &Medibook,
    config: &ClientConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Login => commands::session::login(app),
        Commands::Callback { url, token } => {
            commands::session::callback(app, url.as_ref(), token).await?;
        }
        Commands::Whoami => commands::session::whoami(app).await,
        Commands::Logout => commands::session::logout(app).await,
        Commands::Categories => commands::browse::categories(app).await?,
        Commands::Tests { category } => commands::browse::tests(app, category).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(app).await,
            CartAction::Add { test_id } => commands::cart::add(app, &test_id).await?,
            CartAction::Remove { test_id, yes } => {
                commands::cart::remove(app, &test_id, yes).await;
            }
        },
        Commands::Checkout(args) => commands::checkout::run(app, args).await?,
        Commands::Orders { watch } => {
            commands::orders::list(app, watch.then_some(config.poll_interval)).await?;
        }
        Commands::Family => commands::orders::family(app).await?,
    }
    Ok(())
}
