//! Application entry point for alert-relay.
//!
//! Wires the transports, stores and services, then runs either the long-lived
//! relay, a single poll cycle, or a registry dump.

use std::sync::Arc;
use std::time::Instant;

use alert_relay::bot::commands::CommandHandler;
use alert_relay::config::Config;
use alert_relay::decoder::AlertColumns;
use alert_relay::decoder::workbook::WorkbookDecoder;
use alert_relay::logging::setup_logging;
use alert_relay::messenger::telegram::TelegramClient;
use alert_relay::repository::Repository;
use alert_relay::service::Services;
use alert_relay::storage::google_drive::GoogleDriveStorage;
use alert_relay::task::alert_publisher::AlertPublisher;
use alert_relay::task::alert_publisher::CycleOutcome;
use alert_relay::task::update_listener::UpdateListener;
use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::debug;
use log::error;
use log::info;

#[derive(Debug, Parser)]
#[clap(version, about = "Relays spreadsheet alerts from Google Drive to Telegram subscribers")]
struct Cli {
    #[clap(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Command {
    /// Poll on a timer and answer subscription commands until Ctrl+C (default).
    Run,
    /// Run a single poll-and-dispatch cycle and exit.
    Once,
    /// Print the subscription registry and the processed-version marker.
    Dump,
}

struct App {
    services: Services,
    publisher: Arc<AlertPublisher>,
    listener: Arc<UpdateListener>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let cmd = cli.cmd.unwrap_or(Command::Run);
    if let Command::Dump = cmd {
        // Only the local stores are read, so no credentials are required.
        let mut config = Config::new();
        config.load_local();
        return dump(&Repository::new(&config.registry_path, &config.marker_path));
    }

    let init_start = Instant::now();
    let config = load_config()?;
    let repository = Repository::new(&config.registry_path, &config.marker_path);
    let app = setup_app(&config, &repository, init_start)?;

    match cmd {
        Command::Once => run_once(&app).await,
        _ => run(app, init_start).await,
    }
}

fn load_config() -> Result<Arc<Config>> {
    debug!("Loading configuration...");
    let mut config = Config::new();
    config.load()?;
    let config = Arc::new(config);
    setup_logging(&config)?;
    info!("Starting alert-relay...");
    Ok(config)
}

fn setup_app(config: &Config, repository: &Repository, init_start: Instant) -> Result<App> {
    debug!("Setting up transports...");
    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_token,
        config.send_rate_per_second,
        config.long_poll_timeout,
    )?);
    let storage = Arc::new(GoogleDriveStorage::new(
        &config.drive_api_url,
        &config.drive_credentials,
    )?);
    let decoder = Arc::new(WorkbookDecoder::new(AlertColumns::new(
        &config.recipient_column,
        &config.message_column,
    )));
    info!(
        "Transports setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    debug!("Setting up Services...");
    let services = Services::new(config, repository, storage, decoder, telegram.clone());

    let publisher = AlertPublisher::new(
        services.poller.clone(),
        services.dispatcher.clone(),
        config.poll_interval,
    );
    let handler = Arc::new(CommandHandler::new(
        services.subscription.clone(),
        telegram.clone(),
    ));
    let listener = UpdateListener::new(
        telegram,
        handler,
        config.long_poll_timeout + config.request_timeout,
    );
    info!(
        "Services setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(App {
        services,
        publisher,
        listener,
    })
}

async fn run_once(app: &App) -> Result<()> {
    match app.publisher.run_cycle().await {
        Ok(CycleOutcome::NoFile) => info!("No alert file found."),
        Ok(CycleOutcome::AlreadyProcessed { file }) => info!("{file} was already processed."),
        Ok(CycleOutcome::Dispatched { file, report }) => info!("Dispatched {file}: {report}"),
        Err(e) => {
            error!("Alert cycle aborted: {e}");
            return Err(e.into());
        }
    }
    Ok(())
}

async fn run(app: App, init_start: Instant) -> Result<()> {
    let subscribers = app.services.subscription.snapshot().await?;
    info!(
        "Loaded {} subscription(s), {} active.",
        subscribers.len(),
        subscribers.values().filter(|s| s.active).count()
    );

    app.publisher.clone().start().await?;
    app.listener.clone().start()?;

    info!(
        "alert-relay is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down.");

    app.listener.clone().stop()?;
    info!("Waiting for the current alert cycle to finish...");
    app.publisher.stop().await?;
    info!("Shutdown complete.");
    Ok(())
}

fn dump(repository: &Repository) -> Result<()> {
    let subscriptions = repository.registry.load()?;
    println!("{} subscription(s):", subscriptions.len());
    for sub in subscriptions.values() {
        println!(
            "  {}\t{}\t{}",
            sub.endpoint_id,
            sub.recipient_key,
            if sub.active { "active" } else { "inactive" }
        );
    }
    match repository.marker.read()? {
        Some(file_id) => println!("Last processed file: {file_id}"),
        None => println!("Last processed file: none"),
    }
    Ok(())
}
