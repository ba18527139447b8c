use anyhow::{anyhow, Context, Result};
use common::{init_telemetry, shutdown_telemetry, Config};
use notifier::{LoggingNotificationSink, NotificationChannel, NotificationSink};
use order_store::InMemoryOrderStore;
use order_sync::{DispatcherConfig, OrderSyncDispatcher};
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod console;
mod seed;
use console::{Command, Console};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;
    init_telemetry(config.telemetry("companion-service"))
        .map_err(|e| anyhow!("failed to initialize telemetry: {}", e))?;

    info!(
        collection = %config.orders_collection,
        channel = %config.notification_channel_id,
        update_timeout_secs = config.update_timeout_secs,
        "Starting companion service"
    );

    let orders = seed::load_orders(config.seed_file.as_deref())?;
    let store = InMemoryOrderStore::with_orders(&config.orders_collection, orders);

    // Channel registration happens once, before the first notification
    let sink = Arc::new(LoggingNotificationSink::new());
    sink.prepare(&NotificationChannel::with_id(&config.notification_channel_id))
        .context("failed to register notification channel")?;

    let mut dispatcher = OrderSyncDispatcher::new(
        DispatcherConfig::from(&config),
        Arc::new(store.clone()),
        sink,
    );
    dispatcher.start().await?;

    // Setup signal handling
    let signals = Signals::new([SIGTERM, SIGINT])?;
    let handle = signals.handle();
    let mut signal_task = tokio::spawn(async move {
        use futures_util::stream::StreamExt;
        let mut signals = signals;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM | SIGINT => {
                    info!(signal, "Received shutdown signal");
                    break;
                }
                _ => {}
            }
        }
    });

    let console = Console::new(store, config.orders_collection.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", console::HELP);

    loop {
        tokio::select! {
            _ = &mut signal_task => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        println!("{}", console.execute(&dispatcher, command).await)
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                },
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read operator input");
                    break;
                }
            },
        }
    }

    info!("Shutting down companion service...");
    handle.close();
    dispatcher.stop().await;
    if !signal_task.is_finished() {
        signal_task.abort();
    }

    info!(orders = dispatcher.orders().len(), "Companion service stopped");
    shutdown_telemetry();

    Ok(())
}
