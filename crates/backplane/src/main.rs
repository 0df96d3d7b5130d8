//! backplane CLI entry point.

use std::sync::Arc;

use anyhow::Result;
use backplane::cli::{Cli, Commands, OutputFormat};
use backplane::connection::RedisConnection;
use backplane::output::{format_event, format_message, format_published, format_reply};
use backplane::{BackplaneConnection, Config, ConnectionEvent, MessageHandler, RedisMessage};
use backplane_core::script::publish;
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber. Logs go to stderr so stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backplane=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let connection = Arc::new(RedisConnection::new(config.connection_settings()));
    connection.connect(&cli.url).await?;

    match cli.command {
        Commands::Subscribe { channel } => {
            let format = cli.format;
            let on_message: MessageHandler = Arc::new(move |_: usize, message: RedisMessage| {
                println!("{}", format_message(&message, format))
            });

            let events = tokio::spawn(print_events(connection.events(), cli.format));
            connection.subscribe(&channel, on_message).await?;

            if !cli.quiet {
                eprintln!("Subscribed to {}. Press Ctrl+C to stop.", channel);
            }

            signal::ctrl_c().await?;
            tracing::info!("Received Ctrl+C, shutting down...");

            connection.close(&channel, true).await?;
            events.abort();
        }
        Commands::Publish {
            key,
            payload,
            database,
        } => {
            let id = publish(connection.as_ref(), database, &key, payload.as_bytes()).await?;
            if !cli.quiet {
                println!("{}", format_published(id, &key, cli.format));
            }
            connection.close(&key, true).await?;
        }
        Commands::Eval {
            script,
            key,
            argument,
            database,
        } => {
            let reply = connection
                .script_evaluate(database, &script, &key, argument.as_bytes())
                .await?;
            println!("{}", format_reply(&reply, cli.format));
            connection.close(&key, true).await?;
        }
    }

    Ok(())
}

/// Prints connection events to stderr until the channel closes.
async fn print_events(mut events: broadcast::Receiver<ConnectionEvent>, format: OutputFormat) {
    loop {
        match events.recv().await {
            Ok(event) => eprintln!("{}", format_event(&event, format)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Connection events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
