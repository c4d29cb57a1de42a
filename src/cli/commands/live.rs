//! Live trading command implementation.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use trading_broker::{AlpacaBroker, AlpacaConfig};
use trading_config::AppConfig;
use trading_core::traits::Broker;
use trading_data::FileIntentSource;
use trading_journal::TransactionJournal;
use trading_live::Orchestrator;
use trading_monitor::LoggingListener;

use crate::cli::LiveArgs;

pub async fn run(args: LiveArgs, config: &AppConfig) -> Result<()> {
    let alpaca = Arc::new(connect(config, config.alpaca.paper)?);
    info!(paper_account = config.alpaca.paper, "Orders go to Alpaca");
    run_orchestrator(args, config, alpaca.clone(), alpaca).await
}

/// Alpaca client with credentials read from the configured variables.
pub(crate) fn connect(config: &AppConfig, paper: bool) -> Result<AlpacaBroker> {
    let mut alpaca = AlpacaConfig::from_env_vars(
        &config.alpaca.api_key_env,
        &config.alpaca.api_secret_env,
        paper,
    )
    .context("Alpaca credentials missing")?;
    alpaca.feed = config.alpaca.feed.clone();
    Ok(AlpacaBroker::new(alpaca)?)
}

/// Build the orchestrator around `broker` and poll until ctrl-c.
pub(crate) async fn run_orchestrator(
    args: LiveArgs,
    config: &AppConfig,
    alpaca: Arc<AlpacaBroker>,
    broker: Arc<dyn Broker>,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let mut live_config = config.live_config()?;
    if !args.symbols.is_empty() {
        live_config.symbols = args.symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    }
    if live_config.symbols.is_empty()
        && args.inbox.is_none()
        && config.live.intent_inbox.is_none()
    {
        bail!("Nothing to trade: configure live.symbols or an intent inbox");
    }

    let journal = Arc::new(TransactionJournal::new(
        &config.live.journal_dir,
        live_config.market_hours.timezone,
    ));

    let mut orchestrator = Orchestrator::new(
        live_config,
        alpaca.clone(),
        alpaca,
        broker,
        journal,
    )?
    .with_listener(Arc::new(LoggingListener::new()));

    if let Some(inbox) = args.inbox.as_ref().or(config.live.intent_inbox.as_ref()) {
        info!(inbox = %inbox.display(), "Watching intent inbox");
        orchestrator = orchestrator.with_intent_source(Arc::new(FileIntentSource::new(inbox)));
    }

    if args.once {
        let summary = orchestrator.run_cycle().await?;
        info!(?summary, "Single cycle complete");
        return Ok(());
    }

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping after the current cycle"),
            Err(e) => warn!(error = %e, "Cannot listen for ctrl-c, stopping"),
        }
        stop.stop();
    });

    orchestrator.run().await;
    Ok(())
}
