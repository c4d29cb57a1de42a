//! Paper trading command implementation.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use trading_broker::PaperBroker;
use trading_config::AppConfig;

use crate::cli::PaperArgs;

use super::live::{connect, run_orchestrator};

pub async fn run(args: PaperArgs, config: &AppConfig) -> Result<()> {
    // Market data only; orders never leave the process.
    let alpaca = Arc::new(connect(config, true)?);
    let commission = args.commission.unwrap_or(config.backtest.commission);
    let slippage = args.slippage.unwrap_or(config.backtest.slippage_pct);
    let broker = PaperBroker::new(args.capital)
        .with_commission(commission)
        .with_slippage(slippage);
    info!(
        capital = %args.capital,
        commission = %commission,
        slippage = %slippage,
        "Simulating fills in memory"
    );

    let result = run_orchestrator(args.live, config, alpaca, Arc::new(broker.clone())).await;

    info!(
        cash = %broker.cash(),
        fills = broker.fills().len(),
        "Paper session finished"
    );
    result
}
