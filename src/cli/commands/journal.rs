//! Journal inspection command.

use anyhow::{Context, Result};
use chrono::Utc;
use trading_config::AppConfig;
use trading_journal::TransactionJournal;

use crate::cli::{JournalArgs, OutputFormat};

pub fn run(args: JournalArgs, config: &AppConfig) -> Result<()> {
    let market_hours = config.market_hours()?;
    let dir = args.dir.clone().unwrap_or_else(|| config.live.journal_dir.clone());
    let journal = TransactionJournal::new(&dir, market_hours.timezone);

    let date = args
        .date
        .unwrap_or_else(|| market_hours.exchange_date(Utc::now()));
    let store = journal
        .load_day(date)
        .with_context(|| format!("Failed to read {}", journal.path_for(date).display()))?;

    if let OutputFormat::Json = args.output {
        println!("{}", serde_json::to_string_pretty(&store)?);
        return Ok(());
    }

    if store.is_empty() {
        println!("No journaled transactions for {date}");
        return Ok(());
    }

    println!("Transactions for {date} ({})", journal.path_for(date).display());
    println!("═══════════════════════════════════════════════════════════");
    for (symbol, records) in &store {
        println!("{symbol}");
        for (timestamp, record) in records {
            println!(
                "  {timestamp}  {:<4}  {:>10.4}  qty {:<6}  {}",
                record.transaction_type,
                record.price,
                record
                    .quantity
                    .map(|q| q.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                record.outcome
            );
        }
    }

    Ok(())
}
