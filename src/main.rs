//! Valuation radar CLI
//!
//! Fetches the watch-list through one quote provider, evaluates the valuation
//! rules, prints the report and pushes it to the configured delivery keys.
//!
//! Run with: cargo run [eastmoney|sina|ths]

use anyhow::{bail, Result};
use valuation_radar::quotes::{self, ProviderType};
use valuation_radar::valuation::report::SignalReport;
use valuation_radar::{config, push};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let provider = match std::env::args().nth(1) {
        Some(name) => match ProviderType::from_str(&name) {
            Some(p) => p,
            None => bail!("unknown provider '{}' (expected eastmoney, sina or ths)", name),
        },
        None => ProviderType::Eastmoney,
    };

    let watchlist = config::default_watchlist();
    log::info!(
        "fetching {} instruments via {}",
        watchlist.len(),
        provider.as_str()
    );

    // A provider outage yields an empty map here; the report then consists of
    // data-missing markers instead of failing the process.
    let quotes = quotes::fetch_quotes(provider, &watchlist).await;
    log::info!("got quotes for {} instruments", quotes.len());

    let report = SignalReport::build(&watchlist, &quotes);
    let (title, body) = report.render();

    println!("{}", title);
    println!("{}", body);

    push::push_report(&config::push_keys(), &title, &body).await;

    Ok(())
}
