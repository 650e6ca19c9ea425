use super::ui;
use crate::chart::{ChartState, ChartWatcher, chart_status, write_chart};
use crate::store::CsvPriceStore;
use crate::store::disk::fund_name_from_path;
use anyhow::{Result, bail};
use comfy_table::{Cell, Color};
use std::future::Future;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// How long a price cache must stay unchanged before its chart is redrawn.
pub const WATCH_SETTLE: Duration = Duration::from_secs(2);
pub const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Redraws the charts of every cached fund, or only `fund`.
pub fn regenerate(store: &CsvPriceStore, fund: Option<&str>) -> Result<()> {
    let funds: Vec<String> = match fund {
        Some(fund) => {
            if !store.path_for(fund).exists() {
                bail!("No cached prices for fund: {fund}");
            }
            vec![fund.to_string()]
        }
        None => store
            .list_series()?
            .iter()
            .filter_map(|path| fund_name_from_path(path))
            .collect(),
    };

    if funds.is_empty() {
        println!("No cached price files in {}", store.dir().display());
        return Ok(());
    }

    for fund in &funds {
        let series = store.load_all(fund);
        match write_chart(store.dir(), fund, &series)? {
            Some(path) => println!("{fund}: {}", path.display()),
            None => {
                warn!(fund, "Cached file holds no prices");
                println!("{fund}: {}", ui::style_text("no data", ui::StyleType::Subtle));
            }
        }
    }
    Ok(())
}

pub fn show_status(store: &CsvPriceStore) -> Result<()> {
    let statuses = chart_status(store)?;
    if statuses.is_empty() {
        println!("No cached price files in {}", store.dir().display());
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Fund"),
        ui::header_cell("Status"),
        ui::header_cell("Chart"),
    ]);
    for status in &statuses {
        let state = match status.state {
            ChartState::UpToDate => Cell::new("up to date").fg(Color::Green),
            ChartState::NeedsUpdate => Cell::new("needs update").fg(Color::Yellow),
            ChartState::Missing => Cell::new("missing").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&status.fund),
            state,
            Cell::new(status.chart_path.display()),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Keeps charts in step with the price cache until `shutdown` resolves.
pub async fn watch<F>(store: &CsvPriceStore, interval: Duration, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    println!(
        "Watching {} for price cache changes (Ctrl+C to stop)",
        store.dir().display()
    );
    let mut watcher = ChartWatcher::new(WATCH_SETTLE);
    let mut ticker = tokio::time::interval(interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Chart watch stopped");
                println!("Stopped watching");
                return Ok(());
            }
            _ = ticker.tick() => {
                for (fund, path) in watcher.poll(store, SystemTime::now())? {
                    println!("{fund}: {}", path.display());
                }
            }
        }
    }
}
