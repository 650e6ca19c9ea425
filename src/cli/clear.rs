use super::prompt::{self, Input};
use super::ui;
use crate::store::CsvPriceStore;
use anyhow::Result;
use console::Term;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    /// Only this fund; every fund when unset
    pub fund: Option<String>,
    /// Skip the confirmation question
    pub yes: bool,
}

/// Deletes cached prices and charts once the user agrees.
///
/// Returns `None` when the user declined.
pub fn clear(
    store: &CsvPriceStore,
    input: &mut dyn Input,
    options: &ClearOptions,
) -> Result<Option<usize>> {
    let target = match &options.fund {
        Some(fund) => format!("cached prices and chart for {fund}"),
        None => format!("all cached prices and charts in {}", store.dir().display()),
    };
    if !options.yes {
        input.tell(&ui::style_text(
            "This cannot be undone.",
            ui::StyleType::Error,
        ));
        if !prompt::confirm(input, &format!("Remove {target}?"))? {
            return Ok(None);
        }
    }

    let removed = match &options.fund {
        Some(fund) => store.remove(fund)?,
        None => store.clear()?,
    };
    info!(removed, "Cache cleared");
    Ok(Some(removed))
}

pub fn run(store: &CsvPriceStore, options: ClearOptions) -> Result<()> {
    let mut term = Term::stdout();
    match clear(store, &mut term, &options)? {
        Some(removed) => println!("Removed {removed} files"),
        None => println!("Nothing removed"),
    }
    Ok(())
}
