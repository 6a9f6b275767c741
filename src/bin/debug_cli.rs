//! Debug CLI for exercising the change-set and projection without the TUI
//!
//! Usage:
//!   cargo run --bin debug_cli -- <command> [args]
//!
//! Commands:
//!   status              Show pending changes
//!   info <name>         Show one application's row
//!   toggle <name>       Toggle an application (simulates Space key)
//!   reset               Clear all pending changes
//!   list [category]     List applications, optionally filtered by category
//!   apply               Apply the pending changes through apt-get

use std::env;
use std::fs;
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::eyre;

use appdeck::config::Config;
use appdeck::core::{self, CategoryIndex, ChangeSet};
use appdeck::metadata::MetadataStore;
use appdeck::provider::{DpkgProvider, InstalledStatusProvider};
use appdeck::types::Row;

const STATE_FILE: &str = "debug_state.json";

fn main() -> Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("help");

    match cmd {
        "status" => cmd_status()?,
        "info" => {
            let name = args
                .get(2)
                .ok_or_else(|| eyre!("Usage: info <package_name>"))?;
            cmd_info(name)?;
        }
        "toggle" => {
            let name = args
                .get(2)
                .ok_or_else(|| eyre!("Usage: toggle <package_name>"))?;
            cmd_toggle(name)?;
        }
        "reset" => cmd_reset()?,
        "list" => cmd_list(args.get(2).map(String::as_str))?,
        "apply" => cmd_apply()?,
        _ => {
            println!("Debug CLI for appdeck");
            println!();
            println!("Commands:");
            println!("  status              Show pending changes");
            println!("  info <name>         Show one application's row");
            println!("  toggle <name>       Toggle an application (simulates Space key)");
            println!("  reset               Clear all pending changes");
            println!("  list [category]     List applications, optionally filtered by category");
            println!("  apply               Apply the pending changes through apt-get");
            println!();
            println!("Example flow:");
            println!("  cli reset");
            println!("  cli info gimp            # [ ] not installed");
            println!("  cli toggle gimp          # marks gimp for install");
            println!("  cli info gimp            # [x] pending");
            println!("  cli apply");
        }
    }

    Ok(())
}

fn cmd_status() -> Result<()> {
    let changes = load_changes()?;

    println!("=== Pending Changes ===");
    println!();

    if changes.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    if !changes.to_add().is_empty() {
        println!("To install ({}):", changes.to_add().len());
        for pkg in changes.to_add() {
            println!("  + {pkg}");
        }
    }
    if !changes.to_rm().is_empty() {
        println!("To remove ({}):", changes.to_rm().len());
        for pkg in changes.to_rm() {
            println!("  - {pkg}");
        }
    }

    Ok(())
}

fn cmd_info(name: &str) -> Result<()> {
    let rows = project_all()?;

    match rows.iter().find(|r| r.package == name) {
        Some(row) => println!("{}", row_line(row)),
        None => println!("Application '{name}' not found"),
    }

    Ok(())
}

fn cmd_toggle(name: &str) -> Result<()> {
    let cfg = Config::load();
    let meta = MetadataStore::load(&cfg);
    let provider = DpkgProvider::new()?;
    let mut changes = load_changes()?;

    if meta.get(name).is_none() {
        println!("Application '{name}' not found");
        return Ok(());
    }
    let Some(installed) = provider.check_installed(name) else {
        println!("Application '{name}' is unknown to the package system");
        return Ok(());
    };

    let toggle = changes.toggle(name, installed);
    println!("=== Toggle {name} ===");
    println!(
        "checked: {} | pending: {} | {} pending changes",
        toggle.checked, toggle.pending, toggle.change_count
    );

    save_changes(&changes)?;
    Ok(())
}

fn cmd_reset() -> Result<()> {
    if Path::new(STATE_FILE).exists() {
        fs::remove_file(STATE_FILE)?;
    }
    println!("All pending changes cleared.");
    Ok(())
}

fn cmd_list(category: Option<&str>) -> Result<()> {
    let cfg = Config::load();
    let meta = MetadataStore::load(&cfg);
    let cates = CategoryIndex::load(&meta);
    let provider = DpkgProvider::new()?;
    let changes = load_changes()?;

    // Resolve a category name to its projection filter; "All Categories"
    // and unknown names fall back to no filtering.
    let filter = category.and_then(|name| {
        let idx = cates.entries().iter().position(|c| c.name == name);
        if idx.is_none() {
            println!("Unknown category: {name}. Listing everything.");
        }
        idx.and_then(|i| cates.select(i))
    });

    let universe = meta.universe();
    let mut rows = core::project(&universe, &meta, &provider, filter.as_ref(), &changes);
    rows.sort_by_key(|r| r.display_name.to_lowercase());

    println!("Applications ({}):", rows.len());
    println!();
    for row in &rows {
        println!("  {}", row_line(row));
    }

    Ok(())
}

fn cmd_apply() -> Result<()> {
    let mut provider = DpkgProvider::new()?;
    let mut changes = load_changes()?;

    if changes.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    let outcome = core::commit(&mut changes, &mut provider);
    if outcome.ok {
        println!("Update Successful!");
    } else {
        println!("Update Failed!");
        if let Some(e) = outcome.error {
            println!("  {e}");
        }
    }

    save_changes(&changes)?;
    Ok(())
}

fn project_all() -> Result<Vec<Row>> {
    let cfg = Config::load();
    let meta = MetadataStore::load(&cfg);
    let provider = DpkgProvider::new()?;
    let changes = load_changes()?;

    let universe = meta.universe();
    Ok(core::project(&universe, &meta, &provider, None, &changes))
}

fn row_line(row: &Row) -> String {
    let checkbox = if row.checked { "[x]" } else { "[ ]" };
    let marker = if row.pending { " *" } else { "" };
    format!("{checkbox} {} - {}{marker}", row.package, row.summary)
}

// === State persistence ===

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct SavedState {
    to_add: Vec<String>,
    to_rm: Vec<String>,
}

fn load_changes() -> Result<ChangeSet> {
    if !Path::new(STATE_FILE).exists() {
        return Ok(ChangeSet::new());
    }
    let content = fs::read_to_string(STATE_FILE)?;
    let saved: SavedState = serde_json::from_str(&content)?;
    Ok(ChangeSet::restore(saved.to_add, saved.to_rm))
}

fn save_changes(changes: &ChangeSet) -> Result<()> {
    let (to_add, to_rm) = changes.snapshot();
    let saved = SavedState { to_add, to_rm };
    fs::write(STATE_FILE, serde_json::to_string_pretty(&saved)?)?;
    Ok(())
}
