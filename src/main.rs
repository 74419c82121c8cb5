//! Stat Tally - Entry Point
//!
//! Line-oriented host for a single session. Plain text is treated as a chat
//! message and scanned for stat commands; a few words control turns, presets
//! and the generated context. State is saved to a directory of JSON files.

use clap::Parser;
use stat_tally::core::error::Result;
use stat_tally::persistence::store::{self, JsonFileStore};
use stat_tally::state::simulation::DEFAULT_SESSION_NAME;
use stat_tally::{StatContext, StateManager, TrackerConfig};

use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Track stats embedded in chat messages
#[derive(Parser, Debug)]
#[command(name = "stat-tally")]
#[command(about = "Apply {{stat:value}} commands from chat text to a persistent stat sheet")]
struct Args {
    /// TOML tracker configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for saved sessions and presets
    #[arg(long, default_value = ".stat-tally")]
    state: PathBuf,

    /// Resume a saved session by id
    #[arg(long)]
    session: Option<String>,

    /// Apply a preset (id or name) at startup
    #[arg(long)]
    preset: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stat_tally=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    // Storage is the only async boundary
    let rt = Runtime::new()?;
    let storage = JsonFileStore::new(&args.state)?;

    let mut manager = StateManager::new(config)?;

    if let Some(presets) = rt.block_on(store::load_presets(&storage))? {
        for preset in presets.iter() {
            manager.presets_mut().add(preset.clone());
        }
    }

    let resumed = match &args.session {
        Some(session) => match rt.block_on(store::load_session(&storage, session))? {
            Some(state) => {
                manager.load_state(state);
                true
            }
            None => {
                tracing::warn!("No saved session {}, starting fresh", session);
                false
            }
        },
        None => false,
    };

    // the default preset may live in the stored library
    if !resumed && manager.config().default_preset.is_some() {
        manager.new_session(DEFAULT_SESSION_NAME);
    }

    if let Some(preset) = &args.preset {
        manager.apply_preset(preset)?;
    }

    println!("\n=== STAT TALLY ===");
    println!("Session {}", manager.state().id());
    println!();
    println!("Commands:");
    println!("  tick / t              - Save, then advance one turn");
    println!("  status / s            - Show every stat and its modifiers");
    println!("  context / c           - Show the generation context");
    println!("  reset                 - Return all stats to base values");
    println!("  presets               - List presets");
    println!("  preset <name>         - Apply a preset");
    println!("  save-preset <name>    - Save current stats as a preset");
    println!("  quit / q              - Save and exit");
    println!("  <any text>            - Chat message, e.g. \"The goblin hits you {{{{hp:-10}}}}\"");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "q" => break,
            "tick" | "t" => {
                let report = rt.block_on(store::save_then_tick(&mut manager, &storage))?;
                println!("Turn {}.", report.turn);
                if !report.expired.is_empty() {
                    println!("Expired: {}", report.expired.join(", "));
                }
            }
            "status" | "s" => display_status(&manager),
            "context" | "c" => {
                let summary = StatContext::from_manager(&manager).summary();
                if summary.is_empty() {
                    println!("(context is empty)");
                } else {
                    println!("{}", summary);
                }
            }
            "reset" => {
                manager.reset();
                println!("All stats reset.");
            }
            "presets" => {
                for preset in manager.presets().iter() {
                    println!(
                        "  {} ({}) - {} stats. {}",
                        preset.name,
                        preset.id,
                        preset.stats.len(),
                        preset.description
                    );
                }
            }
            _ => {
                if let Some(name) = input.strip_prefix("preset ") {
                    match manager.apply_preset(name.trim()) {
                        Ok(()) => println!("Applied {}.", name.trim()),
                        Err(e) => println!("{}", e),
                    }
                } else if let Some(name) = input.strip_prefix("save-preset ") {
                    let id = manager.save_as_preset(name.trim(), "");
                    rt.block_on(store::save_presets(manager.presets(), &storage))?;
                    println!("Saved preset {}.", id);
                } else {
                    handle_message(&mut manager, input);
                }
            }
        }
    }

    rt.block_on(store::save_session(&manager, &storage))?;
    rt.block_on(store::save_presets(manager.presets(), &storage))?;
    println!("Saved session {}.", manager.state().id());

    Ok(())
}

fn handle_message(manager: &mut StateManager, text: &str) {
    let result = manager.process_message(text);
    if result.is_empty() {
        println!("(no stat commands)");
        return;
    }

    println!("{}", result.stripped_text);
    for change in result.changes() {
        println!(
            "  {}: {} -> {} ({:+})",
            change.stat_id, change.old_value, change.new_value, change.delta
        );
    }
    for failure in result.failures() {
        println!(
            "  {}: {}",
            failure.command.raw,
            failure.error.as_deref().unwrap_or("not applied")
        );
    }
}

fn display_status(manager: &StateManager) {
    let state = manager.state();
    println!("\n--- {} | turn {} ---", state.name(), state.turn_count());
    for stat in state.stats().iter() {
        let shown = stat.display_string();
        println!(
            "  {:<12} {:>10}  [{} .. {}]{}",
            stat.name(),
            if shown.is_empty() {
                format!("{}", stat.final_value())
            } else {
                shown
            },
            stat.min_value(),
            stat.max_value(),
            if stat.is_visible() { "" } else { " (hidden)" }
        );
        for modifier in stat.modifiers().iter() {
            println!("      {}", modifier);
        }
    }
    println!();
}
