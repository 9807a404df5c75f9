//! wikicarto - Geolocated historical atlas pipeline
//!
//! Discovers Wikipedia articles around configured hub pages, enriches
//! them with Wikidata identifiers, coordinates, summaries and a notoriety
//! score, and loads accepted entries into the SQLite store. Stages run as
//! independent processes coordinated through directory-based file queues.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod config;
mod dispatch;

use config::Config;

#[derive(Parser)]
#[command(name = "wikicarto")]
#[command(about = "Geolocated historical atlas pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./wikicarto.toml or ~/.config/wikicarto/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pipeline stage for a given run id
    Run(RunArgs),
    /// Show current configuration
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run identifier grouping all records of one pipeline execution
    #[arg(long)]
    pub run_id: String,

    /// Stage to execute: 0 = section listing, 1 = extraction, 2-5 = listeners
    #[arg(long)]
    pub step: u32,

    /// Pause between outbound API calls, in seconds
    #[arg(long, default_value_t = 0.1)]
    pub pause: f64,

    /// Cap on extracted entries (step 1, debug only)
    #[arg(long)]
    pub max_entries: Option<usize>,
}

impl RunArgs {
    pub fn pause(&self) -> Duration {
        Duration::from_secs_f64(self.pause.max(0.0))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(wikicarto_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — status lines show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    wikicarto_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => dispatch::run(&args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Data root", &config.data.root.display().to_string()]);
            table.add_row(vec![
                "Hub tables",
                &config.data.input.display().to_string(),
            ]);
            table.add_row(vec![
                "Database",
                &config.database.path.display().to_string(),
            ]);
            table.add_row(vec!["Wikipedia API", &config.wikipedia.api_url]);
            table.add_row(vec!["Wikipedia REST", &config.wikipedia.rest_url]);
            table.add_row(vec!["Wikidata API", &config.wikidata.api_url]);
            table.add_row(vec!["SPARQL endpoint", &config.wikidata.sparql_url]);
            table.add_row(vec![
                "HTTP timeout",
                &format!("{}s", config.http.timeout_secs),
            ]);
            table.add_row(vec![
                "SPARQL retries",
                &config.http.sparql_max_retries.to_string(),
            ]);
            table.add_row(vec![
                "Poll interval",
                &format!("{}s", config.listener.poll_secs),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
