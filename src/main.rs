use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use vcdash::cli::{self, OutputFormat};
use vcdash::config;
use vcdash::trace::{Cardinality, TraceFilter};
use vcdash::web;

#[derive(Debug, Parser)]
#[command(name = "vcdash")]
#[command(about = "Dashboard client for the vehicle-command assistant backend")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check backend reachability, config files and the event log
    Health,
    /// Send a message to the assistant; interactive when MESSAGE is omitted
    Chat {
        /// The utterance to send
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// List recent exchanges, newest first
    Traces {
        /// Command cardinality: single | multi
        #[arg(long = "type")]
        kind: Option<String>,
        /// Only exchanges with a command for this module
        #[arg(long)]
        module: Option<String>,
        /// Case-sensitive substring of the user input
        #[arg(long)]
        search: Option<String>,
        /// Rows to fetch (default: traces.limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show one exchange in detail
    Trace {
        /// Backend log id
        id: String,
        /// Rows to search (default: traces.limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show statistics over recent exchanges
    Stats {
        /// Rows to fetch (default: traces.limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Browse and manage the knowledge base
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },
    /// Call the recognition or execution stage directly
    Api {
        #[command(subcommand)]
        action: ApiAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Serve the local dashboard API
    Web {
        /// Listen address (default: web.addr)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum KbAction {
    /// Show the active knowledge base
    Show {
        /// Substring of intent or query
        #[arg(long)]
        search: Option<String>,
        /// Restrict to one domain
        #[arg(long)]
        domain: Option<String>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List knowledge files
    Files {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Upload a knowledge file (.xlsx, .xls, .csv, .json)
    Upload { path: PathBuf },
    /// Make a knowledge file the active one
    Activate { id: String },
    /// Delete an imported knowledge file
    Delete { id: String },
    /// Download the active knowledge base
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Download the import template
    Template {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum ApiAction {
    /// POST /chat/recognize
    Recognize {
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },
    /// POST /chat/execute with MODULE:TEXT items
    Execute {
        #[arg(required = true)]
        commands: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config to ~/.vcdash/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a config key, e.g. `backend.url http://car:8000`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Health => cli::run_health(),
        Commands::Chat { message } => {
            let message = message.join(" ");
            if message.is_empty() {
                cli::run_chat(None)
            } else {
                cli::run_chat(Some(&message))
            }
        }
        Commands::Traces {
            kind,
            module,
            search,
            limit,
            format,
        } => {
            let cardinality = match kind.as_deref() {
                Some(k) => Some(
                    Cardinality::parse(k)
                        .ok_or_else(|| anyhow::anyhow!("unknown --type '{k}' (single | multi)"))?,
                ),
                None => None,
            };
            let filter = TraceFilter {
                cardinality,
                module,
                keyword: search,
            };
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_traces(&filter, limit, fmt)
        }
        Commands::Trace { id, limit } => cli::run_trace(&id, limit),
        Commands::Stats { limit, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_stats(limit, fmt)
        }
        Commands::Kb { action } => match action {
            KbAction::Show {
                search,
                domain,
                format,
            } => {
                let fmt = OutputFormat::from_str_opt(Some(&format));
                cli::run_kb_show(search.as_deref(), domain.as_deref(), fmt)
            }
            KbAction::Files { format } => {
                let fmt = OutputFormat::from_str_opt(Some(&format));
                cli::run_kb_files(fmt)
            }
            KbAction::Upload { path } => cli::run_kb_upload(&path),
            KbAction::Activate { id } => cli::run_kb_activate(&id),
            KbAction::Delete { id } => cli::run_kb_delete(&id),
            KbAction::Export { out } => cli::run_kb_export(out.as_deref()),
            KbAction::Template { out } => cli::run_kb_template(out.as_deref()),
        },
        Commands::Api { action } => match action {
            ApiAction::Recognize { message } => cli::run_api_recognize(&message.join(" ")),
            ApiAction::Execute { commands } => cli::run_api_execute(&commands),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
        Commands::Web { addr } => {
            let cfg = config::load();
            let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
            web::serve(&addr, &cfg)
        }
    }
}
