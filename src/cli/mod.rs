//! CLI command implementations for vcdash.
//!
//! Handlers behind each `vcdash` subcommand:
//! - `vcdash health`: backend reachability, config and event log status
//! - `vcdash chat [MESSAGE]`: one turn, or an interactive session
//! - `vcdash traces` / `vcdash trace <ID>`: trace viewer
//! - `vcdash stats`: aggregate trace statistics
//! - `vcdash kb ...`: knowledge browser and snapshot management
//! - `vcdash api recognize|execute`: raw API inspection
//! - `vcdash config show|init|set|reset`: configuration management

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::analytics::events;
use crate::analytics::reporter::{self, TraceStats};
use crate::backend::{Backend, CommandItem, HttpBackend};
use crate::config::{self, VcdashConfig};
use crate::knowledge::{self, IntentEntry, KnowledgeSnapshot, SnapshotId, SnapshotManager};
use crate::session::{ChatMessage, ConversationSession, Role, TurnOutcome};
use crate::trace::{self, TraceEntry, TraceFilter, TraceId, TraceList};

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Resolved config plus a client built from it.
fn connect() -> (VcdashConfig, HttpBackend) {
    let cfg = config::load();
    let backend = HttpBackend::from_config(&cfg);
    (cfg, backend)
}

// ---------------------------------------------------------------------------
// vcdash health
// ---------------------------------------------------------------------------

/// Check backend reachability, config files and the event log.
pub fn run_health() -> Result<()> {
    let (cfg, backend) = connect();

    println!("{}", "vcdash Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.vcdash/config.toml found"
        } else {
            "not found (run `vcdash config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".vcdash.toml found"
        } else {
            "none (optional)"
        },
    );
    print_health_item("Locale", true, &cfg.general.locale.to_string());

    let started = Instant::now();
    match backend.health() {
        Ok(body) => {
            let detail = format!(
                "reachable at {} ({}ms)",
                backend.base_url(),
                started.elapsed().as_millis()
            );
            print_health_item("Backend", true, &detail);
            if let Some(status) = body.get("status").and_then(|s| s.as_str()) {
                print_health_item("Backend status", status == "ok", status);
            }
        }
        Err(e) => {
            let detail = format!("{} — {}", cfg.general.locale.connect_error(), e.detail());
            print_health_item("Backend", false, &detail);
        }
    }

    let log_path = events::events_log_path();
    let log_exists = log_path.as_ref().is_some_and(|p| p.exists());
    let log_detail = match &log_path {
        None => "disabled".to_string(),
        Some(p) if log_exists => format!("{}", p.display()),
        Some(_) => "no log file yet".to_string(),
    };
    print_health_item("Event log", log_exists, &log_detail);

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// vcdash chat
// ---------------------------------------------------------------------------

/// Send one message, or start an interactive session when `message` is None.
pub fn run_chat(message: Option<&str>) -> Result<()> {
    let (cfg, backend) = connect();
    let mut session = ConversationSession::new(cfg.general.locale);
    let mut traces = TraceList::default();

    if let Some(text) = message {
        let outcome = session.send(&backend, text, &mut traces)?;
        print_last_turn(&session, &traces, &outcome);
        return Ok(());
    }

    println!("{}", "vcdash chat".bold().cyan());
    println!(
        "  {}",
        "Type a message. /clear empties the transcript, /quit exits.".dimmed()
    );

    let stdin = io::stdin();
    loop {
        print!("{} ", ">".bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);

        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("  {}", "transcript cleared".dimmed());
                continue;
            }
            "" => continue,
            _ => {}
        }

        let outcome = session.send(&backend, line, &mut traces)?;
        print_last_turn(&session, &traces, &outcome);
    }

    Ok(())
}

fn print_last_turn(session: &ConversationSession, traces: &TraceList, outcome: &TurnOutcome) {
    let Some(message) = session.transcript().last() else {
        return;
    };
    print_message(message);

    match outcome {
        TurnOutcome::Delivered { trace_id } => {
            if let Some(entry) = traces.get(trace_id) {
                let tokens = if entry.token_count > 0 {
                    format!(" · {} tokens", format_number(entry.token_count as usize))
                } else {
                    String::new()
                };
                println!(
                    "  {}",
                    format!("trace {} · {}{}", entry.id, trace::format_latency(entry.latency_ms), tokens)
                        .dimmed()
                );
            }
        }
        TurnOutcome::Failed { error } => {
            println!("  {}", error.to_string().red());
        }
    }
}

fn print_message(message: &ChatMessage) {
    let who = match message.role {
        Role::User => "you".bold(),
        Role::Agent => "agent".bold().green(),
    };
    println!("[{}] {}: {}", message.timestamp.dimmed(), who, message.content);

    for (i, command) in message.commands.iter().enumerate() {
        let confidence = command
            .confidence
            .map(|c| format!(" ({:.0}%)", c * 100.0))
            .unwrap_or_default();
        println!(
            "  {}. {} {}{}",
            i + 1,
            format!("[{}]", command.module).cyan(),
            command.text,
            confidence.dimmed()
        );
    }
    for result in &message.results {
        println!(
            "     {} {} {}",
            "→".dimmed(),
            result.intent.yellow(),
            result.reply
        );
    }
}

// ---------------------------------------------------------------------------
// vcdash traces / trace
// ---------------------------------------------------------------------------

/// Reload the trace list, printing degraded rows as warnings.
fn load_traces(backend: &HttpBackend, limit: usize) -> Result<TraceList> {
    let mut traces = TraceList::default();
    let degraded = traces.reload(backend, limit)?;
    for d in &degraded {
        eprintln!(
            "{} row {} shown without payload: {}",
            "warning:".yellow().bold(),
            d.row_id,
            d.reason
        );
    }
    Ok(traces)
}

/// List trace entries, newest first, narrowed by `filter`.
pub fn run_traces(filter: &TraceFilter, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let (cfg, backend) = connect();
    let traces = load_traces(&backend, limit.unwrap_or(cfg.traces.limit))?;
    let entries = traces.filtered(filter);

    if entries.is_empty() {
        println!("{}", "No trace entries match.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_traces_json(&entries)?,
        OutputFormat::Csv => print_traces_csv(&entries),
        OutputFormat::Table => print_traces_table(&entries, traces.len()),
    }

    Ok(())
}

fn print_traces_table(entries: &[&TraceEntry], total: usize) {
    println!(
        "{}",
        format!("Traces — {} of {}", entries.len(), total).bold().cyan()
    );
    println!("{}", "=".repeat(72));
    println!(
        "  {:>4} {:<8} {:<30} {:>4} {:>8} {:<16}",
        "#", "Id", "Input", "Cmds", "Latency", "Modules"
    );
    println!("  {}", "-".repeat(70));

    for (i, entry) in entries.iter().enumerate() {
        let modules: Vec<String> = entry.modules().into_iter().collect();
        let line = format!(
            "  {:>4} {:<8} {:<30} {:>4} {:>8} {:<16}",
            entry.display_index,
            truncate(&entry.id.to_string(), 8),
            truncate(&entry.user_input, 30),
            entry.command_count(),
            trace::format_latency(entry.latency_ms),
            truncate(&modules.join(","), 16),
        );

        if entry.degraded {
            println!("{}", line.yellow());
        } else if i % 2 == 0 {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_traces_json(entries: &[&TraceEntry]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(entries)?);
    Ok(())
}

fn print_traces_csv(entries: &[&TraceEntry]) {
    println!("index,id,user_input,commands,latency_ms,tokens,modules,degraded");
    for entry in entries {
        let modules: Vec<String> = entry.modules().into_iter().collect();
        println!(
            "{},{},{},{},{},{},{},{}",
            entry.display_index,
            entry.id,
            csv_field(&entry.user_input),
            entry.command_count(),
            entry.latency_ms,
            entry.token_count,
            csv_field(&modules.join(";")),
            entry.degraded,
        );
    }
}

/// Show one trace entry in detail.
pub fn run_trace(id: &str, limit: Option<usize>) -> Result<()> {
    let (cfg, backend) = connect();
    let traces = load_traces(&backend, limit.unwrap_or(cfg.traces.limit))?;
    let trace_id = TraceId::parse(id);
    let entry = traces
        .get(&trace_id)
        .with_context(|| format!("no trace entry with id {id} in the latest {} rows", traces.len()))?;

    println!(
        "{}",
        format!("Trace #{} ({})", entry.display_index, entry.id).bold().cyan()
    );
    println!("{}", "=".repeat(50));
    println!("  {} {}", "Input:   ".bold(), entry.user_input);
    println!("  {} {}", "Latency: ".bold(), trace::format_latency(entry.latency_ms));
    println!("  {} {}", "Tokens:  ".bold(), format_number(entry.token_count as usize));
    if let Some(created) = &entry.created_at {
        println!("  {} {}", "Time:    ".bold(), created);
    }
    if entry.degraded {
        println!("  {}", "stored payload could not be decoded".yellow());
    }
    if let Some(reply) = entry.reply() {
        println!("  {} {}", "Reply:   ".bold(), reply);
    }

    let commands = entry.commands();
    if !commands.is_empty() {
        println!();
        println!("{}", "Commands".bold().cyan());
        for (i, c) in commands.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, c.module, c.text);
        }
    }

    let results = entry.results();
    if !results.is_empty() {
        println!();
        println!("{}", "Results".bold().cyan());
        for r in &results {
            println!("  [{}] {} / {} — {}", r.module, r.intent, r.action, r.reply);
        }
    }

    println!();
    println!("{}", "Payload".bold().cyan());
    println!("{}", serde_json::to_string_pretty(&entry.payload)?);

    println!();
    println!("{}", "Replay".bold().cyan());
    println!("{}", entry.curl_command(backend.base_url()));

    Ok(())
}

// ---------------------------------------------------------------------------
// vcdash stats
// ---------------------------------------------------------------------------

/// Show aggregate statistics over the latest trace rows.
pub fn run_stats(limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let (cfg, backend) = connect();
    let traces = load_traces(&backend, limit.unwrap_or(cfg.traces.limit))?;
    let stats = reporter::build_stats(traces.entries());

    if stats.total_entries == 0 {
        println!(
            "{}",
            "No trace data yet. Send some messages with `vcdash chat` to see stats.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Csv => print_stats_csv(&stats),
        OutputFormat::Table => print_stats_table(&stats),
    }

    Ok(())
}

fn print_stats_table(stats: &TraceStats) {
    println!("{}", "vcdash Trace Report".bold().cyan());
    println!("{}", "=".repeat(60));
    println!();

    println!("  {} {}", "Total exchanges:".bold(), stats.total_entries);
    println!(
        "  {} {}",
        "Avg latency:    ".bold(),
        trace::format_latency(stats.avg_latency_ms.round() as u64)
    );
    println!(
        "  {} {}",
        "Total tokens:   ".bold(),
        format_number(stats.total_tokens as usize)
    );
    if stats.degraded > 0 {
        println!(
            "  {} {}",
            "Undecodable:    ".bold(),
            stats.degraded.to_string().yellow()
        );
    }
    println!();

    let dist = &stats.cardinality;
    println!("{}", "Command Cardinality".bold().cyan());
    println!(
        "  Single: {} ({:.0}%)  Multi: {} ({:.0}%)  None: {} ({:.0}%)",
        dist.single,
        dist.pct(dist.single),
        dist.multi,
        dist.pct(dist.multi),
        dist.empty,
        dist.pct(dist.empty),
    );
    println!();

    if !stats.module_stats.is_empty() {
        println!("{}", "Commands by Module".bold().cyan());
        println!("  {:<20} {:>10} {:>10}", "Module", "Commands", "Exchanges");
        println!("  {}", "-".repeat(42));

        for (i, m) in stats.module_stats.iter().take(15).enumerate() {
            let line = format!(
                "  {:<20} {:>10} {:>10}",
                truncate(&m.module, 20),
                m.commands,
                m.entries
            );
            if i % 2 == 0 {
                println!("{}", line);
            } else {
                println!("{}", line.dimmed());
            }
        }
    }
}

fn print_stats_csv(stats: &TraceStats) {
    println!("module,commands,exchanges");
    for m in &stats.module_stats {
        println!("{},{},{}", csv_field(&m.module), m.commands, m.entries);
    }
}

// ---------------------------------------------------------------------------
// vcdash kb
// ---------------------------------------------------------------------------

fn load_knowledge(backend: &HttpBackend) -> SnapshotManager {
    let mut manager = SnapshotManager::new();
    for warning in manager.refresh(backend) {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    manager
}

/// Show the active knowledge base, optionally searched.
pub fn run_kb_show(keyword: Option<&str>, domain: Option<&str>, format: OutputFormat) -> Result<()> {
    let (_, backend) = connect();
    let manager = load_knowledge(&backend);
    let kb = manager.knowledge();

    if kb.is_empty() {
        println!("{}", "Knowledge base is empty.".yellow());
        return Ok(());
    }

    let rows = kb.search(keyword, domain);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Csv => print_intents_csv(&rows),
        OutputFormat::Table => print_intents_table(&rows, kb.intents.len(), kb.rules.len(), manager.active()),
    }

    Ok(())
}

fn print_intents_table(rows: &[&IntentEntry], total: usize, rules: usize, active: Option<&KnowledgeSnapshot>) {
    let source = active.map(|s| s.name.as_str()).unwrap_or("-");
    println!(
        "{}",
        format!("Knowledge Base — {source}").bold().cyan()
    );
    println!("{}", "=".repeat(78));
    println!(
        "  {} {}   {} {}   {} {}",
        "Rules:".bold(),
        rules,
        "Intents:".bold(),
        total,
        "Shown:".bold(),
        rows.len()
    );
    println!();
    println!(
        "  {:>4} {:<10} {:<12} {:<12} {:<16} {:<20}",
        "#", "Domain", "Ability", "Feature", "Intent", "Query"
    );
    println!("  {}", "-".repeat(76));

    for (i, row) in rows.iter().enumerate() {
        let line = format!(
            "  {:>4} {:<10} {:<12} {:<12} {:<16} {:<20}",
            row.index,
            truncate(&row.domain, 10),
            truncate(&row.ability, 12),
            truncate(&row.feature, 12),
            truncate(&row.intent, 16),
            truncate(&row.query, 20),
        );
        if i % 2 == 0 {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_intents_csv(rows: &[&IntentEntry]) {
    println!("index,domain,ability,feature,intent,query");
    for r in rows {
        println!(
            "{},{},{},{},{},{}",
            r.index,
            csv_field(&r.domain),
            csv_field(&r.ability),
            csv_field(&r.feature),
            csv_field(&r.intent),
            csv_field(&r.query),
        );
    }
}

/// List knowledge snapshots.
pub fn run_kb_files(format: OutputFormat) -> Result<()> {
    let (_, backend) = connect();
    let manager = load_knowledge(&backend);
    let snapshots = manager.snapshots();

    if snapshots.is_empty() {
        println!("{}", "No knowledge files.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(snapshots)?),
        OutputFormat::Csv => {
            println!("id,name,origin,rules,intents,active");
            for s in snapshots {
                println!(
                    "{},{},{},{},{},{}",
                    csv_field(s.id.as_str()),
                    csv_field(&s.name),
                    s.origin,
                    s.rule_count,
                    s.intent_count,
                    s.active
                );
            }
        }
        OutputFormat::Table => print_snapshots_table(snapshots),
    }

    Ok(())
}

fn print_snapshots_table(snapshots: &[KnowledgeSnapshot]) {
    println!("{}", "Knowledge Files".bold().cyan());
    println!("{}", "=".repeat(70));
    println!(
        "  {:<2} {:<8} {:<28} {:<9} {:>7} {:>8}",
        "", "Id", "Name", "Origin", "Rules", "Intents"
    );
    println!("  {}", "-".repeat(68));

    for s in snapshots {
        let marker = if s.active { "●".green().bold() } else { " ".normal() };
        println!(
            "  {:<2} {:<8} {:<28} {:<9} {:>7} {:>8}",
            marker,
            truncate(s.id.as_str(), 8),
            truncate(&s.name, 28),
            s.origin.to_string(),
            format_number(s.rule_count as usize),
            format_number(s.intent_count as usize),
        );
    }
}

/// Upload a knowledge file.
pub fn run_kb_upload(path: &Path) -> Result<()> {
    let (_, backend) = connect();
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("upload path has no file name")?;

    let mut manager = SnapshotManager::new();
    let report = manager.upload(&backend, &bytes, file_name)?;

    println!(
        "{} Imported {} intents from {} ({} duplicates removed)",
        "✓".green().bold(),
        report.imported_intents,
        file_name.bold(),
        report.duplicates_removed
    );
    if let Some(active) = manager.active() {
        println!("  {} {}", "Active:".dimmed(), active.name);
    }
    Ok(())
}

/// Activate a snapshot by id.
pub fn run_kb_activate(id: &str) -> Result<()> {
    let (_, backend) = connect();
    let mut manager = SnapshotManager::new();
    manager.activate(&backend, &SnapshotId::new(id))?;

    let name = manager.active().map(|s| s.name.as_str()).unwrap_or(id);
    println!("{} Activated {}", "✓".green().bold(), name.bold());
    println!(
        "  {}",
        format!("{} intents loaded", manager.knowledge().intents.len()).dimmed()
    );
    Ok(())
}

/// Delete a snapshot by id. The current list is loaded first so a system
/// snapshot is refused locally.
pub fn run_kb_delete(id: &str) -> Result<()> {
    let (_, backend) = connect();
    let mut manager = load_knowledge(&backend);
    manager.delete(&backend, &SnapshotId::new(id))?;
    println!("{} Deleted knowledge file {}", "✓".green().bold(), id.bold());
    Ok(())
}

/// Save `/knowledge/export` or `/knowledge/template` to disk, unparsed.
pub fn run_kb_download(path: &str, out: Option<&Path>, fallback_name: &str) -> Result<()> {
    let (_, backend) = connect();
    let download = backend.download(path)?;

    let target: PathBuf = match out {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(download.file_name.as_deref().unwrap_or(fallback_name)),
    };
    std::fs::write(&target, &download.bytes)
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!(
        "{} Saved {} bytes to {}",
        "✓".green().bold(),
        format_number(download.bytes.len()),
        target.display()
    );
    Ok(())
}

pub fn run_kb_export(out: Option<&Path>) -> Result<()> {
    run_kb_download(knowledge::EXPORT_PATH, out, "knowledge_export.xlsx")
}

pub fn run_kb_template(out: Option<&Path>) -> Result<()> {
    run_kb_download(knowledge::TEMPLATE_PATH, out, "knowledge_template.xlsx")
}

// ---------------------------------------------------------------------------
// vcdash api
// ---------------------------------------------------------------------------

/// `POST /chat/recognize`: print the raw JSON and round-trip time.
pub fn run_api_recognize(message: &str) -> Result<()> {
    let (_, backend) = connect();
    let started = Instant::now();
    let body = backend.recognize(message)?;
    print_api_result("POST /chat/recognize", started, &body)
}

/// `POST /chat/execute` with `MODULE:TEXT` items.
pub fn run_api_execute(items: &[String]) -> Result<()> {
    let commands = items
        .iter()
        .map(|item| parse_command_item(item))
        .collect::<Result<Vec<_>>>()?;

    let (_, backend) = connect();
    let started = Instant::now();
    let body = backend.execute(&commands)?;
    print_api_result("POST /chat/execute", started, &body)
}

fn parse_command_item(item: &str) -> Result<CommandItem> {
    let (module, text) = item
        .split_once(':')
        .with_context(|| format!("expected MODULE:TEXT, got '{item}'"))?;
    if module.trim().is_empty() || text.trim().is_empty() {
        anyhow::bail!("expected MODULE:TEXT, got '{item}'");
    }
    Ok(CommandItem {
        module: module.trim().to_string(),
        text: text.trim().to_string(),
    })
}

fn print_api_result(label: &str, started: Instant, body: &serde_json::Value) -> Result<()> {
    let elapsed = started.elapsed().as_millis() as u64;
    println!(
        "{} {}",
        label.bold().cyan(),
        format!("({})", trace::format_latency(elapsed)).dimmed()
    );
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// vcdash config show | init | set | reset
// ---------------------------------------------------------------------------

/// `vcdash config show`: resolved values plus which files exist.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective vcdash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.vcdash/config.toml", global_exists);
    print_source(".vcdash.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "VCDASH_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.vcdash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Edit the file to point vcdash at your backend.".dimmed());
    Ok(())
}

/// `vcdash config set KEY VALUE`
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// `vcdash config reset`
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `1234567` -> `1,234,567`.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Cut to at most `max_len` chars, marking the cut with `…`.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("打开空调导航去公司", 5), "打开空调…");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_str_opt(Some("yaml")), OutputFormat::Table);
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("AC"), "AC");
        assert_eq!(csv_field("打开空调，导航"), "打开空调，导航");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_command_item() {
        let item = parse_command_item("AC: 打开空调").unwrap();
        assert_eq!(item.module, "AC");
        assert_eq!(item.text, "打开空调");
        assert!(parse_command_item("no-separator").is_err());
        assert!(parse_command_item(":text").is_err());
    }
}
