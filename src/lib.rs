pub mod address;
pub mod cli;
pub mod config;
pub mod filter;
pub mod storage;
pub mod store;
pub mod sync;

use anyhow::{Context, bail};
use colored::Colorize;
use serde_json::json;
use std::fmt::Write;
use tracing_subscriber::EnvFilter;

pub use address::{AddressSource, AddressSync, MemoryAddress};
pub use cli::{Cli, ColorMode, Commands, OutputFormat, cli_parse};
pub use config::{EngineConfig, load_config};
pub use filter::{Filter, FilterParseError, Matcher, Operator, parse_matcher};
pub use storage::{
    FileStorage, MemoryStorage, Persistence, SavedFilters, StorageError, StorageSource,
};
pub use store::{ChangeKind, FilterChange, FilterRef, FilterStore, Subscription};
pub use sync::{FilterSource, FilterSync, Resolution};

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if let Err(e) = subscriber.try_init() {
        eprintln!("Failed to init tracing subscriber: {e}");
    }
}

fn filter_json(filter: &Filter) -> serde_json::Value {
    json!({
        "raw": filter.raw(),
        "name": filter.matcher_name(),
        "operator": filter.operator(),
        "value": filter.matcher_value(),
        "is_regex": filter.is_regex(),
        "applied": filter.applied(),
        "hits": filter.hits(),
        "error": filter.error().map(|e| e.to_string()),
    })
}

fn format_filter_line(index: usize, filter: &Filter) -> String {
    match (filter.matcher(), filter.error()) {
        (Some(m), _) => format!(
            "{:>3}. {:<32} name={} op={} value={}{}",
            index + 1,
            filter.raw(),
            m.name(),
            m.operator(),
            m.value(),
            if m.is_regex() { " (regex)".cyan() } else { "".normal() }
        ),
        (None, Some(err)) => format!(
            "{:>3}. {:<32} {}: {}",
            index + 1,
            filter.raw().yellow(),
            "invalid".red(),
            err
        ),
        (None, None) => format!("{:>3}. {}", index + 1, filter.raw()),
    }
}

/// Render the resolved state in the selected format
pub fn format_state<S: StorageSource>(
    sync: &FilterSync<MemoryAddress, S>,
    format: OutputFormat,
) -> String {
    let filters = sync.filters();
    match format {
        OutputFormat::Json => {
            let value = json!({
                "source": sync.resolution().source,
                "location": sync.address().location(),
                "filters": filters.iter().map(filter_json).collect::<Vec<_>>(),
            });
            serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize state: {e}\"}}"))
        }
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "Source: {}", sync.resolution().source.as_str().bold());
            let _ = writeln!(out, "Location: {}", sync.address().location());
            if filters.is_empty() {
                let _ = writeln!(out, "No active filters.");
            } else {
                let _ = writeln!(out, "Active filters ({}):", filters.len());
                for (idx, filter) in filters.iter().enumerate() {
                    let _ = writeln!(out, "{}", format_filter_line(idx, filter));
                }
            }
            out
        }
    }
}

fn print_parsed(tokens: &[String], format: OutputFormat) -> usize {
    let filters: Vec<Filter> = tokens.iter().map(|t| Filter::new(t)).collect();
    match format {
        OutputFormat::Json => {
            let value: Vec<_> = filters.iter().map(filter_json).collect();
            match serde_json::to_string_pretty(&value) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error serializing output: {e}"),
            }
        }
        OutputFormat::Text => {
            for (idx, filter) in filters.iter().enumerate() {
                println!("{}", format_filter_line(idx, filter));
            }
        }
    }
    filters.iter().filter(|f| !f.is_valid()).count()
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    let mut config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    if let Commands::Resolve { defaults } = &cli.command
        && !defaults.is_empty()
    {
        config.default_filters = defaults.clone();
    }

    if let Commands::Parse { tokens } = &cli.command {
        let failed = print_parsed(tokens, cli.format);
        if failed > 0 {
            bail!("{failed} of {} filters failed to parse", tokens.len());
        }
        return Ok(());
    }

    tracing::info!(
        storage = %cli.storage.display(),
        location = %cli.location,
        "resolving filters"
    );
    let mut sync = FilterSync::new(
        MemoryAddress::new(&cli.location),
        FileStorage::new(&cli.storage),
        &config,
    );

    match &cli.command {
        Commands::Resolve { .. } | Commands::Parse { .. } => {}
        Commands::Add { tokens } => {
            for token in tokens {
                if !sync.add(token) {
                    tracing::info!(token = %token, "filter already active");
                }
            }
        }
        Commands::Remove { tokens } => {
            for token in tokens {
                if sync.remove(token).is_none() {
                    tracing::warn!(token = %token, "filter not active");
                }
            }
        }
        Commands::Set { tokens } => sync.replace_all(tokens),
        Commands::Clear => sync.replace_all(Vec::<String>::new()),
        Commands::Forget => {
            sync.forget_saved().with_context(|| {
                format!("Failed to forget saved filters in '{}'", cli.storage.display())
            })?;
            if !cli.quiet {
                eprintln!("Saved filters forgotten.");
            }
        }
    }

    print!("{}", format_state(&sync, cli.format));
    if cli.format == OutputFormat::Json {
        println!();
    }
    Ok(())
}
