use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Resolve, edit and inspect the active alert filter set
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML config with query key, storage key and default filters
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON file used as persistent storage for saved filters
    #[arg(
        short,
        long,
        global = true,
        env = "ALERT_FILTERS_STORAGE",
        default_value = ".alert-filters.json"
    )]
    pub storage: PathBuf,

    /// Current location, e.g. "/?q=severity%3Dcritical"
    #[arg(short, long, global = true, default_value = "/")]
    pub location: String,

    /// Output format
    #[arg(short = 'F', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// When to color text output
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the active filters from location, saved filters or defaults
    Resolve {
        /// Default filter, overrides the configured defaults (repeatable)
        #[arg(short, long = "default")]
        defaults: Vec<String>,
    },
    /// Add filters to the resolved set
    Add {
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Remove filters from the resolved set
    Remove {
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Replace the resolved set
    Set { tokens: Vec<String> },
    /// Remove every filter, saving the empty selection
    Clear,
    /// Forget saved filters so defaults apply again
    Forget,
    /// Parse filter tokens and show their structure
    Parse {
        #[arg(required = true)]
        tokens: Vec<String>,
    },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
