//! Clap derive structures for the `cardwatch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cardwatch -- live RFID attendance from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "cardwatch",
    version,
    about = "Watch RFID attendance live and manage the card roster",
    long_about = "Follows the attendance backend's event stream and REST API.\n\n\
        `cardwatch watch` shows check-ins as they happen; the other commands\n\
        query or modify the roster and attendance log once and exit.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "CARDWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API root (overrides profile), e.g. http://localhost:3000/api
    #[arg(long, env = "CARDWATCH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format [default: config `defaults.output`, else table]
    #[arg(
        long = "output",
        short = 'o',
        env = "CARDWATCH_OUTPUT",
        global = true
    )]
    pub output_flag: Option<OutputFormat>,

    /// Effective format: the flag, else the config default.
    #[arg(skip)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CARDWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "CARDWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the live event stream until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage registered users and their cards
    #[command(alias = "u")]
    Users(UsersArgs),

    /// Show the attendance log (today by default)
    #[command(alias = "att", alias = "a")]
    Attendance(AttendanceArgs),

    /// Show who is currently checked in
    Present,

    /// Summary counters for today
    Stats,

    /// Check that the backend is reachable
    Health,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Restrict the attendance snapshot to today
    #[arg(long)]
    pub today: bool,

    /// Do not print snapshot refresh summaries
    #[arg(long)]
    pub no_snapshots: bool,
}

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List all registered users
    #[command(alias = "ls")]
    List,

    /// Register a new user with their card
    Create {
        /// Display name
        #[arg(long)]
        name: String,

        /// Card UID as read by the reader
        #[arg(long)]
        card_uid: String,
    },

    /// Rename a user or reassign their card
    Update {
        /// User ID
        id: i64,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New card UID
        #[arg(long)]
        card_uid: Option<String>,
    },

    /// Allow the user's card to register attendance
    Enable {
        /// User ID
        id: i64,
    },

    /// Stop the user's card from registering attendance
    Disable {
        /// User ID
        id: i64,
    },

    /// Delete a user
    #[command(alias = "rm")]
    Delete {
        /// User ID
        id: i64,
    },
}

// ── Attendance ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AttendanceArgs {
    /// Day to show (YYYY-MM-DD); defaults to today
    #[arg(long, conflicts_with = "all_dates")]
    pub date: Option<String>,

    /// Earliest time of day (HH:MM)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest time of day (HH:MM)
    #[arg(long)]
    pub to: Option<String>,

    /// Show every day instead of today
    #[arg(long)]
    pub all_dates: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or extend the config file with a profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// REST API root; prompted for when omitted
        #[arg(long = "url")]
        url: Option<String>,
    },

    /// Display current resolved configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key: api_url, stream_path, insecure, timeout, present_refresh
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Print the config file location
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
