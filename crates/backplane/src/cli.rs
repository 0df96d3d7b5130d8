//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};

/// Redis scale-out backplane tool.
#[derive(Debug, Parser)]
#[command(name = "backplane")]
#[command(version, about = "Redis scale-out backplane tool", long_about = None)]
pub struct Cli {
    /// Redis connection string (URL or StackExchange-style options).
    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    pub url: String,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    /// Suppress non-essential output.
    #[arg(long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print scale-out messages received on a channel until Ctrl+C.
    Subscribe {
        /// Channel to subscribe to.
        channel: String,
    },
    /// Publish a payload through the publish script.
    Publish {
        /// Channel and sequence key.
        key: String,
        /// Payload bytes (UTF-8).
        payload: String,
        /// Logical database holding the sequence counter.
        #[arg(long, short, env = "BACKPLANE_DATABASE", default_value_t = 0)]
        database: u32,
    },
    /// Evaluate a Lua script with one key and one argument.
    Eval {
        /// Lua source.
        script: String,
        /// Value of KEYS[1].
        key: String,
        /// Value of ARGV[1].
        #[arg(default_value = "")]
        argument: String,
        /// Logical database to run the script on.
        #[arg(long, short, env = "BACKPLANE_DATABASE", default_value_t = 0)]
        database: u32,
    },
}
