//! confkv CLI.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use confkv::store::{ImportMode, ListOptions};

mod commands;

use commands::StoreContext;
use commands::config::{self as config_cmd, emit};
use commands::serve::{self, ServeOverrides};

/// Typed key/value configuration store.
///
/// Reads and writes a local SQLite database by default, or a remote confkv
/// server when `--remote` (or `CONFKV_API_URL`) is set.
#[derive(Parser)]
#[command(name = "confkv")]
#[command(version)]
#[command(about = "Typed key/value configuration store")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Path to the local SQLite config database
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Remote confkv API URL
    #[arg(long, global = true, env = "CONFKV_API_URL", value_name = "URL")]
    remote: Option<String>,

    /// Settings file (default: ./confkv.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log output format
    #[arg(
        long,
        global = true,
        value_enum,
        env = "CONFKV_LOG_FORMAT",
        default_value = "text"
    )]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Config(ConfigCommand),
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// PostgreSQL URL (uses the SQLite --db file or memory when unset)
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    ///
    /// Values are parsed leniently: null/true/false, numbers, JSON
    /// documents, quoted strings, or plain text.
    Set {
        /// Configuration key
        key: String,
        /// Value (JSON or plain text)
        #[arg(conflicts_with = "stdin", required_unless_present = "stdin")]
        value: Option<String>,
        /// Read the value from standard input
        #[arg(long)]
        stdin: bool,
    },
    /// Remove a configuration key
    Unset {
        /// Configuration key
        key: String,
    },
    /// List configuration keys
    List {
        /// Limit results to keys with the given prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Maximum number of entries to return
        #[arg(long)]
        limit: Option<u64>,
        /// Number of entries to skip
        #[arg(long)]
        offset: Option<u64>,
        /// Include values in plain output
        #[arg(long)]
        values: bool,
    },
    /// Import configuration entries from a JSON object
    Import {
        /// JSON file to import
        #[arg(long, conflicts_with = "stdin", required_unless_present = "stdin")]
        file: Option<PathBuf>,
        /// Read JSON from standard input
        #[arg(long)]
        stdin: bool,
        /// Import mode (merge or replace)
        #[arg(long, default_value = "merge")]
        mode: ImportMode,
    },
    /// Export configuration entries as a JSON object
    Export {
        /// Limit export to keys with the given prefix
        #[arg(long)]
        prefix: Option<String>,
    },
}

/// Initialize stderr logging; stdout is reserved for command output.
fn init_logging(format: LogFormat, default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = cli.global;

    // The server logs its lifecycle; one-shot commands only surface problems.
    let default_level = if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    };
    init_logging(global.log_format, default_level);

    let settings = commands::load_settings(global.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            database_url,
        } => {
            let overrides = ServeOverrides {
                host,
                port,
                database_url,
                db: global.db,
            };
            serve::execute(settings, overrides).await
        },
        Commands::Config(command) => {
            let ctx =
                StoreContext::resolve(global.db.as_deref(), global.remote.as_deref(), &settings)?;
            run_config_command(&ctx, command, global.json).await
        },
    }
}

async fn run_config_command(ctx: &StoreContext, command: ConfigCommand, json: bool) -> Result<()> {
    match command {
        ConfigCommand::Get { key } => emit(&config_cmd::get(ctx, &key).await?, json),
        ConfigCommand::Set { key, value, .. } => {
            emit(&config_cmd::set(ctx, &key, value.as_deref()).await?, json)
        },
        ConfigCommand::Unset { key } => emit(&config_cmd::unset(ctx, &key).await?, json),
        ConfigCommand::List {
            prefix,
            limit,
            offset,
            values,
        } => {
            let options = ListOptions {
                prefix,
                include_values: Some(values),
                limit,
                offset,
            };
            emit(&config_cmd::list(ctx, options).await?, json)
        },
        ConfigCommand::Import { file, mode, .. } => {
            emit(&config_cmd::import(ctx, file.as_deref(), mode).await?, json)
        },
        ConfigCommand::Export { prefix } => emit(&config_cmd::export(ctx, prefix).await?, json),
    }
}
