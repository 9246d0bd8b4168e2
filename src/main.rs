//! `lineage` — trace upstream data lineage.
//!
//! Usage:
//!   lineage [--db <path> | --snapshot <file.json>] serve [--addr <host:port>]
//!   lineage trace <node_id> [--format json|dot|text]
//!   lineage search [query] [--limit <n>]
//!   lineage ingest <facts.json>
//!   lineage mcp

use anyhow::Result;
use clap::{Parser, Subcommand};
use lineage_trace::app::engine::LineageEngine;
use lineage_trace::cli::{self, TraceFormat};
use lineage_trace::config::Settings;
use lineage_trace::server::http;
use lineage_trace::server::mcp::LineageMcpServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lineage")]
#[command(about = "Trace upstream data lineage over a SQLite lineage store")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./lineage.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path; ":memory:" for a throwaway database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Serve from a JSON snapshot held in memory instead of SQLite
    #[arg(long, global = true, conflicts_with = "db")]
    snapshot: Option<PathBuf>,

    /// Maximum number of hops walked upstream
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address
        #[arg(long)]
        addr: Option<SocketAddr>,

        /// Per-request timeout in seconds (0 disables)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Run as an MCP server on stdio
    Mcp,

    /// Print the upstream lineage graph of a node
    Trace {
        node_id: i64,

        #[arg(short, long, value_enum, default_value = "json")]
        format: TraceFormat,
    },

    /// Search nodes by table, column or procedure name
    Search {
        #[arg(default_value = "")]
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Append lineage facts from a JSON file ({"nodes": [...], "edges": [...]})
    Ingest { file: PathBuf },

    /// Show store location and size
    Health,
}

fn init_tracing() {
    // stderr keeps stdout clean for command output and the MCP stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::discover(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.store.path = db;
    }
    if cli.max_depth.is_some() {
        settings.resolver.max_depth = cli.max_depth;
    }

    let engine = match &cli.snapshot {
        Some(path) => LineageEngine::load_snapshot(path, settings.resolver)?,
        None => LineageEngine::open_sqlite(&settings.store, settings.resolver)?,
    };

    match cli.command {
        Commands::Serve { addr, timeout_secs } => {
            let addr = addr.unwrap_or(settings.server.addr);
            let timeout_secs = timeout_secs.unwrap_or(settings.server.request_timeout_secs);
            let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
            http::serve(engine, addr, timeout).await
        }
        Commands::Mcp => LineageMcpServer::new(engine).serve_stdio().await,
        Commands::Trace { node_id, format } => {
            cli::trace_lineage(&engine, node_id, None, format)
        }
        Commands::Search { query, limit } => cli::search_nodes(&engine, &query, limit),
        Commands::Ingest { file } => cli::ingest_file(&engine, &file),
        Commands::Health => cli::print_health(&engine),
    }
}
