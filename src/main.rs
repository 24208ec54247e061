//! Personality MCP Server - five collaborating personalities over stdio.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use personality_mcp::{
    AliasTable, Coordinator, CoordinatorConfig, PersonalityMcpServer, PersonalityRegistry,
    SessionStore, TemplateGenerator,
};

/// Personality MCP Server - multi-personality collaboration for MCP clients.
#[derive(Parser, Debug)]
#[command(name = "personality-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, default_value = "false")]
    json_logs: bool,

    /// Seconds to wait for one personality's response before giving up on it.
    #[arg(long, default_value = "30")]
    generation_timeout_secs: u64,

    /// Priority recorded when a task is assigned without one.
    #[arg(long, default_value = "medium")]
    default_priority: String,

    /// Extra personality alias, as NAME=ID (repeatable), e.g. --alias qa=guardian.
    #[arg(long = "alias", value_name = "NAME=ID")]
    aliases: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging - output to stderr to avoid interfering with MCP protocol
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("Personality MCP Server starting");

    let mut aliases = AliasTable::default();
    for entry in &args.aliases {
        let (alias, id) = AliasTable::parse_entry(entry)?;
        info!("Alias {} -> {}", alias, id);
        aliases.insert(alias, id);
    }

    let config = CoordinatorConfig {
        generation_timeout: Duration::from_secs(args.generation_timeout_secs),
        default_priority: args.default_priority,
    };
    let coordinator = Coordinator::with_parts(
        PersonalityRegistry::with_aliases(aliases),
        SessionStore::new(),
        Arc::new(TemplateGenerator::new()),
        config,
    );

    // Create and run server
    let mut server = PersonalityMcpServer::new(coordinator);
    server.run_stdio().await?;

    Ok(())
}
