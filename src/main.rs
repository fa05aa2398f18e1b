use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use sql_cache_cli::config::Config;
use sql_cache_cli::repl;
use sql_cache_cli::services::{
    CacheLayer, CachePolicy, CachedQueryService, MemoryCache, PostgresGateway, RedisCache,
    StoreGateway,
};

#[derive(Parser)]
#[command(name = "sql-cache")]
#[command(about = "Run SQL queries against PostgreSQL with results cached in Redis", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "SQL_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the cache time-to-live in seconds
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Keep results in process memory instead of Redis
    #[arg(long, default_value_t = false)]
    memory_cache: bool,

    /// Run a single query and exit instead of prompting
    #[arg(short, long)]
    execute: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    if let Some(ttl_secs) = cli.ttl_secs {
        config.cache.ttl_secs = ttl_secs;
    }

    // Initialize logging; stdout is reserved for prompts and results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let service = connect(&config, cli.memory_cache).await?;

    let result = match cli.execute {
        Some(query) => match service.execute(&query).await {
            Ok(table) => {
                println!("{}", table);
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Query failed")),
        },
        None => repl::run(
            &service,
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await
        .context("Interactive session failed"),
    };

    service.close().await;
    info!("Connections closed");

    result
}

/// Open the store and cache; either failing aborts startup
async fn connect(config: &Config, memory_cache: bool) -> anyhow::Result<CachedQueryService> {
    let store = PostgresGateway::connect(&config.store).await.map_err(|e| {
        error!("Failed to connect to the database: {}", e);
        e
    })?;

    let cache: Box<dyn CacheLayer> = if memory_cache {
        info!("Using in-process result cache");
        Box::new(MemoryCache::default())
    } else {
        match RedisCache::connect(&config.cache).await {
            Ok(cache) => Box::new(cache),
            Err(e) => {
                error!("Failed to connect to the cache: {}", e);
                store.close().await;
                return Err(e.into());
            }
        }
    };

    let policy = CachePolicy::from_config(&config.cache);
    info!(
        "Caching results for {}s (strict writes: {}, strict payloads: {})",
        policy.ttl.as_secs(),
        policy.strict_writes,
        policy.strict_payloads
    );

    Ok(CachedQueryService::new(Box::new(store), cache, policy))
}
