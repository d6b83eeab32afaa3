use anyhow::Result;
use axum::Router;
use clap::Parser;
use minblast_core::config::SearchConfig;
use server::{build_app, Backend, ServerConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, env = "BLAST_INDEX_LOCATION", default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Where minimizer postings are looked up
    #[arg(long, value_enum, env = "BLAST_INDEX_BACKEND", default_value_t = Backend::Flat)]
    backend: Backend,
    /// Base URL of the search service (remote backend)
    #[arg(long, env = "BLAST_REMOTE_URL")]
    remote_url: Option<String>,
    /// Index name on the search service (remote backend)
    #[arg(long, env = "BLAST_REMOTE_INDEX", default_value = "sequences")]
    remote_index: String,
    /// Fraction of retained minimizers to check, rarest first
    #[arg(long, default_value_t = 0.5)]
    results_frac: f64,
    /// Check at least this many minimizers when available
    #[arg(long, default_value_t = 10)]
    min_to_check: usize,
    /// Candidates resolved and aligned per query
    #[arg(long, default_value_t = 50)]
    max_results: usize,
    /// Per-query wall-clock limit
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        index_dir: args.index.into(),
        backend: args.backend,
        remote_url: args.remote_url,
        remote_index: args.remote_index,
        search: SearchConfig {
            results_frac: args.results_frac,
            min_to_check: args.min_to_check,
            max_results: args.max_results,
            timeout_ms: args.timeout_ms,
        },
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    let app: Router = build_app(config).await?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
