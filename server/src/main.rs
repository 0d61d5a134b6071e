use anyhow::Result;
use axum::Router;
use clap::{Parser, Subcommand};
use spindex_core::config::DEFAULT_RESULT_LIMIT;
use spindex_core::persist::IndexPaths;
use spindex_core::search::QueryEngine;
use spindex_server::{build_app, run_repl};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "search")]
#[command(about = "Query an index built by `indexer build`")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive prompt, `!quit` to exit
    Repl {
        /// Index directory path
        #[arg(long, default_value = "./index")]
        index: String,
        /// Number of results to show
        #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
        limit: usize,
    },
    /// Serve queries over HTTP
    Serve {
        /// Index directory path
        #[arg(long, default_value = "./index")]
        index: String,
        /// Host to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Default number of results when a request omits `k`
        #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Repl { index, limit } => {
            let engine = QueryEngine::open(&IndexPaths::new(&index), limit)?;
            run_repl(&engine, io::stdin().lock(), io::stdout().lock())
        }
        Commands::Serve { index, host, port, limit } => {
            let app: Router = build_app(&index, limit)?;
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            tokio::runtime::Runtime::new()?.block_on(serve(app, addr))
        }
    }
}

async fn serve(app: Router, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
