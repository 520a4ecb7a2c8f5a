use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use threadseek_core::Config;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// JSON configuration file (query defaults such as top_k)
    #[arg(long)]
    config: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let app: Router = build_app(args.index.clone(), config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
