use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_relay::proxy::{self, ProxyPool};
use transcript_relay::{Cli, Commands, Config, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let command = cli.command();
    let mut config = match &command {
        Commands::Config { show: false } => Config::load_or_default(cli.config.as_deref())?,
        _ => Config::load(cli.config.as_deref())?,
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;

    match command {
        Commands::Serve => {
            let pool = load_proxies(&config).await;
            let server = Server::new(&config, pool.clone())?;

            print_banner(&pool, &server);
            server.run().await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::config_path()?,
                };
                config.save(&path)?;
                println!("Configuration written to: {}", path.display());
            }
        }
        Commands::Proxies => {
            let pool = load_proxies(&config).await;
            println!("Loaded {} proxies", pool.len());
            for endpoint in pool.endpoints() {
                println!("  • {}", endpoint);
            }
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "transcript_relay=debug,tower_http=debug"
    } else {
        "transcript_relay=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.proxy_url {
        config.proxy.source_url = Some(url.clone());
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

async fn load_proxies(config: &Config) -> ProxyPool {
    match &config.proxy.source_url {
        Some(url) => proxy::load_pool(url, config.proxy_fetch_timeout()).await,
        None => {
            tracing::warn!("No proxy source configured, using direct connection");
            ProxyPool::empty()
        }
    }
}

fn print_banner(pool: &ProxyPool, server: &Server) {
    let rule = "=".repeat(50);
    let base = format!("http://{}", server.listen_address());

    println!("{}", rule);
    println!("{}", style("YouTube Transcript API Server").bold());
    println!("{}", rule);
    if pool.is_empty() {
        println!("Mode: {}", style("Direct connection (no proxies loaded)").yellow());
    } else {
        println!(
            "Mode: {}",
            style(format!("Authenticated proxy mode ({} proxies)", pool.len())).green()
        );
    }
    println!("{}", rule);
    println!("Server running on: {}", base);
    println!("Health check:      {}/", base);
    println!("Transcript API:    {}/transcript/<video_id>", base);
    println!("Batch API:         {}/transcript/batch", base);
    println!("\nPress Ctrl+C to stop the server");
    println!("{}", rule);
}
