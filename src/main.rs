use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tooldepot::config::Config;
use tooldepot::server;
use tooldepot::transfer;

/// Tooldepot - agent binary distribution and caching service
#[derive(Parser, Debug)]
#[command(name = "tooldepot")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Fetch one version into the store and write it to --output instead of serving
    #[arg(long, value_name = "VERSION")]
    export: Option<String>,

    /// Destination file for --export
    #[arg(short, long, requires = "export")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }),
        None => Config::default(),
    };

    tooldepot::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    tracing::info!(
        config_file = ?args.config,
        server_address = %config.server.address,
        server_port = config.server.port,
        storage_backend = ?config.storage.backend,
        index_url = ?config.remote.index_url,
        static_candidates = config.remote.candidates.len(),
        coalescing = config.coalescing.enabled,
        "Configuration loaded successfully"
    );

    if args.test {
        println!("configuration is valid");
        return Ok(());
    }

    let state = server::build_state(&config).await?;

    if let Some(version) = args.export {
        let output = args
            .output
            .unwrap_or_else(|| PathBuf::from(format!("{}.tgz", version)));
        let (metadata, handles) = state.downloader.get_tools(&version).await?;
        let mut file = tokio::fs::File::create(&output)
            .await
            .with_context(|| format!("cannot create {}", output.display()))?;
        let written = transfer::send(&mut file, &metadata, handles).await?;
        tracing::info!(
            version = %metadata.version,
            sha256 = %metadata.sha256,
            bytes = written,
            output = %output.display(),
            "Exported agent binaries"
        );
        return Ok(());
    }

    let listen_addr = config.server.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", listen_addr))?;

    tracing::info!(address = %listen_addr, "Starting tooldepot");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
