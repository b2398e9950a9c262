//! Command-line front end: resolve configuration, print the pairing banner
//! and QR code, then hand the process over to the core server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use share_core::{ShareConfig, ShareServer, Storage, pairing};

#[derive(Parser)]
#[command(name = "share", version, about = "LAN file exchange through a browser page")]
struct Cli {
    /// Listening port (default: SHARE_PORT, then 8000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Storage directory (default: SHARE_DIR, then shared/ next to the executable)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server and block until the Stop button or Ctrl+C
    Runserver {
        /// Open the page in the local browser once the server is up
        #[arg(long)]
        open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 0. Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ShareConfig::resolve(cli.port, cli.dir);
    let storage = Storage::open(&config.storage_dir).await?;

    match cli.command {
        Some(Command::Runserver { open }) => runserver(config, storage, open).await,
        None => preview(&config, &storage),
    }
}

async fn runserver(config: ShareConfig, storage: Storage, open_browser: bool) -> Result<()> {
    // 1. Bind first so a taken port fails before anything is printed
    let server = ShareServer::bind(&config, storage.clone()).await?;
    let url = server.share_url().to_string();

    banner(&storage, &url);
    match pairing::qr_terminal(&url) {
        Ok(qr) => println!("{qr}"),
        Err(e) => tracing::warn!("QR preview unavailable: {e}"),
    }
    println!("Server running... (Stop button on the page, or Ctrl+C)");

    // 2. Ctrl+C flips the same switch as the Stop button
    let lifecycle = server.lifecycle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping server...");
            lifecycle.trigger_shutdown();
        }
    });

    // 3. Point the local browser at the page once the listener is up
    if open_browser {
        let url = url.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            if let Err(e) = open::that(&url) {
                tracing::warn!("cannot open browser: {e}");
            }
        });
    }

    server.run().await?;
    Ok(())
}

/// No subcommand: show where the server would point and how to start it.
fn preview(config: &ShareConfig, storage: &Storage) -> Result<()> {
    let url = pairing::share_url(config.port);
    banner(storage, &url);
    println!("{}", pairing::qr_terminal(&url)?);
    println!("QR Code preview generated. To run the server, use:");
    println!("    share runserver");
    Ok(())
}

fn banner(storage: &Storage, url: &str) {
    println!("\n{}", "=".repeat(40));
    println!(" SHARE WEB APP");
    println!("{}", "=".repeat(40));
    println!(" Folder: {}", storage.root().display());
    println!(" URL:    {url}");
    println!("{}", "-".repeat(40));
}
