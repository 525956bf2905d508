mod auth;
mod billing;
mod cli;
mod commands;
mod config;
mod entitlement;
mod error;
mod mcp;
mod page_range;
mod pdf;
mod raster;
mod server;
mod sqlite;
mod usage;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the MCP transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesmith=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            server::run(args.into()).await?;
        }
        Commands::Mcp => {
            mcp::run_server().await?;
        }
        Commands::Split {
            path,
            pages,
            output,
        } => {
            println!("{}", commands::split::run(&path, &pages, &output)?);
        }
        Commands::Merge { inputs, output } => {
            println!("{}", commands::merge::run(&inputs, &output)?);
        }
        Commands::Compress { path, output } => {
            println!("{}", commands::compress::run(&path, &output)?);
        }
        Commands::Resize {
            path,
            width,
            height,
            output,
        } => {
            println!("{}", commands::resize::run(&path, width, height, &output)?);
        }
        Commands::Convert {
            path,
            format,
            output,
        } => {
            println!("{}", commands::convert::run(&path, &format, &output)?);
        }
        Commands::ImagesToPdf { inputs, output } => {
            println!("{}", commands::images_to_pdf::run(&inputs, &output)?);
        }
    }

    Ok(())
}
