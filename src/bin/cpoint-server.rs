// ABOUTME: Server binary for the C-Point community platform
// ABOUTME: Parses CLI overrides, initializes logging and runs the HTTP server until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # C-Point Server Binary
//!
//! Configuration comes from the environment; the flags below override it.

use anyhow::Result;
use clap::Parser;
use cpoint_server::config::{DatabaseUrl, ServerConfig};
use cpoint_server::{logging, server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cpoint-server")]
#[command(about = "C-Point community platform API server")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the listen address
    #[arg(long)]
    host: Option<String>,

    /// Override the database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(url) = args.database_url {
        config.database_url = DatabaseUrl::parse_url(&url)?;
    }
    config.validate()?;

    logging::init_from_env()?;
    info!("Starting C-Point server");
    info!("{}", config.summary());

    if let Err(e) = server::run(config).await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}
