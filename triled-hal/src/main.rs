//! TriLED lights service
//!
//! Drives the LCD backlight and the shared RGB indicator LED through sysfs,
//! taking requests over a local line protocol.
//!
//! Usage: cargo run -p triled-hal -- --config /etc/triled.json

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use triled_lights_lib::PanelConfig;

mod config;
mod light;
mod server;
mod sinks;

use config::{Config, LogLevel};
use light::Light;
use server::Server;
use sinks::Sinks;

/// Serve light requests for the shared indicator LED and backlight.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Directory every sysfs path is resolved against (overrides the config file)
    #[arg(long)]
    sysfs_root: Option<PathBuf>,
}

/// Install the logger.
///
/// `RUST_LOG`, when set, picks the filters; otherwise logging starts at
/// `info` until the config file's level is known.
fn init_logging(rust_log: Option<&str>) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Trace);
    if let Some(filters) = rust_log {
        builder.parse_filters(filters);
    }
    builder.init();
    if rust_log.is_none() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// The max level to install once the config is loaded, or `None` to keep
/// the one derived from `RUST_LOG`.
fn effective_level(rust_log: Option<&str>, configured: LogLevel) -> Option<LevelFilter> {
    match rust_log {
        Some(_) => None,
        None => Some(configured.as_level_filter()),
    }
}

/// `RUST_LOG` if it holds any filters
fn rust_log_filters() -> Option<String> {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|filters| !filters.trim().is_empty())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rust_log = rust_log_filters();
    init_logging(rust_log.as_deref());

    info!("Starting triled lights service...");

    let mut config = Config::load_or_default(args.config.as_deref());
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(root) = args.sysfs_root {
        config.sysfs_root = root;
    }
    if let Some(level) = effective_level(rust_log.as_deref(), config.log_level) {
        log::set_max_level(level);
    }

    let panel = PanelConfig {
        max_brightness: config.panel_max_brightness(),
    };
    info!("Panel max brightness: {}", panel.max_brightness);

    info!("Opening LED control points under {}", config.sysfs_root.display());
    let light = Arc::new(Light::new(Sinks::open_sysfs(&config), panel));

    let server = Server::bind(config.listen, light)?;
    server.run()
}
