//! unyo - LMNtal step visualizer
//! Built with egui for native Wayland support

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use unyo::{UnyoApp, UnyoConfig};

#[derive(Parser)]
#[command(name = "unyo")]
#[command(author, version, about = "Watch an LMNtal program rewrite its graph, one step at a time")]
struct Cli {
    /// LMNtal program to open at startup
    program: Option<PathBuf>,

    /// Engine executable (overrides the config file)
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Config file (default: ~/.config/unyo/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mover period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Write the effective config (after overrides) and exit
    #[arg(long)]
    write_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = UnyoConfig::load_or_default(cli.config.as_deref());
    if let Some(engine) = cli.engine {
        config.engine.binary = engine;
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.layout.tick_ms = tick_ms;
    }

    if cli.write_config {
        let path = cli.config.clone().unwrap_or_else(UnyoConfig::default_path);
        let saved = match &cli.config {
            Some(path) => config.save_to(path),
            None => config.save(),
        };
        saved.with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_min_inner_size([480.0, 320.0])
            .with_title("unyo"),
        ..Default::default()
    };

    let program = cli.program;
    eframe::run_native(
        "unyo",
        options,
        Box::new(move |cc| Ok(Box::new(UnyoApp::new(cc, config, program)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))?;

    Ok(())
}
