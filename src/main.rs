use halfblock_player::source::{open_source, resolve_dimensions};
use halfblock_player::terminal::Screen;
use halfblock_player::utils::format_duration;
use halfblock_player::{Cli, FrameSource, Pipeline};

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};
use std::io::{self, BufWriter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. The frame stream owns the terminal, so stay quiet unless asked
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Validate CLI arguments
    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    // Set log level based on verbosity
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    info!("Starting Halfblock Player v{}", env!("CARGO_PKG_VERSION"));

    // Build the session configuration
    let config = match cli.session_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let grid = config.grid();
    debug!("Session: {:?}", config);

    // Show source information only
    if cli.info_only {
        let source_dimensions = resolve_dimensions(&config)?;
        let pipeline = Pipeline::new(&grid, source_dimensions)?;

        println!("Source Information:");
        println!("  Dimensions: {}x{}", source_dimensions.0, source_dimensions.1);
        println!("  Grid: {}x{}", grid.width, grid.height);
        println!("  Terminal Lines: {}", grid.height / 2);
        println!("  Scale Factor: {:.3}", pipeline.scale_factor().value());
        return Ok(());
    }

    // Open the source and set up the renderer
    let source = open_source(&config)?;
    let pipeline = Pipeline::new(&grid, source.dimensions())?;

    let mut screen = Screen::acquire()?;
    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(1 << 16, stdout.lock());

    // Stop on Ctrl+C
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    // Play until the source ends or the user interrupts
    let result = pipeline.run(source, &mut out, shutdown).await;
    drop(out);
    screen.release()?;

    let stats = result?;
    info!(
        "Playback finished. Frames: {}, time: {}, average {:.1} FPS ({:?})",
        stats.frames_rendered,
        format_duration(stats.elapsed.as_secs_f64()),
        stats.average_fps(),
        stats.stop_reason
    );
    Ok(())
}
