use crate::config::{GridConfig, SessionConfig, SourceSpec};
use crate::terminal::terminal_grid;
use crate::Result;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["path", "url"])))]
pub struct Cli {
    /// Path to a video file, or `-` to read raw rgb0 frames from stdin
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// URL of a video source (fetched with youtube-dl)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Grid width in pixels (one terminal column each)
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Grid height in pixels (two per terminal row, must be even)
    #[arg(long)]
    pub height: Option<u32>,

    /// Size the grid to the current terminal
    #[arg(long, conflicts_with_all = ["width", "height"])]
    pub fit: bool,

    /// Size of raw stdin frames, e.g. 640x360
    #[arg(long, value_name = "WxH", value_parser = parse_frame_size)]
    pub source_size: Option<FrameSize>,

    /// Load grid defaults from a JSON file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print source and grid information only (don't play)
    #[arg(long)]
    pub info_only: bool,
}

/// A `WIDTHxHEIGHT` pair given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

pub fn parse_frame_size(value: &str) -> std::result::Result<FrameSize, String> {
    let (w, h) = value
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid width '{}': {}", w, e))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid height '{}': {}", h, e))?;
    Ok(FrameSize { width, height })
}

impl Cli {
    fn reads_stdin(&self) -> bool {
        self.path.as_deref().map_or(false, |p| p.as_os_str() == "-")
    }

    /// Validate command line arguments
    pub fn validate(&self) -> std::result::Result<(), String> {
        // Check the input exists
        if let Some(path) = &self.path {
            if self.reads_stdin() {
                if self.source_size.is_none() {
                    return Err("Reading frames from stdin requires --source-size".to_string());
                }
            } else if !path.exists() {
                return Err(format!("Video file does not exist: {}", path.display()));
            }
        }

        // Validate source size
        if self.source_size.is_some() && !self.reads_stdin() {
            return Err("--source-size only applies to stdin input (--path -)".to_string());
        }

        if let Some(size) = self.source_size {
            if size.width == 0 || size.height == 0 {
                return Err("Source size must be greater than 0".to_string());
            }
        }

        // Validate grid dimensions
        if self.width == Some(0) {
            return Err("Grid width must be greater than 0".to_string());
        }

        if let Some(height) = self.height {
            if height == 0 {
                return Err("Grid height must be greater than 0".to_string());
            }
            if height % 2 != 0 {
                return Err(format!("Grid height must be even, got {}", height));
            }
        }

        // Check config file exists
        if let Some(config) = &self.config {
            if !config.exists() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        Ok(())
    }

    /// Resolve the grid: config file, then terminal fit, then explicit flags.
    pub fn grid(&self) -> Result<GridConfig> {
        let mut grid = match &self.config {
            Some(path) => GridConfig::from_file(path)?,
            None => GridConfig::default(),
        };

        if self.fit {
            grid = terminal_grid()?;
        }
        if let Some(width) = self.width {
            grid.width = width;
        }
        if let Some(height) = self.height {
            grid.height = height;
        }

        Ok(grid)
    }

    pub fn source(&self) -> Option<SourceSpec> {
        if self.reads_stdin() {
            let size = self.source_size?;
            return Some(SourceSpec::Stdin {
                width: size.width,
                height: size.height,
            });
        }
        if let Some(path) = &self.path {
            return Some(SourceSpec::File(path.clone()));
        }
        self.url.clone().map(SourceSpec::Url)
    }

    /// Build the validated, immutable session configuration.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let source = self.source().ok_or_else(|| {
            crate::PlayerError::InvalidConfig("either --path or --url is required".to_string())
        })?;
        SessionConfig::new(source, self.grid()?)
    }
}
