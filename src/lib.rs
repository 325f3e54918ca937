//! Halfblock Player - plays video in the terminal as truecolor half-block text
//!
//! Each terminal cell shows two vertically stacked pixels: the upper half
//! block glyph is painted with the top pixel's color and the cell background
//! with the bottom one. Frames flow from a [`source::FrameSource`] through a
//! box-filter [`downscale::Downscaler`] and a [`encoder::RowPairEncoder`],
//! driven by the [`pipeline::Pipeline`].

pub mod cli;
pub mod config;
pub mod downscale;
pub mod encoder;
pub mod frame;
pub mod pipeline;
pub mod source;
pub mod terminal;

pub use cli::Cli;
pub use config::{GridConfig, SessionConfig, SourceSpec};
pub use downscale::{box_filter, downscale, Downscaler, ScaleFactor};
pub use encoder::{encode, stack_pixels, RowPairEncoder};
pub use frame::{CellFrame, Pixel, RawFrame, Region};
pub use pipeline::{Pipeline, PipelineState, PipelineStats, StopReason};
pub use source::{open_source, probe_dimensions, FfmpegSource, FrameSource, ProcessGroup, RawFrameReader};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default grid width in pixels
pub const DEFAULT_GRID_WIDTH: u32 = 120;

/// Default grid height in pixels (two rows per terminal line)
pub const DEFAULT_GRID_HEIGHT: u32 = 80;

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Grid height must be even, got {0}")]
    OddHeight(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config format error: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Utility functions
pub mod utils {
    /// Format duration in a human-readable way
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        box_filter, downscale, encode, open_source, probe_dimensions, stack_pixels, utils::*, CellFrame, Cli,
        Downscaler, FrameSource, GridConfig, Pipeline, PipelineStats, PlayerError, RawFrame,
        RawFrameReader, Region, Result, RowPairEncoder, ScaleFactor, SessionConfig, SourceSpec,
    };
}
