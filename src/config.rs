use crate::{PlayerError, Result, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Size of the downscaled pixel grid. Each terminal line shows two grid rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
        }
    }
}

impl GridConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Load a grid from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let grid = serde_json::from_str(&contents)?;
        Ok(grid)
    }

    /// Grid that fills a terminal of `columns` x `rows` cells.
    ///
    /// One row is left free so the trailing newline does not scroll the screen.
    pub fn fit_terminal(columns: u16, rows: u16) -> Self {
        let height = rows.saturating_sub(1) as u32 * 2;
        Self {
            width: columns as u32,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.height % 2 != 0 {
            return Err(PlayerError::OddHeight(self.height));
        }
        Ok(())
    }
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A local video file decoded by ffmpeg.
    File(PathBuf),
    /// A remote video fetched by youtube-dl and decoded by ffmpeg.
    Url(String),
    /// Raw `rgb0` frames of a known size on standard input.
    Stdin { width: u32, height: u32 },
}

/// Immutable settings for one playback session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    source: SourceSpec,
    grid: GridConfig,
}

impl SessionConfig {
    pub fn new(source: SourceSpec, grid: GridConfig) -> Result<Self> {
        grid.validate()?;
        if let SourceSpec::Stdin { width, height } = source {
            if width == 0 || height == 0 {
                return Err(PlayerError::InvalidConfig(format!(
                    "source dimensions must be positive, got {}x{}",
                    width, height
                )));
            }
        }
        Ok(Self { source, grid })
    }

    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    pub fn grid(&self) -> GridConfig {
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_grid() {
        let grid = GridConfig::default();
        assert_eq!(grid.dimensions(), (120, 80));
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn test_grid_validation() {
        assert!(matches!(GridConfig::new(120, 81).validate(), Err(PlayerError::OddHeight(81))));
        assert!(matches!(GridConfig::new(0, 80).validate(), Err(PlayerError::InvalidConfig(_))));
        assert!(GridConfig::new(1, 2).validate().is_ok());
    }

    #[test]
    fn test_fit_terminal() {
        assert_eq!(GridConfig::fit_terminal(80, 24), GridConfig::new(80, 46));
        assert_eq!(GridConfig::fit_terminal(80, 0).height, 0);
    }

    #[test]
    fn test_grid_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"width": 64, "height": 32}}"#).unwrap();

        let grid = GridConfig::from_file(file.path()).unwrap();
        assert_eq!(grid, GridConfig::new(64, 32));
    }

    #[test]
    fn test_grid_from_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"width": 64}}"#).unwrap();

        let grid = GridConfig::from_file(file.path()).unwrap();
        assert_eq!(grid, GridConfig::new(64, DEFAULT_GRID_HEIGHT));
    }

    #[test]
    fn test_grid_from_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "width = 64").unwrap();

        assert!(matches!(
            GridConfig::from_file(file.path()),
            Err(PlayerError::ConfigFormat(_))
        ));
    }

    #[test]
    fn test_session_rejects_odd_grid() {
        let source = SourceSpec::Url("https://example.com/v".to_string());
        assert!(SessionConfig::new(source, GridConfig::new(120, 79)).is_err());
    }

    #[test]
    fn test_session_rejects_empty_stdin_source() {
        let source = SourceSpec::Stdin { width: 0, height: 10 };
        assert!(SessionConfig::new(source, GridConfig::default()).is_err());
    }
}
