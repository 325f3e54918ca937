use crate::config::GridConfig;
use crate::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::ResetColor,
    terminal::{Clear, ClearType},
};
use log::debug;
use std::io::{stdout, Write};

/// Whether standard output is attached to a terminal.
pub fn stdout_is_terminal() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Grid that fills the current terminal.
pub fn terminal_grid() -> Result<GridConfig> {
    let (columns, rows) = crossterm::terminal::size()?;
    debug!("Terminal size: {}x{}", columns, rows);
    Ok(GridConfig::fit_terminal(columns, rows))
}

/// Clears the screen and hides the cursor for the lifetime of a session.
///
/// Does nothing when standard output is not a terminal, so piped output
/// holds only the frame stream.
pub struct Screen {
    active: bool,
}

impl Screen {
    pub fn acquire() -> Result<Self> {
        if !stdout_is_terminal() {
            debug!("Standard output is not a terminal, skipping screen setup");
            return Ok(Self { active: false });
        }

        execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0), Hide)?;
        debug!("Terminal initialized for rendering");
        Ok(Self { active: true })
    }

    /// Restore the cursor and default colors.
    pub fn release(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut out = stdout();
        execute!(out, ResetColor, Show)?;
        out.flush()?;
        debug!("Terminal restored to normal state");
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
