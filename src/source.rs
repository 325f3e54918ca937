use crate::config::{SessionConfig, SourceSpec};
use crate::frame::frame_len;
use crate::{PlayerError, Result};
use log::{debug, info, warn};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A producer of fixed-size raw `rgb0` frames.
pub trait FrameSource: Send {
    /// Source frame size in pixels. Fixed for the lifetime of the source.
    fn dimensions(&self) -> (u32, u32);

    /// Fill `frame` with the next frame.
    ///
    /// `frame` must be exactly [`FrameSource::frame_len`] bytes long. Returns
    /// `Ok(false)` at end of stream; a truncated trailing frame counts as end
    /// of stream.
    fn next_frame(&mut self, frame: &mut [u8]) -> Result<bool>;

    fn frame_len(&self) -> usize {
        let (width, height) = self.dimensions();
        frame_len(width, height)
    }

    /// Processes feeding this source, for stopping them from another thread.
    fn processes(&self) -> Option<ProcessGroup> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn next_frame(&mut self, frame: &mut [u8]) -> Result<bool> {
        (**self).next_frame(frame)
    }

    fn processes(&self) -> Option<ProcessGroup> {
        (**self).processes()
    }
}

/// Reads back-to-back raw frames from any byte stream.
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl<R: Read + Send> FrameSource for RawFrameReader<R> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self, frame: &mut [u8]) -> Result<bool> {
        let expected = self.frame_len();
        if frame.len() != expected {
            return Err(PlayerError::InvalidConfig(format!(
                "frame buffer holds {} bytes, expected {}",
                frame.len(),
                expected
            )));
        }

        match self.reader.read_exact(frame) {
            Ok(()) => {
                self.frames_read += 1;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("Stream ended after {} frames", self.frames_read);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Child processes behind a source, in pipe order.
///
/// Cloned handles share the same children, so the processes can be stopped
/// from a thread other than the one reading their output.
#[derive(Clone, Default)]
pub struct ProcessGroup {
    children: Arc<Mutex<Vec<(&'static str, Child)>>>,
}

impl ProcessGroup {
    fn lock(&self) -> MutexGuard<'_, Vec<(&'static str, Child)>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, tool: &'static str, child: Child) {
        self.lock().push((tool, child));
    }

    /// Kill every child still running and wait for all of them.
    pub fn kill(&self) {
        for (tool, child) in self.lock().iter_mut() {
            reap(tool, child);
        }
    }

    /// Number of children that have not exited yet.
    pub fn running(&self) -> usize {
        let mut running = 0;
        for (_, child) in self.lock().iter_mut() {
            if let Ok(None) = child.try_wait() {
                running += 1;
            }
        }
        running
    }

    /// Wait for the children of a stream that ended without a single frame
    /// and report the first one that failed.
    fn check_exit(&self) -> Result<()> {
        let mut children = self.lock();

        // The last child writes the frames; a clean exit there is just an empty stream.
        let Some((_, decoder)) = children.last_mut() else {
            return Ok(());
        };
        if decoder.wait()?.success() {
            return Ok(());
        }

        for (tool, child) in children.iter_mut() {
            let status = child.wait()?;
            if !status.success() {
                return Err(PlayerError::SourceUnavailable(format!(
                    "{} exited with {} before producing a frame",
                    tool, status
                )));
            }
        }
        Ok(())
    }
}

/// Frames decoded by an ffmpeg child process, optionally fed by a downloader.
pub struct FfmpegSource {
    reader: RawFrameReader<ChildStdout>,
    processes: ProcessGroup,
}

impl FfmpegSource {
    /// Decode a local file at its native size.
    pub fn open_file(path: &Path, dimensions: (u32, u32)) -> Result<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-i").arg(path).args(RAWVIDEO_ARGS).stdin(Stdio::null());

        info!("Decoding {} at {}x{}", path.display(), dimensions.0, dimensions.1);
        Self::spawn(cmd, dimensions, ProcessGroup::default())
    }

    /// Fetch `url` with youtube-dl and have ffmpeg scale it to `dimensions`.
    pub fn open_url(url: &str, dimensions: (u32, u32)) -> Result<Self> {
        let mut fetcher = Command::new("youtube-dl")
            .args(["-o", "-", url, "-f", "worst"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error("youtube-dl", e))?;

        let fetched = fetcher.stdout.take();
        let processes = ProcessGroup::default();
        processes.push("youtube-dl", fetcher);
        let Some(fetched) = fetched else {
            processes.kill();
            return Err(PlayerError::SourceUnavailable(
                "youtube-dl stdout was not captured".to_string(),
            ));
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-i", "pipe:0", "-s"])
            .arg(format!("{}x{}", dimensions.0, dimensions.1))
            .args(RAWVIDEO_ARGS)
            .stdin(Stdio::from(fetched));

        info!("Streaming {} at {}x{}", url, dimensions.0, dimensions.1);
        Self::spawn(cmd, dimensions, processes)
    }

    fn spawn(mut cmd: Command, dimensions: (u32, u32), processes: ProcessGroup) -> Result<Self> {
        match cmd.stdout(Stdio::piped()).stderr(Stdio::null()).spawn() {
            Ok(decoder) => Self::adopt("ffmpeg", decoder, dimensions, processes),
            Err(e) => {
                processes.kill();
                Err(spawn_error("ffmpeg", e))
            }
        }
    }

    /// Read frames from the stdout of an already running `decoder`, the last
    /// stage after any children already in `processes`.
    pub(crate) fn adopt(
        tool: &'static str,
        mut decoder: Child,
        dimensions: (u32, u32),
        processes: ProcessGroup,
    ) -> Result<Self> {
        let stdout = decoder.stdout.take();
        processes.push(tool, decoder);
        let Some(stdout) = stdout else {
            processes.kill();
            return Err(PlayerError::SourceUnavailable(format!(
                "{} stdout was not captured",
                tool
            )));
        };

        Ok(Self {
            reader: RawFrameReader::new(stdout, dimensions.0, dimensions.1),
            processes,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn dimensions(&self) -> (u32, u32) {
        self.reader.dimensions()
    }

    fn next_frame(&mut self, frame: &mut [u8]) -> Result<bool> {
        let more = self.reader.next_frame(frame)?;
        if !more && self.reader.frames_read() == 0 {
            self.processes.check_exit()?;
        }
        Ok(more)
    }

    fn processes(&self) -> Option<ProcessGroup> {
        Some(self.processes.clone())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.processes.kill();
        debug!("Decoder processes reaped after {} frames", self.reader.frames_read());
    }
}

const RAWVIDEO_ARGS: [&str; 9] = [
    "-loglevel",
    "quiet",
    "-pix_fmt",
    "rgb0",
    "-vcodec",
    "rawvideo",
    "-f",
    "image2pipe",
    "-",
];

/// Kill the child if it is still running, then wait for it.
fn reap(tool: &str, child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) if status.success() => debug!("{} exited with {}", tool, status),
        Ok(Some(status)) => warn!("{} exited with {}", tool, status),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            debug!("{} stopped", tool);
        }
        Err(e) => warn!("Failed to query {} ({}): {}", tool, child.id(), e),
    }
}

fn spawn_error(tool: &str, e: io::Error) -> PlayerError {
    if e.kind() == io::ErrorKind::NotFound {
        PlayerError::SourceUnavailable(format!("{} not found in PATH", tool))
    } else {
        PlayerError::SourceUnavailable(format!("failed to start {}: {}", tool, e))
    }
}

/// Ask ffprobe for the size of the first video stream in `path`.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .arg("-i")
        .arg(path)
        .args([
            "-show_streams",
            "-select_streams",
            "v",
            "-loglevel",
            "quiet",
            "-output_format",
            "compact",
        ])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error("ffprobe", e))?;

    if !output.status.success() {
        return Err(PlayerError::SourceUnavailable(format!(
            "ffprobe could not read {} ({})",
            path.display(),
            output.status
        )));
    }

    let report = String::from_utf8_lossy(&output.stdout);
    let (width, height) = parse_probe_output(&report).ok_or_else(|| {
        PlayerError::SourceUnavailable(format!("no video stream found in {}", path.display()))
    })?;

    debug!("Probed {}: {}x{}", path.display(), width, height);
    Ok((width, height))
}

/// Extract the first `width=<n>|height=<n>` pair from compact ffprobe output.
pub fn parse_probe_output(report: &str) -> Option<(u32, u32)> {
    for line in report.lines() {
        let fields: Vec<&str> = line.split('|').collect();
        for pair in fields.windows(2) {
            if let (Some(w), Some(h)) = (pair[0].strip_prefix("width="), pair[1].strip_prefix("height=")) {
                if let (Ok(width), Ok(height)) = (w.parse::<u32>(), h.parse::<u32>()) {
                    if width > 0 && height > 0 {
                        return Some((width, height));
                    }
                }
            }
        }
    }
    None
}

/// Size of the frames a session's source will deliver.
///
/// Files are probed; URL sources are scaled to the grid by ffmpeg.
pub fn resolve_dimensions(config: &SessionConfig) -> Result<(u32, u32)> {
    match config.source() {
        SourceSpec::File(path) => {
            if !path.exists() {
                return Err(PlayerError::SourceUnavailable(format!(
                    "video file does not exist: {}",
                    path.display()
                )));
            }
            probe_dimensions(path)
        }
        SourceSpec::Url(_) => Ok(config.grid().dimensions()),
        SourceSpec::Stdin { width, height } => Ok((*width, *height)),
    }
}

/// Open the frame source a session is configured for.
pub fn open_source(config: &SessionConfig) -> Result<Box<dyn FrameSource>> {
    let dimensions = resolve_dimensions(config)?;
    match config.source() {
        SourceSpec::File(path) => Ok(Box::new(FfmpegSource::open_file(path, dimensions)?)),
        SourceSpec::Url(url) => Ok(Box::new(FfmpegSource::open_url(url, dimensions)?)),
        SourceSpec::Stdin { .. } => {
            info!("Reading raw {}x{} frames from stdin", dimensions.0, dimensions.1);
            Ok(Box::new(RawFrameReader::new(io::stdin(), dimensions.0, dimensions.1)))
        }
    }
}
