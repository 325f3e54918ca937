use crate::config::GridConfig;
use crate::downscale::{Downscaler, ScaleFactor};
use crate::encoder::{RowPairEncoder, CURSOR_HOME};
use crate::frame::{frame_len, CellFrame, RawFrame};
use crate::source::FrameSource;
use crate::{PlayerError, Result};
use log::{debug, error, info, warn};
use std::future::Future;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Frames in flight between the source and the renderer.
pub const HANDOFF_CAPACITY: usize = 1;

/// Spent buffers waiting to be refilled by the source.
const RECYCLE_CAPACITY: usize = 2;

/// Where the orchestrator is in its per-frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    AwaitingFrame,
    Processing,
    Emitting,
    Closed,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source closed its queue.
    EndOfStream,
    /// A frame arrived with the wrong length.
    ShortFrame,
    /// The shutdown future completed.
    Cancelled,
}

/// Summary of a finished session.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStats {
    pub frames_rendered: u64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl PipelineStats {
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_rendered as f64 / secs
        } else {
            0.0
        }
    }
}

/// Drives frames from a source through the downscaler and encoder to an output stream.
pub struct Pipeline {
    downscaler: Downscaler,
    encoder: RowPairEncoder,
    resized: CellFrame,
    text: String,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(grid: &GridConfig, source_dimensions: (u32, u32)) -> Result<Self> {
        grid.validate()?;
        let downscaler = Downscaler::new(source_dimensions, grid.dimensions())?;
        let encoder = RowPairEncoder::new(grid.width, grid.height)?;
        let text = encoder.text_buffer();

        Ok(Self {
            downscaler,
            encoder,
            resized: CellFrame::new(grid.width, grid.height),
            text,
            state: PipelineState::AwaitingFrame,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn scale_factor(&self) -> ScaleFactor {
        self.downscaler.factor()
    }

    /// The text block of the most recently rendered frame.
    pub fn text_block(&self) -> &str {
        &self.text
    }

    /// Render one raw frame into the text block, handing the spent buffer back.
    ///
    /// Returns `None` if `bytes` is not exactly one source frame long.
    pub fn render(&mut self, bytes: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let (width, height) = self.downscaler.source_dimensions();
        if bytes.len() != frame_len(width, height) {
            return Ok(None);
        }
        let Some(source) = RawFrame::from_raw(width, height, bytes) else {
            return Ok(None);
        };

        self.downscaler.downscale_into(&source, &mut self.resized);
        self.encoder.encode_into(&self.resized, &mut self.text)?;
        Ok(Some(source.into_raw()))
    }

    /// Run a whole session: spawn the source on its own thread and render
    /// until it ends or `shutdown` completes.
    pub async fn run<S, W, F>(mut self, source: S, out: &mut W, shutdown: F) -> Result<PipelineStats>
    where
        S: FrameSource + 'static,
        W: Write,
        F: Future<Output = ()>,
    {
        let expected = self.downscaler.source_dimensions();
        if source.dimensions() != expected {
            return Err(PlayerError::InvalidConfig(format!(
                "source delivers {}x{} frames, pipeline expects {}x{}",
                source.dimensions().0,
                source.dimensions().1,
                expected.0,
                expected.1
            )));
        }

        let processes = source.processes();
        let (frame_tx, frame_rx) = mpsc::channel(HANDOFF_CAPACITY);
        let (recycle_tx, recycle_rx) = mpsc::channel(RECYCLE_CAPACITY);

        let producer = thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || produce(source, frame_tx, recycle_rx))?;

        let stats = match self.consume(frame_rx, Some(recycle_tx), out, shutdown).await {
            Ok(stats) if stats.stop_reason != StopReason::Cancelled => stats,
            finished => {
                // The producer may be blocked inside a read. Stopping the
                // processes behind it closes that pipe; it is not joined.
                if let Some(processes) = processes {
                    processes.kill();
                }
                return finished;
            }
        };

        match producer.join() {
            Ok(Ok(produced)) => debug!("Frame source finished after {} frames", produced),
            Ok(Err(e)) if stats.frames_rendered == 0 => return Err(e),
            Ok(Err(e)) => error!("Frame source failed after {} frames: {}", stats.frames_rendered, e),
            Err(_) => error!("Frame source thread panicked"),
        }

        Ok(stats)
    }

    /// Render frames from `frames` to `out` until the queue closes, a short
    /// frame arrives, or `shutdown` completes.
    ///
    /// Consumed buffers are offered back through `recycle` when given. A
    /// closed pipeline renders nothing further.
    async fn consume<W, F>(
        &mut self,
        mut frames: mpsc::Receiver<Vec<u8>>,
        recycle: Option<mpsc::Sender<Vec<u8>>>,
        out: &mut W,
        shutdown: F,
    ) -> Result<PipelineStats>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        if self.state == PipelineState::Closed {
            return Err(PlayerError::InvalidConfig("pipeline is already closed".to_string()));
        }
        tokio::pin!(shutdown);

        let (sw, sh) = self.downscaler.source_dimensions();
        let (tw, th) = self.downscaler.target_dimensions();
        info!(
            "Rendering {}x{} source to {}x{} grid, scale factor {:.3}",
            sw,
            sh,
            tw,
            th,
            self.scale_factor().value()
        );

        let started = Instant::now();
        let mut frames_rendered = 0u64;

        let stop_reason = loop {
            self.state = PipelineState::AwaitingFrame;

            let bytes = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested after {} frames", frames_rendered);
                    break StopReason::Cancelled;
                }
                frame = frames.recv() => match frame {
                    Some(bytes) => bytes,
                    None => {
                        debug!("Frame source closed after {} frames", frames_rendered);
                        break StopReason::EndOfStream;
                    }
                },
            };

            self.state = PipelineState::Processing;
            let received = bytes.len();
            let Some(spent) = self.render(bytes)? else {
                warn!(
                    "Short frame ({} bytes, expected {}), treating as end of stream",
                    received,
                    frame_len(sw, sh)
                );
                break StopReason::ShortFrame;
            };

            self.state = PipelineState::Emitting;
            out.write_all(CURSOR_HOME.as_bytes())?;
            out.write_all(self.text.as_bytes())?;
            out.flush()?;
            frames_rendered += 1;

            if let Some(recycle) = &recycle {
                // A full recycle queue just means the buffer is freed here.
                let _ = recycle.try_send(spent);
            }
        };

        self.state = PipelineState::Closed;
        frames.close();

        Ok(PipelineStats {
            frames_rendered,
            elapsed: started.elapsed(),
            stop_reason,
        })
    }
}

/// Producer loop: fill buffers from `source` and hand them over one at a time.
///
/// Dropping `frames` on return closes the queue, which the consumer reads as
/// end of stream. Returns the number of frames handed over.
fn produce<S: FrameSource>(
    mut source: S,
    frames: mpsc::Sender<Vec<u8>>,
    mut recycle: mpsc::Receiver<Vec<u8>>,
) -> Result<u64> {
    let len = source.frame_len();
    let mut produced = 0u64;

    loop {
        let mut buf = recycle.try_recv().unwrap_or_default();
        buf.resize(len, 0);

        if !source.next_frame(&mut buf)? {
            debug!("Source exhausted after {} frames", produced);
            break;
        }

        if frames.blocking_send(buf).is_err() {
            debug!("Renderer stopped, closing source");
            break;
        }
        produced += 1;
    }

    Ok(produced)
}
