//! Scanning session
//!
//! One session is one pass of the authorization pipeline:
//!
//! ```text
//! FrameSource -> CodeReader -> AuthorizationEngine -> EventSink
//!                                                  -> Presenter
//! ```
//!
//! The session owns its collaborators. They are released when the session
//! is dropped, whichever way [`ScanSession::run`] returns, and the sink is
//! flushed before `run` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use crate::clock::Clock;
use crate::engine::{AuthorizationEngine, Decision};
use crate::error::Result;
use crate::frame::{CodeReader, Frame, FrameSource};
use crate::presenter::{Outcome, Presenter};
use crate::sink::EventSink;

/// Consecutive frame failures tolerated before a session gives up.
pub const DEFAULT_FRAME_RETRY_LIMIT: u32 = 1;

/// Shared flag asking a session to stop after the current frame.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub detections: u64,
    pub logged: u64,
    pub suppressed: u64,
    pub denied: u64,
}

pub struct ScanSession<F, R, E, P, C> {
    engine: AuthorizationEngine,
    source: F,
    reader: R,
    sink: E,
    presenter: P,
    clock: C,
    stop: StopSignal,
    frame_retry_limit: u32,
    summary: SessionSummary,
}

impl<F, R, E, P, C> ScanSession<F, R, E, P, C>
where
    F: FrameSource,
    R: CodeReader,
    E: EventSink,
    P: Presenter,
    C: Clock,
{
    pub fn new(engine: AuthorizationEngine, source: F, reader: R, sink: E, presenter: P, clock: C) -> Self {
        Self {
            engine,
            source,
            reader,
            sink,
            presenter,
            clock,
            stop: StopSignal::new(),
            frame_retry_limit: DEFAULT_FRAME_RETRY_LIMIT,
            summary: SessionSummary::default(),
        }
    }

    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn with_frame_retry_limit(mut self, limit: u32) -> Self {
        self.frame_retry_limit = limit;
        self
    }

    /// Handle to stop this session from elsewhere.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Scan until the source ends, the stop signal is raised, or an
    /// unrecoverable error occurs.
    pub fn run(mut self) -> Result<SessionSummary> {
        info!("Scanning session started");
        let scanned = self.scan();
        let flushed = self.sink.flush();

        let summary = self.summary;
        info!(
            "Scanning session ended: {} frames, {} logged, {} suppressed, {} denied",
            summary.frames, summary.logged, summary.suppressed, summary.denied
        );
        scanned?;
        flushed?;
        Ok(summary)
    }

    fn scan(&mut self) -> Result<()> {
        let mut failures = 0;
        while !self.stop.is_stopped() {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => {
                    failures = 0;
                    frame
                }
                Ok(None) => {
                    info!("Frame source ended");
                    break;
                }
                Err(e) if e.is_recoverable() && failures < self.frame_retry_limit => {
                    failures += 1;
                    warn!("{e}, retrying ({failures}/{})", self.frame_retry_limit);
                    continue;
                }
                Err(e) => {
                    error!("Stopping session: {e}");
                    return Err(e);
                }
            };
            self.process(&frame)?;
        }
        Ok(())
    }

    /// Decode one frame and decide on every code in it.
    ///
    /// A logged event is appended before its suppression window starts, so
    /// a failed append does not hide the payload from the next frame.
    fn process(&mut self, frame: &Frame) -> Result<()> {
        self.summary.frames += 1;
        let detections = self.reader.decode(frame);
        if detections.is_empty() {
            return Ok(());
        }

        let observed_at = self.clock.now();
        let mut outcomes = Vec::with_capacity(detections.len());
        for detection in detections {
            let sink = &mut self.sink;
            let decision = self
                .engine
                .evaluate_with(&detection.payload, observed_at, |event| sink.append(event))?;
            self.summary.detections += 1;
            match &decision {
                Decision::GrantedLogged(_) => self.summary.logged += 1,
                Decision::GrantedSuppressed { .. } => self.summary.suppressed += 1,
                Decision::Denied => self.summary.denied += 1,
            }
            outcomes.push(Outcome {
                detection,
                decision: decision.kind(),
            });
        }

        self.presenter.present(frame, &outcomes);
        Ok(())
    }
}
