//! Live conversation with Miss Nour
//!
//! Wires a [`LiveSession`] to a microphone and a speaker. Inbound audio is
//! scheduled gaplessly on a scheduler owned by this conversation alone.
//! A microphone that cannot be opened leaves the session open for playback
//! and reports [`CaptureState::Unavailable`].

use tokio::sync::mpsc;

use crate::gemini::{CloseReason, FrameSender, LiveEvent, LiveSession};
use crate::voice::{
    AudioCapture, AudioSink, EncodedFrame, OUTPUT_SAMPLE_RATE, PlaybackScheduler, decode_pcm,
};
use crate::{Error, Result};

/// Where microphone frames come from
pub trait CaptureSource {
    /// Start delivering frames to `frames`
    ///
    /// # Errors
    ///
    /// Returns `Error::Microphone` if capture cannot start
    fn start(&mut self, frames: FrameSender) -> Result<()>;

    /// Stop delivering frames
    fn stop(&mut self);
}

/// Microphone state for the current conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    NotStarted,
    Capturing,
    /// Capture failed; playback continues
    Unavailable(String),
}

/// Default input device, framed at 16 kHz
pub struct Microphone {
    sample_rate: u32,
    block_size: usize,
    capture: Option<AudioCapture>,
}

impl Microphone {
    #[must_use]
    pub const fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            capture: None,
        }
    }
}

impl CaptureSource for Microphone {
    fn start(&mut self, frames: FrameSender) -> Result<()> {
        let mut capture = AudioCapture::new(self.sample_rate, self.block_size)?;
        let sample_rate = self.sample_rate;

        capture.start(move |frame| {
            let encoded = EncodedFrame::from_samples(&frame.samples, sample_rate);
            if let Err(e) = frames.send(encoded) {
                tracing::trace!(error = %e, "frame not queued");
            }
        })?;

        self.capture = Some(capture);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }
}

/// One live conversation: session, microphone, and speaker
pub struct LiveClassroom<S, M> {
    session: LiveSession,
    events: mpsc::Receiver<LiveEvent>,
    scheduler: PlaybackScheduler<S>,
    microphone: M,
    capture: CaptureState,
    chunks_played: u64,
}

impl<S: AudioSink, M: CaptureSource> LiveClassroom<S, M> {
    /// Wrap an idle session
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the session's events were already taken
    pub fn new(mut session: LiveSession, sink: S, microphone: M, barge_in: bool) -> Result<Self> {
        let events = session
            .take_events()
            .ok_or_else(|| Error::InvalidState("live session events already taken".to_string()))?;

        Ok(Self {
            session,
            events,
            scheduler: PlaybackScheduler::new(sink, barge_in),
            microphone,
            capture: CaptureState::NotStarted,
            chunks_played: 0,
        })
    }

    /// Begin connecting
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the session is idle
    pub fn start(&mut self) -> Result<()> {
        self.session.connect()
    }

    /// Wait for the next session event and act on it
    ///
    /// Returns `None` once the session is gone.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        let event = self.events.recv().await?;
        self.handle(&event);
        Some(event)
    }

    /// Run until the session closes
    pub async fn run(&mut self) -> CloseReason {
        while let Some(event) = self.next_event().await {
            if let LiveEvent::Closed { reason } = event {
                return reason;
            }
        }
        CloseReason::Requested
    }

    /// Act on one session event
    pub fn handle(&mut self, event: &LiveEvent) {
        match event {
            LiveEvent::Opened => self.start_capture(),
            LiveEvent::Audio(bytes) => match decode_pcm(bytes, OUTPUT_SAMPLE_RATE, 1) {
                Ok(buffer) => {
                    self.scheduler.enqueue(buffer);
                    self.chunks_played += 1;
                }
                Err(e) => tracing::warn!(error = %e, "skipping undecodable audio chunk"),
            },
            LiveEvent::Interrupted => self.scheduler.interrupt(),
            LiveEvent::TurnComplete => tracing::debug!("model turn complete"),
            LiveEvent::Closed { reason } => {
                self.microphone.stop();
                tracing::info!(?reason, chunks = self.chunks_played, "conversation ended");
            }
        }
    }

    /// Stop the microphone and close the session
    pub fn close(&mut self) {
        self.microphone.stop();
        self.session.close();
    }

    /// Wait for the session's background task to finish
    pub async fn closed(&mut self) {
        self.session.closed().await;
    }

    #[must_use]
    pub const fn capture_state(&self) -> &CaptureState {
        &self.capture
    }

    #[must_use]
    pub const fn scheduler(&self) -> &PlaybackScheduler<S> {
        &self.scheduler
    }

    #[must_use]
    pub const fn session(&self) -> &LiveSession {
        &self.session
    }

    /// Inbound chunks handed to the speaker so far
    #[must_use]
    pub const fn chunks_played(&self) -> u64 {
        self.chunks_played
    }

    fn start_capture(&mut self) {
        if self.capture == CaptureState::Capturing {
            return;
        }
        match self.microphone.start(self.session.sender()) {
            Ok(()) => {
                tracing::info!("microphone streaming");
                self.capture = CaptureState::Capturing;
            }
            Err(e) => {
                tracing::warn!(error = %e, "microphone unavailable, continuing with playback only");
                self.capture = CaptureState::Unavailable(e.to_string());
            }
        }
    }
}
