//! Shared test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::SinkExt;
use futures::channel::mpsc;
use tokio::sync::oneshot;

use nour_classroom::gemini::types::{ClientMessage, LiveSetup, ServerMessage};
use nour_classroom::gemini::{FrameSender, LiveConnection, LiveTransport};
use nour_classroom::lesson::parse_structured;
use nour_classroom::voice::{AudioBuffer, AudioSink, PlaybackHandle};
use nour_classroom::{
    CaptureSource, Error, ExamQuestion, Lesson, LessonSummary, Result, StepKind, TeacherService,
    TeachingMode, TeachingStep, Unit,
};

/// Build `count` plain vocabulary steps
#[must_use]
pub fn steps(count: usize) -> Vec<TeachingStep> {
    (0..count)
        .map(|i| TeachingStep {
            kind: StepKind::Vocabulary,
            content: format!("word {i}"),
            instruction: "Repeat after me".to_string(),
            audio_text: format!("Say word {i}"),
            is_question: None,
            correct_answer: None,
        })
        .collect()
}

/// Build exam questions with the given answer keys
#[must_use]
pub fn questions(keys: &[Option<&str>]) -> Vec<ExamQuestion> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| ExamQuestion {
            skill: nour_classroom::SkillType::Reading,
            question: format!("Question {i}"),
            instruction: "Answer".to_string(),
            correct_answer: key.map(ToString::to_string),
        })
        .collect()
}

/// What the fake service should return
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    /// Raw payload run through the structured-output parser
    Raw(&'static str),
    Fail,
}

impl<T: serde::de::DeserializeOwned + Default + Clone> Reply<T> {
    fn resolve(&self) -> Result<T> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::Raw(text) => Ok(parse_structured(Some(*text), "fake")),
            Self::Fail => Err(Error::Live("service unavailable".to_string())),
        }
    }
}

/// Teacher service with canned replies that counts every call
pub struct FakeTeacher {
    pub script: Mutex<Reply<Vec<TeachingStep>>>,
    pub summary: Mutex<Reply<LessonSummary>>,
    pub exam: Mutex<Reply<Vec<ExamQuestion>>>,
    pub script_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
    pub exam_calls: AtomicUsize,
    pub speak_calls: AtomicUsize,
    /// Text of each speech request
    pub spoken: Mutex<Vec<String>>,
    /// (unit, lesson, mode) of each script request
    pub script_requests: Mutex<Vec<(u32, u32, TeachingMode)>>,
}

impl FakeTeacher {
    #[must_use]
    pub fn new(script: Vec<TeachingStep>, exam: Vec<ExamQuestion>) -> Self {
        Self {
            script: Mutex::new(Reply::Ok(script)),
            summary: Mutex::new(Reply::Ok(LessonSummary {
                vocabulary_learned: vec!["happy".to_string()],
                home_activity: "Tell your family a story".to_string(),
                encouragement: "Great job!".to_string(),
            })),
            exam: Mutex::new(Reply::Ok(exam)),
            script_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            exam_calls: AtomicUsize::new(0),
            speak_calls: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
            script_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TeacherService for FakeTeacher {
    async fn generate_lesson_script(
        &self,
        unit: &Unit,
        lesson: &Lesson,
        mode: TeachingMode,
    ) -> Result<Vec<TeachingStep>> {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        self.script_requests
            .lock()
            .unwrap()
            .push((unit.id, lesson.id, mode));
        let reply = self.script.lock().unwrap().clone();
        reply.resolve()
    }

    async fn generate_summary(&self, _lesson: &Lesson) -> Result<LessonSummary> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.summary.lock().unwrap().clone();
        reply.resolve()
    }

    async fn generate_exam(&self, _unit: &Unit) -> Result<Vec<ExamQuestion>> {
        self.exam_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.exam.lock().unwrap().clone();
        reply.resolve()
    }

    async fn speak(&self, text: &str) -> Result<Option<AudioBuffer>> {
        self.speak_calls.fetch_add(1, Ordering::SeqCst);
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(None)
    }
}

/// Audio sink whose clock only moves when told to
#[derive(Default)]
pub struct ManualSink {
    now: Mutex<f64>,
    /// (start, duration) of every committed buffer
    pub played: Mutex<Vec<(f64, f64)>>,
    pub stops: AtomicUsize,
}

impl ManualSink {
    pub fn set_now(&self, now: f64) {
        *self.now.lock().unwrap() = now;
    }

    #[must_use]
    pub fn starts(&self) -> Vec<f64> {
        self.played.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

impl AudioSink for ManualSink {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }

    fn play_at(&self, buffer: AudioBuffer, start: f64) -> PlaybackHandle {
        let mut played = self.played.lock().unwrap();
        played.push((start, buffer.duration()));
        PlaybackHandle(played.len() as u64)
    }

    fn stop_all(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mono buffer of `seconds` of silence at 24 kHz
#[must_use]
pub fn silence(seconds: f64) -> AudioBuffer {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let frames = (seconds * 24_000.0) as usize;
    AudioBuffer::mono(vec![0.0; frames], 24_000)
}

/// The remote side of an in-memory live connection
pub struct ServerEnd {
    /// Messages the client sent
    pub received: mpsc::UnboundedReceiver<ClientMessage>,
    /// Push messages to the client; drop to close the connection
    pub send: mpsc::UnboundedSender<Result<ServerMessage>>,
}

impl ServerEnd {
    /// Send a server message given as JSON
    pub fn push_json(&self, json: &str) {
        let message: ServerMessage = serde_json::from_str(json).unwrap();
        self.send.unbounded_send(Ok(message)).unwrap();
    }

    /// Send a raw frame, delivering the parse failure if it is not a message
    pub fn push_raw(&self, text: &str) {
        let parsed = serde_json::from_str::<ServerMessage>(text).map_err(Error::from);
        self.send.unbounded_send(parsed).unwrap();
    }
}

/// Live transport backed by in-memory channels
pub struct ChannelTransport {
    connection: Mutex<Option<LiveConnection>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    failure: Option<String>,
    pub setups: Mutex<Vec<LiveSetup>>,
    pub connects: AtomicUsize,
}

impl ChannelTransport {
    /// A transport that connects immediately
    #[must_use]
    pub fn new() -> (Arc<Self>, ServerEnd) {
        let (transport, server) = Self::build(None, None);
        (transport, server)
    }

    /// A transport whose connect waits until the returned sender fires
    #[must_use]
    pub fn gated() -> (Arc<Self>, ServerEnd, oneshot::Sender<()>) {
        let (open, gate) = oneshot::channel();
        let (transport, server) = Self::build(Some(gate), None);
        (transport, server, open)
    }

    /// A transport whose connect always fails
    #[must_use]
    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(None, Some(message.to_string())).0
    }

    fn build(
        gate: Option<oneshot::Receiver<()>>,
        failure: Option<String>,
    ) -> (Arc<Self>, ServerEnd) {
        let (client_tx, client_rx) = mpsc::unbounded::<ClientMessage>();
        let (server_tx, server_rx) = mpsc::unbounded::<Result<ServerMessage>>();

        let connection = LiveConnection {
            sink: Box::pin(client_tx.sink_map_err(|e| Error::Live(e.to_string()))),
            stream: Box::pin(server_rx),
        };

        let transport = Arc::new(Self {
            connection: Mutex::new(Some(connection)),
            gate: Mutex::new(gate),
            failure,
            setups: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
        });

        (
            transport,
            ServerEnd {
                received: client_rx,
                send: server_tx,
            },
        )
    }
}

#[async_trait]
impl LiveTransport for ChannelTransport {
    async fn connect(&self, setup: LiveSetup) -> Result<LiveConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.setups.lock().unwrap().push(setup);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(message) = &self.failure {
            return Err(Error::Live(message.clone()));
        }

        self.connection
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Live("already connected".to_string()))
    }
}

/// Microphone stand-in
#[derive(Clone, Default)]
pub struct FakeMicrophone {
    pub fail: bool,
    pub running: Arc<AtomicBool>,
    pub frames: Arc<Mutex<Option<FrameSender>>>,
}

impl FakeMicrophone {
    #[must_use]
    pub fn denied() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl CaptureSource for FakeMicrophone {
    fn start(&mut self, frames: FrameSender) -> Result<()> {
        if self.fail {
            return Err(Error::Microphone("permission denied".to_string()));
        }
        *self.frames.lock().unwrap() = Some(frames);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// A minimal live setup
#[must_use]
pub fn setup() -> LiveSetup {
    LiveSetup::audio("test-live-model", "Kore", "Be kind")
}
