//! Nour Classroom - voice-first English tutor for Primary 6
//!
//! This library provides the core functionality for the classroom:
//! - Curriculum and prompt building for generated lessons and exams
//! - Lesson/exam flow as an explicit state machine
//! - One-shot generation and speech synthesis with rate-limit retry
//! - Live bidirectional audio sessions with gapless playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │      CLI  │  Lesson  │  Exam  │  Live conversation   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Classroom                           │
//! │  State machine │ Capture │ Scheduler │ PCM codec     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Gemini (generative-language API)          │
//! │   generateContent  │  TTS  │  Live WebSocket         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod classroom;
pub mod config;
pub mod curriculum;
pub mod error;
pub mod gemini;
pub mod lesson;
pub mod live;
pub mod prompt;
pub mod voice;

pub use classroom::{Classroom, ExamProgress, ExamReport, FailedAction, TeacherService, View};
pub use config::Config;
pub use curriculum::{CURRICULUM, Lesson, Unit, find_unit};
pub use error::{ApiError, ApiErrorKind, Error, Result};
pub use gemini::{GeminiClient, LiveEvent, LiveSession, RetryPolicy, SessionState};
pub use lesson::{ExamQuestion, LessonSummary, SkillType, StepKind, TeachingMode, TeachingStep};
pub use live::{CaptureSource, CaptureState, LiveClassroom, Microphone};
