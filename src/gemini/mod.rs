//! Gemini generative-language API
//!
//! - One-shot structured generation and speech synthesis ([`GeminiClient`])
//! - Bidirectional live audio sessions ([`live`])
//! - Rate-limit retry with exponential backoff

mod client;
pub mod live;
mod retry;
pub mod types;

pub use client::GeminiClient;
pub use live::{
    CloseReason, FrameSender, LiveConnection, LiveEvent, LiveSession, LiveTransport,
    SessionState, WsTransport,
};
pub use retry::{RetryPolicy, delay_for_attempt, with_retry};
