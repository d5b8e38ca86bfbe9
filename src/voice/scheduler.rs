//! Gapless scheduling of sequentially arriving audio chunks

use std::sync::Arc;

use crate::voice::AudioBuffer;

/// Identifies one scheduled buffer on a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackHandle(pub u64);

/// Audio output with its own clock
pub trait AudioSink: Send + Sync {
    /// Current audio clock time in seconds
    fn now(&self) -> f64;

    /// Commit a buffer to start at `start` seconds on the audio clock
    fn play_at(&self, buffer: AudioBuffer, start: f64) -> PlaybackHandle;

    /// Cancel every buffer that has been committed but not finished
    fn stop_all(&self);
}

impl<S: AudioSink + ?Sized> AudioSink for Arc<S> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn play_at(&self, buffer: AudioBuffer, start: f64) -> PlaybackHandle {
        (**self).play_at(buffer, start)
    }

    fn stop_all(&self) {
        (**self).stop_all();
    }
}

/// Keeps chunks playing back-to-back on one sink
///
/// Each spoken context (a live session, a narrated lesson step) owns its
/// own scheduler; cursors are never shared between contexts.
pub struct PlaybackScheduler<S> {
    sink: S,
    cursor: f64,
    barge_in: bool,
}

impl<S: AudioSink> PlaybackScheduler<S> {
    /// Create a scheduler over `sink`
    ///
    /// With `barge_in` set, [`interrupt`](Self::interrupt) also cancels
    /// buffers already committed to the sink.
    pub const fn new(sink: S, barge_in: bool) -> Self {
        Self {
            sink,
            cursor: 0.0,
            barge_in,
        }
    }

    /// Schedule a buffer after everything queued so far
    ///
    /// Returns the start time. A late chunk starts immediately and later
    /// chunks queue behind it.
    pub fn enqueue(&mut self, buffer: AudioBuffer) -> f64 {
        let start = self.cursor.max(self.sink.now());
        let duration = buffer.duration();
        let handle = self.sink.play_at(buffer, start);
        self.cursor = start + duration;

        tracing::trace!(?handle, start, duration, "scheduled audio chunk");
        start
    }

    /// Forget queued timing so the next chunk starts at the clock's now
    pub fn interrupt(&mut self) {
        self.cursor = 0.0;
        if self.barge_in {
            self.sink.stop_all();
        }
        tracing::debug!(barge_in = self.barge_in, "playback interrupted");
    }

    /// Time the next chunk would start if the clock stood still
    #[must_use]
    pub const fn cursor(&self) -> f64 {
        self.cursor
    }

    /// The underlying sink
    pub const fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct ManualSink {
        now: Mutex<f64>,
        started: Mutex<Vec<f64>>,
        stops: Mutex<u32>,
    }

    impl AudioSink for ManualSink {
        fn now(&self) -> f64 {
            *self.now.lock().unwrap()
        }

        fn play_at(&self, _buffer: AudioBuffer, start: f64) -> PlaybackHandle {
            let mut started = self.started.lock().unwrap();
            started.push(start);
            PlaybackHandle(started.len() as u64)
        }

        fn stop_all(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    fn half_second() -> AudioBuffer {
        AudioBuffer::mono(vec![0.0; 12_000], 24_000)
    }

    #[test]
    fn chunks_play_back_to_back() {
        let mut scheduler = PlaybackScheduler::new(ManualSink::default(), false);

        assert!(scheduler.enqueue(half_second()).abs() < 1e-9);
        assert!((scheduler.enqueue(half_second()) - 0.5).abs() < 1e-9);
        assert!((scheduler.enqueue(half_second()) - 1.0).abs() < 1e-9);
        assert!((scheduler.cursor() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn late_chunk_starts_now() {
        let mut scheduler = PlaybackScheduler::new(ManualSink::default(), false);
        scheduler.enqueue(half_second());

        *scheduler.sink().now.lock().unwrap() = 3.0;
        assert!((scheduler.enqueue(half_second()) - 3.0).abs() < 1e-9);
        assert!((scheduler.cursor() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn interrupt_resets_cursor_without_barge_in() {
        let mut scheduler = PlaybackScheduler::new(ManualSink::default(), false);
        scheduler.enqueue(half_second());
        scheduler.interrupt();

        assert!(scheduler.cursor().abs() < f64::EPSILON);
        assert_eq!(*scheduler.sink().stops.lock().unwrap(), 0);
    }

    #[test]
    fn interrupt_with_barge_in_stops_sink() {
        let mut scheduler = PlaybackScheduler::new(ManualSink::default(), true);
        scheduler.enqueue(half_second());
        scheduler.interrupt();

        assert_eq!(*scheduler.sink().stops.lock().unwrap(), 1);
    }
}
