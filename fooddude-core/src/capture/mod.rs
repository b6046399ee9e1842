//! Recording lifecycle: `Idle -> Listening -> Transcribing -> Idle`.
//!
//! [`CaptureController`] owns the single recording session of a client. It
//! drives an [`AudioRecorder`] and hands the finished audio to a
//! [`Transcriber`]. Whatever the transcriber returns, the controller ends up
//! back in `Idle`.

mod command;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::transcribe::{Transcriber, TranscriptionError};

pub use command::CommandRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
    Transcribing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone access was denied")]
    PermissionDenied,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Recording failed: {0}")]
    Device(String),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

/// Audio captured between `start` and `finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// A source of microphone audio.
#[async_trait]
pub trait AudioRecorder: Send {
    /// Returns false when microphone access is refused.
    async fn check_permission(&mut self) -> bool;

    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Stops recording and returns what was captured.
    async fn finish(&mut self) -> Result<CapturedAudio, CaptureError>;
}

pub struct CaptureController<R: AudioRecorder> {
    recorder: Mutex<R>,
    transcriber: Arc<dyn Transcriber>,
    state: watch::Sender<CaptureState>,
    timeout: Option<Duration>,
}

impl<R: AudioRecorder> CaptureController<R> {
    pub fn new(recorder: R, transcriber: Arc<dyn Transcriber>) -> Self {
        let (state, _) = watch::channel(CaptureState::Idle);
        Self {
            recorder: Mutex::new(recorder),
            transcriber,
            state,
            timeout: None,
        }
    }

    /// Bounds each transcription request. A request that runs past the limit
    /// fails with [`TranscriptionError::NetworkError`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Watches state changes, e.g. to drive a recording indicator.
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.subscribe()
    }

    pub async fn start(&self) -> Result<(), CaptureError> {
        let mut recorder = self.recorder.lock().await;
        let current = self.state();
        if current != CaptureState::Idle {
            return Err(CaptureError::AlreadyRecording);
        }

        if !recorder.check_permission().await {
            tracing::warn!("Microphone permission denied");
            return Err(CaptureError::PermissionDenied);
        }
        recorder.start().await?;

        self.state.send_replace(CaptureState::Listening);
        tracing::debug!("Capture started");
        Ok(())
    }

    /// Stops listening and transcribes the recording.
    ///
    /// Returns `Ok(None)` when nothing was being recorded.
    pub async fn stop(&self) -> Result<Option<String>, CaptureError> {
        let audio = {
            let mut recorder = self.recorder.lock().await;
            let current = self.state();
            if current != CaptureState::Listening {
                return Ok(None);
            }

            self.state.send_replace(CaptureState::Transcribing);
            match recorder.finish().await {
                Ok(audio) => audio,
                Err(e) => {
                    self.state.send_replace(CaptureState::Idle);
                    return Err(e);
                }
            }
        };

        tracing::debug!(
            "Transcribing {} bytes of {} via {}",
            audio.bytes.len(),
            audio.mime,
            self.transcriber.backend_label()
        );
        let result = self.transcribe(&audio).await;
        self.state.send_replace(CaptureState::Idle);

        match result {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                tracing::warn!("Transcription failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn transcribe(&self, audio: &CapturedAudio) -> Result<String, TranscriptionError> {
        let request = self.transcriber.transcribe(&audio.bytes, &audio.mime);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.unwrap_or_else(|_| {
                Err(TranscriptionError::NetworkError(format!(
                    "no response after {}s",
                    limit.as_secs()
                )))
            }),
            None => request.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeRecorder {
        denied: bool,
        recording: bool,
    }

    #[async_trait]
    impl AudioRecorder for FakeRecorder {
        async fn check_permission(&mut self) -> bool {
            !self.denied
        }

        async fn start(&mut self) -> Result<(), CaptureError> {
            self.recording = true;
            Ok(())
        }

        async fn finish(&mut self) -> Result<CapturedAudio, CaptureError> {
            self.recording = false;
            Ok(CapturedAudio {
                bytes: b"pcm".to_vec(),
                mime: "audio/wav".to_string(),
            })
        }
    }

    struct FixedTranscriber(Result<String, TranscriptionError>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, audio: &[u8], _mime: &str) -> Result<String, TranscriptionError> {
            assert_eq!(audio, b"pcm");
            self.0.clone()
        }
    }

    /// Blocks until released, so the Transcribing state can be observed.
    struct GatedTranscriber {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Transcriber for GatedTranscriber {
        async fn transcribe(&self, _audio: &[u8], _mime: &str) -> Result<String, TranscriptionError> {
            self.gate.notified().await;
            Ok("banana".to_string())
        }
    }

    fn controller(result: Result<String, TranscriptionError>) -> CaptureController<FakeRecorder> {
        CaptureController::new(FakeRecorder::default(), Arc::new(FixedTranscriber(result)))
    }

    #[tokio::test]
    async fn test_full_cycle_returns_text_and_idles() {
        let capture = controller(Ok("two eggs".to_string()));
        assert_eq!(capture.state(), CaptureState::Idle);

        capture.start().await.unwrap();
        assert_eq!(capture.state(), CaptureState::Listening);

        let text = capture.stop().await.unwrap();
        assert_eq!(text.as_deref(), Some("two eggs"));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_start_twice_is_already_recording() {
        let capture = controller(Ok(String::new()));
        capture.start().await.unwrap();
        assert_eq!(capture.start().await.unwrap_err(), CaptureError::AlreadyRecording);
        assert_eq!(capture.state(), CaptureState::Listening);
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle() {
        let recorder = FakeRecorder {
            denied: true,
            ..Default::default()
        };
        let capture = CaptureController::new(recorder, Arc::new(FixedTranscriber(Ok(String::new()))));

        assert_eq!(capture.start().await.unwrap_err(), CaptureError::PermissionDenied);
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let capture = controller(Ok("unused".to_string()));
        assert_eq!(capture.stop().await.unwrap(), None);
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_transcription_error_propagates_and_idles() {
        let capture = controller(Err(TranscriptionError::RateLimited));
        capture.start().await.unwrap();

        let err = capture.stop().await.unwrap_err();
        assert_eq!(err, CaptureError::Transcription(TranscriptionError::RateLimited));
        assert_eq!(capture.state(), CaptureState::Idle);

        // A new attempt is allowed after the failure.
        capture.start().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_while_transcribing_is_rejected() {
        let gate = Arc::new(Notify::new());
        let capture = Arc::new(CaptureController::new(
            FakeRecorder::default(),
            Arc::new(GatedTranscriber { gate: gate.clone() }),
        ));
        let mut states = capture.subscribe();

        capture.start().await.unwrap();
        let stopping = tokio::spawn({
            let capture = capture.clone();
            async move { capture.stop().await }
        });

        states
            .wait_for(|s| *s == CaptureState::Transcribing)
            .await
            .unwrap();
        assert_eq!(capture.start().await.unwrap_err(), CaptureError::AlreadyRecording);

        gate.notify_one();
        let text = stopping.await.unwrap().unwrap();
        assert_eq!(text.as_deref(), Some("banana"));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let capture = CaptureController::new(
            FakeRecorder::default(),
            Arc::new(GatedTranscriber {
                gate: Arc::new(Notify::new()),
            }),
        )
        .with_timeout(Duration::from_millis(20));

        capture.start().await.unwrap();
        let err = capture.stop().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Transcription(TranscriptionError::NetworkError(_))
        ));
        assert_eq!(capture.state(), CaptureState::Idle);
    }
}
