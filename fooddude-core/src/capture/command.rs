use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use uuid::Uuid;

use super::{AudioRecorder, CaptureError, CapturedAudio};

/// Records through an external program such as `arecord` or `sox`.
///
/// The output file path is appended as the last argument. Recording ends by
/// killing the process, so formats with a trailing header are not suitable.
pub struct CommandRecorder {
    program: String,
    args: Vec<String>,
    mime: String,
    output_dir: PathBuf,
    active: Option<(Child, PathBuf)>,
}

impl CommandRecorder {
    pub fn new(program: impl Into<String>, args: Vec<String>, mime: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            mime: mime.into(),
            output_dir: std::env::temp_dir(),
            active: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    fn extension(&self) -> &'static str {
        if self.mime.contains("wav") {
            "wav"
        } else if self.mime.contains("ogg") {
            "ogg"
        } else {
            "raw"
        }
    }
}

#[async_trait]
impl AudioRecorder for CommandRecorder {
    async fn check_permission(&mut self) -> bool {
        // Access is decided by the OS when the recorder opens the device.
        true
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let path = self
            .output_dir
            .join(format!("fooddude-{}.{}", Uuid::new_v4(), self.extension()));

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                ErrorKind::NotFound => {
                    CaptureError::Device(format!("recorder '{}' not found", self.program))
                }
                _ => CaptureError::Device(e.to_string()),
            })?;

        tracing::debug!("Recorder '{}' writing to {}", self.program, path.display());
        self.active = Some((child, path));
        Ok(())
    }

    async fn finish(&mut self) -> Result<CapturedAudio, CaptureError> {
        let (mut child, path) = self
            .active
            .take()
            .ok_or_else(|| CaptureError::Device("recorder was not started".to_string()))?;

        if matches!(child.try_wait(), Ok(None)) {
            let _ = child.start_kill();
        }
        let _ = child.wait().await;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CaptureError::Device(format!("no audio captured: {}", e)))?;
        let _ = tokio::fs::remove_file(&path).await;

        Ok(CapturedAudio {
            bytes,
            mime: self.mime.clone(),
        })
    }
}
