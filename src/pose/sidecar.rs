//! Pose estimation through an external sidecar process
//!
//! The model runs out of process (e.g. a MediaPipe worker). Each frame is one
//! JSON line on the child's stdin, `{"width", "height", "rgb"}` with `rgb`
//! the base64 of the packed RGB8 pixels, and one JSON line comes back:
//! `{"landmarks": [...]}`, `{"landmarks": null}` or `{"error": "..."}`.
//!
//! A single child serves all sessions; requests are serialized behind a
//! mutex so responses cannot interleave.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::analysis::LandmarkSet;
use crate::pose::traits::{EstimatorError, PoseEstimator};

#[derive(Serialize)]
struct EstimateRequest<'a> {
    width: u32,
    height: u32,
    rgb: &'a str,
}

#[derive(Deserialize)]
struct EstimateResponse {
    #[serde(default)]
    landmarks: Option<LandmarkSet>,
    #[serde(default)]
    error: Option<String>,
}

struct SidecarProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

pub struct SidecarEstimator {
    program: String,
    process: Arc<Mutex<Option<SidecarProcess>>>,
}

impl SidecarEstimator {
    /// Spawn from a whitespace separated command line.
    ///
    /// A sidecar that fails to start is not an error here: the estimator is
    /// created unavailable and every session is told so when it connects.
    pub fn spawn(command_line: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self::spawn_with(program, parts.collect())
    }

    pub fn spawn_with(program: String, args: Vec<String>) -> Self {
        let process = match Self::start(&program, &args) {
            Ok(process) => {
                info!("SidecarEstimator: started '{}'", program);
                Some(process)
            }
            Err(e) => {
                error!("SidecarEstimator: failed to start '{}': {}", program, e);
                None
            }
        };

        Self {
            program,
            process: Arc::new(Mutex::new(process)),
        }
    }

    fn start(program: &str, args: &[String]) -> anyhow::Result<SidecarProcess> {
        if program.is_empty() {
            anyhow::bail!("no estimator command configured");
        }

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("No stdin on sidecar"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("No stdout on sidecar"))?;

        Ok(SidecarProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn round_trip(process: &mut SidecarProcess, request: &str) -> std::io::Result<Option<String>> {
        process.stdin.write_all(request.as_bytes()).await?;
        process.stdin.write_all(b"\n").await?;
        process.stdin.flush().await?;
        process.stdout.next_line().await
    }

    /// One request line out, one response line back
    async fn exchange(
        process: Arc<Mutex<Option<SidecarProcess>>>,
        program: String,
        request: String,
    ) -> Result<String, EstimatorError> {
        let mut guard = process.lock_owned().await;
        let Some(child) = guard.as_mut() else {
            return Err(EstimatorError::Unavailable(format!("sidecar '{}' is not running", program)));
        };

        match Self::round_trip(child, &request).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => {
                warn!("SidecarEstimator: '{}' closed its output", program);
                guard.take();
                Err(EstimatorError::Unavailable(format!("sidecar '{}' exited", program)))
            }
            Err(e) => {
                warn!("SidecarEstimator: I/O error with '{}': {}", program, e);
                guard.take();
                Err(EstimatorError::Unavailable(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl PoseEstimator for SidecarEstimator {
    async fn estimate(&self, image: &RgbImage) -> Result<Option<LandmarkSet>, EstimatorError> {
        let rgb = STANDARD.encode(image.as_raw());
        let request = serde_json::to_string(&EstimateRequest {
            width: image.width(),
            height: image.height(),
            rgb: &rgb,
        })
        .map_err(|e| EstimatorError::Failed(e.to_string()))?;

        // runs to completion even if this call is dropped
        let exchange = tokio::spawn(Self::exchange(Arc::clone(&self.process), self.program.clone(), request));
        let line = exchange
            .await
            .map_err(|e| EstimatorError::Failed(format!("sidecar exchange task failed: {}", e)))??;

        let response: EstimateResponse =
            serde_json::from_str(&line).map_err(|e| EstimatorError::Failed(format!("bad sidecar response: {}", e)))?;

        if let Some(err) = response.error {
            return Err(EstimatorError::Failed(err));
        }
        Ok(response.landmarks.filter(|set| !set.is_empty()))
    }

    async fn is_available(&self) -> bool {
        let mut guard = self.process.lock().await;
        let alive = match guard.as_mut() {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        };
        if !alive && guard.is_some() {
            warn!("SidecarEstimator: '{}' has exited", self.program);
            guard.take();
        }
        alive
    }

    fn name(&self) -> &'static str {
        "SidecarEstimator"
    }
}
