//! Sidecar lifecycle: spawns and monitors the Kokoro engine process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{TtsError, TtsResult};

/// Binary name of the Kokoro engine (`koko` from the Kokoros project).
pub const KOKORO_SIDECAR: &str = "koko";

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns at most one running engine process. The child is killed when the
/// manager is dropped.
pub struct SidecarManager {
    binary: String,
    port: u16,
    child: Mutex<Option<Child>>,
}

impl SidecarManager {
    pub fn new(port: u16) -> Self {
        Self::with_binary(KOKORO_SIDECAR, port)
    }

    pub fn with_binary(binary: impl Into<String>, port: u16) -> Self {
        Self {
            binary: binary.into(),
            port,
            child: Mutex::new(None),
        }
    }

    /// Base URL the engine serves on.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Spawn the engine unless it is already running.
    ///
    /// `koko --model <onnx> --data <voices> openai --ip 127.0.0.1 --port <port>`
    pub async fn start(&self, model_path: &Path, voices_path: &Path) -> TtsResult<()> {
        let mut slot = self.child.lock().await;
        if let Some(child) = slot.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                debug!("sidecar already running");
                return Ok(());
            }
        }

        // Anything already on the port would answer health checks in our place.
        if let Err(e) = tokio::net::TcpListener::bind(("127.0.0.1", self.port)).await {
            return Err(TtsError::model_load(format!(
                "sidecar port {} is already in use: {e}",
                self.port
            )));
        }

        let binary = resolve_sidecar(&self.binary)?;
        info!("starting sidecar {} on port {}", binary.display(), self.port);

        let mut child = tokio::process::Command::new(&binary)
            .arg("--model")
            .arg(model_path)
            .arg("--data")
            .arg(voices_path)
            .args(["openai", "--ip", "127.0.0.1", "--port", &self.port.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TtsError::model_load(format!("failed to spawn {}: {e}", binary.display()))
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                use tokio::io::{AsyncBufReadExt, BufReader};
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[kokoro] {line}");
                }
            });
        }

        *slot = Some(child);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        let mut slot = self.child.lock().await;
        match slot.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(_) => {
                *slot = None;
                false
            }
            None => false,
        }
    }

    /// Poll the engine until it answers HTTP or `timeout` elapses. Fails early
    /// if the process exits; an answer only counts while our child is alive.
    pub async fn wait_for_health(&self, timeout: Duration) -> TtsResult<()> {
        let url = format!("{}/", self.url());
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;

        loop {
            if !self.is_running().await {
                return Err(TtsError::model_load("kokoro sidecar exited during startup"));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TtsError::model_load(format!(
                    "kokoro sidecar did not become ready within {}s",
                    timeout.as_secs()
                )));
            }

            let answered = client
                .get(&url)
                .timeout(remaining.min(HEALTH_PROBE_TIMEOUT))
                .send()
                .await
                .is_ok();
            if answered && self.is_running().await {
                info!("sidecar ready on port {}", self.port);
                return Ok(());
            }

            tokio::time::sleep(HEALTH_POLL_INTERVAL.min(remaining)).await;
        }
    }

    pub async fn stop(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("failed to kill sidecar: {e}");
            }
        }
    }
}

/// Locate the engine binary: next to our executable (optionally with a target
/// triple suffix), otherwise rely on `PATH`.
fn resolve_sidecar(name: &str) -> TtsResult<PathBuf> {
    let exe = std::env::current_exe()?;
    let Some(exe_dir) = exe.parent() else {
        return Ok(PathBuf::from(name));
    };

    let candidates = [
        format!("{name}-{}", target_triple()),
        format!("{name}-{}.exe", target_triple()),
        name.to_string(),
        format!("{name}.exe"),
    ];
    for candidate in candidates {
        let path = exe_dir.join(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }

    Ok(PathBuf::from(name))
}

fn target_triple() -> &'static str {
    if cfg!(all(target_arch = "x86_64", target_os = "linux")) {
        "x86_64-unknown-linux-gnu"
    } else if cfg!(all(target_arch = "aarch64", target_os = "linux")) {
        "aarch64-unknown-linux-gnu"
    } else if cfg!(all(target_arch = "x86_64", target_os = "macos")) {
        "x86_64-apple-darwin"
    } else if cfg!(all(target_arch = "aarch64", target_os = "macos")) {
        "aarch64-apple-darwin"
    } else if cfg!(all(target_arch = "x86_64", target_os = "windows")) {
        "x86_64-pc-windows-msvc"
    } else {
        "unknown"
    }
}
