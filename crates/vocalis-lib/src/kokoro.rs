//! Kokoro backend: talks to an OpenAI-compatible Kokoro server.
//!
//! ```text
//! KokoroLoader::load  → (sidecar: download weights → spawn koko → wait healthy)
//!                     → (remote:  probe server)
//! KokoroModel::generate → POST /v1/audio/speech (response_format=pcm) → Waveform
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use vocalis_core::types::{DownloadStatus, KokoroConfig, SynthesisRequest, Waveform};
use vocalis_core::wav::pcm_bytes_to_i16;

use crate::download;
use crate::error::{TtsError, TtsResult};
use crate::manager::SidecarManager;
use crate::model::{ModelLoader, SpeechModel};

/// Kokoro PCM output format: 24 kHz mono 16-bit signed LE.
pub const PCM_SAMPLE_RATE: u32 = 24_000;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for running the engine as a managed child process.
#[derive(Debug, Clone)]
pub struct SidecarOptions {
    pub models_dir: PathBuf,
    pub port: u16,
    pub startup_timeout: Duration,
}

struct Sidecar {
    options: SidecarOptions,
    manager: SidecarManager,
}

/// Brings a Kokoro engine up, either by probing an existing server or by
/// spawning one.
pub struct KokoroLoader {
    config: KokoroConfig,
    sidecar: Option<Sidecar>,
}

impl KokoroLoader {
    /// Use an already running server at `config.url`.
    pub fn remote(config: KokoroConfig) -> Self {
        Self {
            config,
            sidecar: None,
        }
    }

    /// Download the model files and spawn the engine on `options.port`.
    /// `config.url` is replaced with the sidecar's loopback address.
    pub fn sidecar(mut config: KokoroConfig, options: SidecarOptions) -> Self {
        let manager = SidecarManager::new(options.port);
        config.url = manager.url();
        Self {
            config,
            sidecar: Some(Sidecar { options, manager }),
        }
    }

    pub fn config(&self) -> &KokoroConfig {
        &self.config
    }

    /// Kill the sidecar, if any.
    pub async fn shutdown(&self) {
        if let Some(sidecar) = &self.sidecar {
            sidecar.manager.stop().await;
        }
    }

    async fn start_sidecar(&self, sidecar: &Sidecar) -> TtsResult<()> {
        let (model, voices) =
            download::ensure_kokoro_models(&sidecar.options.models_dir, |p| {
                if p.status == DownloadStatus::Complete {
                    info!("{} ready ({} bytes)", p.model, p.bytes_total);
                }
            })
            .await
            .map_err(|e| TtsError::model_load(e.to_string()))?;

        sidecar.manager.start(&model, &voices).await?;
        sidecar
            .manager
            .wait_for_health(sidecar.options.startup_timeout)
            .await
    }
}

impl ModelLoader for KokoroLoader {
    type Model = KokoroModel;

    fn describe(&self) -> String {
        match &self.sidecar {
            Some(s) => format!(
                "kokoro sidecar (models in {})",
                s.options.models_dir.display()
            ),
            None => format!("kokoro at {}", self.config.url),
        }
    }

    async fn load(&self) -> TtsResult<KokoroModel> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| TtsError::model_load(format!("failed to build HTTP client: {e}")))?;

        match &self.sidecar {
            Some(sidecar) => self.start_sidecar(sidecar).await?,
            None => probe(&client, &self.config.url).await?,
        }

        Ok(KokoroModel {
            client,
            config: self.config.clone(),
        })
    }
}

/// Any HTTP answer counts as reachable; only transport errors fail.
async fn probe(client: &reqwest::Client, url: &str) -> TtsResult<()> {
    client
        .get(format!("{}/", url.trim_end_matches('/')))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| TtsError::model_load(format!("kokoro server at {url} is unreachable: {e}")))
}

/// A reachable Kokoro server.
pub struct KokoroModel {
    client: reqwest::Client,
    config: KokoroConfig,
}

impl KokoroModel {
    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.config.url.trim_end_matches('/'))
    }
}

impl SpeechModel for KokoroModel {
    async fn generate(&self, request: &SynthesisRequest) -> TtsResult<Waveform> {
        let mut body = json!({
            "model": "kokoro",
            "input": request.text,
            "voice": request.speaker,
            "response_format": "pcm",
            "speed": self.config.speed,
            "stream": false,
        });
        if let Some(lang) = &request.language {
            body["lang_code"] = json!(lang);
        }

        debug!("kokoro: POST {} chars (voice {})", request.text.len(), request.speaker);

        let resp = self
            .client
            .post(self.speech_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| TtsError::generation(format!("kokoro request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TtsError::generation(format!("kokoro returned {status}: {text}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TtsError::generation(format!("kokoro response failed: {e}")))?;
        let samples = pcm_bytes_to_i16(&bytes);
        if samples.is_empty() {
            return Err(TtsError::generation("kokoro returned no audio"));
        }

        Ok(Waveform::new(samples, PCM_SAMPLE_RATE))
    }
}
