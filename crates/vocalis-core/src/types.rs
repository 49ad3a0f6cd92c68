//! Shared types for the vocalis speech server.
//!
//! Kept free of tokio and reqwest so the CLI and any downstream client can
//! depend on the request/response shapes without the engine.

use serde::{Deserialize, Serialize};

use crate::text_prep::DEFAULT_MAX_CHUNK_LEN;

// ─── HTTP contract ─────────────────────────────────────────────────────────

/// Body of `POST /tts`. Both fields are optional at the JSON level so the
/// handler can answer a missing `text` with its own 400 body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// JSON error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `GET /health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

// ─── Synthesis types ───────────────────────────────────────────────────────

/// Mono 16-bit PCM produced by a single model call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Waveform {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// One validated unit of work for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub speaker: String,
    pub language: Option<String>,
}

// ─── Configuration ─────────────────────────────────────────────────────────

/// Connection settings for the Kokoro engine.
#[derive(Debug, Clone)]
pub struct KokoroConfig {
    /// Base URL of the OpenAI-compatible Kokoro server.
    pub url: String,
    pub speed: f32,
    pub timeout_secs: u64,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3001".into(),
            speed: 1.0,
            timeout_secs: 120,
        }
    }
}

/// How request text becomes model calls and how the results are rejoined.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Voice used when a request names no speaker.
    pub default_speaker: String,
    /// Language hint forwarded to the model (Kokoro `lang_code`, e.g. `a`).
    pub language: Option<String>,
    pub max_chunk_len: usize,
    /// Silence inserted between consecutive chunks.
    pub chunk_gap_ms: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            default_speaker: "af_heart".into(),
            language: None,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            chunk_gap_ms: 120,
        }
    }
}

// ─── Model files ───────────────────────────────────────────────────────────

/// Model file definition.
#[derive(Debug)]
pub struct ModelInfo {
    pub name: &'static str,
    pub filename: &'static str,
    pub url: &'static str,
    /// Approximate, only used for progress display when the server sends no length.
    pub expected_size: u64,
}

pub const KOKORO_MODEL: ModelInfo = ModelInfo {
    name: "kokoro",
    filename: "kokoro-v1.0.onnx",
    url: "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/kokoro-v1.0.onnx",
    expected_size: 326_000_000,
};

pub const KOKORO_VOICES: ModelInfo = ModelInfo {
    name: "kokoro-voices",
    filename: "voices-v1.0.bin",
    url: "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/voices-v1.0.bin",
    expected_size: 5_200_000,
};

/// Download progress payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub model: String,
    pub percent: f32,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub status: DownloadStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Downloading,
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_missing_fields() {
        let req: TtsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.text.is_none());
        assert!(req.speaker.is_none());
    }

    #[test]
    fn request_accepts_null_text_and_extra_fields() {
        let req: TtsRequest =
            serde_json::from_str(r#"{"text": null, "speaker": "am_adam", "format": "wav"}"#)
                .unwrap();
        assert!(req.text.is_none());
        assert_eq!(req.speaker.as_deref(), Some("am_adam"));
    }

    #[test]
    fn request_skips_absent_speaker_when_serialized() {
        let req = TtsRequest {
            text: Some("hi".into()),
            speaker: None,
        };
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"text":"hi"}"#);
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorBody {
            error: "No text provided".into(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "error": "No text provided" })
        );
    }

    #[test]
    fn download_status_serializes_lowercase() {
        let p = DownloadProgress {
            model: "kokoro".into(),
            percent: 100.0,
            bytes_done: 1,
            bytes_total: 1,
            status: DownloadStatus::Complete,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["status"], "complete");
        assert_eq!(v["bytesDone"], 1);
    }

    #[test]
    fn config_defaults() {
        let s = SynthesisConfig::default();
        assert_eq!(s.default_speaker, "af_heart");
        assert!(s.language.is_none());
        assert_eq!(s.max_chunk_len, DEFAULT_MAX_CHUNK_LEN);
        assert_eq!(KokoroConfig::default().timeout_secs, 120);
    }
}
