//! Synthesis service: request text → model calls → one WAV buffer.
//!
//! ```text
//! synthesize(text, speaker) → chunk_text → generate(chunk) × N (in order)
//!     → concat with silence gaps → encode_wav
//! ```
//!
//! The service is a cheap cloneable handle; every clone shares the same
//! lazily loaded model.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use vocalis_core::text_prep::{NO_TEXT_PROVIDED, chunk_text, is_blank, preview};
use vocalis_core::types::{SynthesisConfig, SynthesisRequest};
use vocalis_core::wav::{duration_secs, encode_wav, silence};

use crate::error::{TtsError, TtsResult};
use crate::model::{LazyModel, ModelLoader, SpeechModel};

/// Characters of request text echoed into the log line.
const LOG_PREVIEW_CHARS: usize = 50;

pub struct TtsService<L: ModelLoader> {
    model: Arc<LazyModel<L>>,
    config: Arc<SynthesisConfig>,
}

impl<L: ModelLoader> Clone for TtsService<L> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L: ModelLoader> TtsService<L> {
    pub fn new(loader: L, config: SynthesisConfig) -> Self {
        Self {
            model: Arc::new(LazyModel::new(loader)),
            config: Arc::new(config),
        }
    }

    pub fn model(&self) -> &LazyModel<L> {
        &self.model
    }

    /// Speaker to use for a request: the requested one unless absent or blank.
    pub fn resolve_speaker(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.config.default_speaker.as_str())
            .to_string()
    }

    /// Synthesize `text` and return a complete WAV file.
    pub async fn synthesize(&self, text: &str, speaker: Option<&str>) -> TtsResult<Vec<u8>> {
        if is_blank(text) {
            return Err(TtsError::InvalidInput(NO_TEXT_PROVIDED.into()));
        }

        let speaker = self.resolve_speaker(speaker);
        info!(
            "generating speech for: {} (speaker: {speaker})",
            preview(text, LOG_PREVIEW_CHARS)
        );

        let model = self.model.get().await?;
        let t0 = Instant::now();

        let chunks = chunk_text(text, self.config.max_chunk_len);
        let total = chunks.len();
        let mut samples: Vec<i16> = Vec::new();
        let mut sample_rate = None;

        for (i, chunk) in chunks.into_iter().enumerate() {
            debug!("chunk {}/{total}: {} chars", i + 1, chunk.len());
            let wave = model
                .generate(&SynthesisRequest {
                    text: chunk,
                    speaker: speaker.clone(),
                    language: self.config.language.clone(),
                })
                .await?;

            let rate = *sample_rate.get_or_insert(wave.sample_rate);
            if wave.sample_rate != rate {
                return Err(TtsError::generation(format!(
                    "model changed sample rate mid-request ({rate} → {})",
                    wave.sample_rate
                )));
            }
            if i > 0 {
                samples.extend(silence(rate, self.config.chunk_gap_ms));
            }
            samples.extend(wave.samples);
        }

        let rate = sample_rate.unwrap_or_default();
        let wav = encode_wav(&samples, rate)?;
        info!(
            "generated {:.2}s of audio from {total} chunk(s) in {:?}",
            duration_secs(&samples, rate),
            t0.elapsed()
        );
        Ok(wav)
    }
}
