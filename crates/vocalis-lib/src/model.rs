//! Model seam: what a speech backend must provide, and the process-wide
//! lazily loaded instance the HTTP layer talks to.
//!
//! Loading is single-flight: concurrent first requests wait on one load. A
//! failed load leaves the slot empty, so the next request tries again.

use std::future::Future;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{error, info};

use vocalis_core::types::{SynthesisRequest, Waveform};

use crate::error::{TtsError, TtsResult};

/// A loaded text-to-speech model.
pub trait SpeechModel: Send + Sync + 'static {
    /// Synthesize one chunk of text.
    fn generate(
        &self,
        request: &SynthesisRequest,
    ) -> impl Future<Output = TtsResult<Waveform>> + Send;
}

/// Knows how to bring a [`SpeechModel`] up.
pub trait ModelLoader: Send + Sync + 'static {
    type Model: SpeechModel;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    fn load(&self) -> impl Future<Output = TtsResult<Self::Model>> + Send;
}

pub struct LazyModel<L: ModelLoader> {
    loader: L,
    cell: OnceCell<L::Model>,
}

impl<L: ModelLoader> LazyModel<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    /// Return the model, loading it first if needed.
    pub async fn get(&self) -> TtsResult<&L::Model> {
        self.cell
            .get_or_try_init(|| async {
                info!("loading model: {}", self.loader.describe());
                let t0 = Instant::now();
                let model = self
                    .loader
                    .load()
                    .await
                    .inspect_err(|e| error!("failed to load model: {e}"))?;
                info!("model loaded in {:?}", t0.elapsed());
                Ok::<_, TtsError>(model)
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::fakes::{FakeLoader, FakeModel};
    use super::*;

    #[tokio::test]
    async fn loads_once() {
        let loader = FakeLoader::new(FakeModel::new(10));
        let lazy = LazyModel::new(loader.clone());
        assert!(!lazy.is_loaded());

        lazy.get().await.unwrap();
        lazy.get().await.unwrap();

        assert!(lazy.is_loaded());
        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_requests_share_one_load() {
        let loader = FakeLoader::new(FakeModel::new(10));
        let lazy = Arc::new(LazyModel::new(loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                tokio::spawn(async move { lazy.get().await.is_ok() })
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap());
        }

        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let loader = FakeLoader::failing_first(FakeModel::new(10), 1);
        let lazy = LazyModel::new(loader.clone());

        let err = lazy.get().await.err().unwrap();
        assert!(matches!(err, TtsError::ModelLoad(_)));
        assert!(!lazy.is_loaded());

        lazy.get().await.unwrap();
        assert!(lazy.is_loaded());
        assert_eq!(loader.load_count(), 2);
    }
}
