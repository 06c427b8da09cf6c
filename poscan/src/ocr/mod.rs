//! OCR engine strategies.
//!
//! Text extraction is a capability injected into the job runner behind the
//! [`TextExtractor`] trait, so engine selection is configuration, not code:
//! - [`FastEngine`]: local Tesseract via leptess; when the binary, the
//!   language data, or usable output is missing it substitutes a fixed,
//!   explicitly labeled simulated purchase-order text.
//! - [`TyphoonEngine`]: a locally hosted Typhoon vision model behind an
//!   OpenAI-compatible endpoint, lazily initialized once per process and
//!   falling back to [`FastEngine`] on any recoverable failure.
//!
//! Recoverable engine failures never reach the pipeline; they surface as an
//! advisory note on the result, which the runner propagates into the job's
//! warnings.

mod fast;
mod preprocessing;
mod typhoon;

use std::sync::Arc;

use async_trait::async_trait;

pub use fast::{FastEngine, SIMULATED_PO_TEXT};
pub use preprocessing::preprocess_image;
pub use typhoon::TyphoonEngine;

use crate::config::{OcrConfig, OcrMode};
use crate::error::Result;

/// Raw output of one OCR run.
#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub raw_text: String,
    /// Name of the engine that actually produced the text.
    pub engine: String,
    /// Advisory note (degradation reason, engine diagnostics). Propagated
    /// into the job's warnings by the pipeline.
    pub note: Option<String>,
}

/// Strategy interface for extracting raw text from a preprocessed image.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<OcrOutput>;
}

/// Build the configured engine. Construction itself never fails for a
/// degraded environment; degradation is reported per-run via notes.
pub fn build_extractor(config: &OcrConfig) -> Arc<dyn TextExtractor> {
    match config.mode {
        OcrMode::Fast => Arc::new(FastEngine::new(&config.languages)),
        OcrMode::Typhoon => Arc::new(TyphoonEngine::new(config.clone())),
    }
}
