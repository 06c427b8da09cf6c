use std::sync::Arc;

use async_trait::async_trait;
use leptess::LepTess;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{PoscanError, Result};

use super::{OcrOutput, TextExtractor};

/// Fixed placeholder used when no real OCR output is available. Keeps the
/// pipeline deterministic in environments without Tesseract, at the cost
/// of a visible warning on the job.
pub const SIMULATED_PO_TEXT: &str = "PO Number: PO-LOCAL-001\n\
PO Date: 2025-01-02\n\
Buyer: Local Buyer Co.,Ltd\n\
Sub Total: 1000.00\n\
VAT 7%: 70.00\n\
Grand Total: 1070.00\n\
Item A qty 2 unit pcs unit_price 500 line_total 1000";

/// Local deterministic engine: Tesseract when available, simulated text
/// otherwise. Never errors; degradation is reported via the note.
pub struct FastEngine {
    tesseract: Option<Arc<Mutex<LepTess>>>,
}

impl FastEngine {
    pub fn new(languages: &str) -> Self {
        let tesseract = match LepTess::new(None, languages) {
            Ok(lt) => {
                info!(languages = %languages, "Tesseract OCR initialized");
                Some(Arc::new(Mutex::new(lt)))
            }
            Err(e) => {
                warn!("Tesseract not available: {e}; fast OCR will use simulated text");
                None
            }
        };

        Self { tesseract }
    }

    fn simulated() -> OcrOutput {
        OcrOutput {
            raw_text: SIMULATED_PO_TEXT.to_string(),
            engine: "fast".to_string(),
            note: Some("using simulated OCR text".to_string()),
        }
    }

    async fn run_tesseract(tesseract: Arc<Mutex<LepTess>>, image: Vec<u8>) -> Result<String> {
        let text = tokio::task::spawn_blocking(move || {
            let mut lt = tesseract.blocking_lock();
            lt.set_image_from_mem(&image)
                .map_err(|e| PoscanError::Ocr(format!("Failed to set image: {e}")))?;
            lt.get_utf8_text()
                .map_err(|e| PoscanError::Ocr(format!("Failed to extract text: {e}")))
        })
        .await
        .map_err(|e| PoscanError::Ocr(format!("OCR task panicked: {e}")))??;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl TextExtractor for FastEngine {
    async fn extract(&self, image: &[u8]) -> Result<OcrOutput> {
        let Some(tesseract) = self.tesseract.as_ref() else {
            return Ok(Self::simulated());
        };

        match Self::run_tesseract(Arc::clone(tesseract), image.to_vec()).await {
            Ok(text) if !text.is_empty() => Ok(OcrOutput {
                raw_text: text,
                engine: "fast".to_string(),
                note: None,
            }),
            Ok(_) => Ok(Self::simulated()),
            Err(e) => {
                warn!("Tesseract run failed: {e}; using simulated text");
                Ok(Self::simulated())
            }
        }
    }
}
