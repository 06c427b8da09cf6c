// Common test utilities for integration tests
use std::io::Cursor;
use std::sync::Once;

use async_trait::async_trait;
use tempfile::TempDir;

use poscan::config::{
    Config, DatabaseConfig, DispatchMode, OcrConfig, OcrMode, ServerConfig, StorageConfig,
    WorkerConfig,
};
use poscan::error::Result;
use poscan::ocr::{OcrOutput, TextExtractor};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A deterministic extractor that returns a scripted OCR result.
pub struct StubExtractor {
    pub text: String,
    pub engine: String,
    pub note: Option<String>,
}

impl StubExtractor {
    pub fn returning(text: &str) -> Self {
        Self {
            text: text.to_string(),
            engine: "stub".to_string(),
            note: None,
        }
    }
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(&self, _image: &[u8]) -> Result<OcrOutput> {
        Ok(OcrOutput {
            raw_text: self.text.clone(),
            engine: self.engine.clone(),
            note: self.note.clone(),
        })
    }
}

/// An extractor that never answers within any reasonable deadline.
pub struct StalledExtractor;

#[async_trait]
impl TextExtractor for StalledExtractor {
    async fn extract(&self, _image: &[u8]) -> Result<OcrOutput> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(OcrOutput {
            raw_text: String::new(),
            engine: "stalled".to_string(),
            note: None,
        })
    }
}

pub fn test_config(temp: &TempDir, auto_save: bool, dispatch: DispatchMode) -> Config {
    let db_path = temp.path().join("poscan_test.db");
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: format!("file:{}", db_path.display()),
        },
        storage: StorageConfig {
            uploads_dir: temp.path().join("uploads").display().to_string(),
            max_upload_mb: 8,
            allowed_extensions: vec![".jpg".into(), ".jpeg".into(), ".png".into()],
        },
        worker: WorkerConfig {
            count: 1,
            dispatch,
            auto_save,
            poll_interval_ms: 100,
        },
        ocr: OcrConfig {
            mode: OcrMode::Fast,
            model_path: temp.path().join("no-model").display().to_string(),
            base_url: "http://127.0.0.1:9/v1".to_string(),
            model_name: "typhoon-ocr".to_string(),
            languages: "eng".to_string(),
            timeout_secs: 5,
            max_image_dimension: 1400,
            min_image_dimension: 50,
        },
    }
}

/// Write a small valid PNG into the temp dir and return its path.
pub fn write_test_image(temp: &TempDir, name: &str) -> String {
    let img = image::RgbImage::from_pixel(200, 120, image::Rgb([230u8, 230, 230]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode test png");
    let path = temp.path().join(name);
    std::fs::write(&path, bytes).expect("write test png");
    path.display().to_string()
}
