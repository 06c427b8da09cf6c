use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

fn parse_env_or<T: FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub uploads_dir: String,
    pub max_upload_mb: u64,
    pub allowed_extensions: Vec<String>,
}

impl StorageConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

/// How workers obtain jobs to run. One of the two is selected at startup,
/// never mixed within a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Shared in-process FIFO channel, fed by the upload endpoint.
    Queue,
    /// Atomic claim of the oldest queued job from the shared store;
    /// tolerates multiple independent worker processes.
    Polling,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "polling" => Ok(Self::Polling),
            _ => Err(format!("Unknown dispatch mode: {s}")),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Polling => write!(f, "polling"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub count: usize,
    pub dispatch: DispatchMode,
    pub poll_interval_ms: u64,
    pub auto_save: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    /// Local Tesseract with a simulated-text fallback.
    Fast,
    /// Locally hosted Typhoon vision model, falling back to fast.
    Typhoon,
}

impl FromStr for OcrMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "typhoon" => Ok(Self::Typhoon),
            _ => Err(format!("Unknown OCR mode: {s}")),
        }
    }
}

impl fmt::Display for OcrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Typhoon => write!(f, "typhoon"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub mode: OcrMode,
    /// Local directory holding the downloaded Typhoon model weights.
    pub model_path: String,
    /// OpenAI-compatible endpoint of the local inference runtime.
    pub base_url: String,
    /// Model name passed to the inference runtime.
    pub model_name: String,
    pub languages: String,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
    pub min_image_dimension: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("POSCAN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("POSCAN_PORT", 8000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:storage/poscan.db".to_string()),
            },
            storage: StorageConfig {
                uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "storage/uploads".to_string()),
                max_upload_mb: parse_env_or("MAX_UPLOAD_MB", 8),
                allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                    .map(|v| v.split(',').map(|s| s.trim().to_lowercase()).collect())
                    .unwrap_or_else(|_| {
                        vec![".jpg".to_string(), ".jpeg".to_string(), ".png".to_string()]
                    }),
            },
            worker: WorkerConfig {
                count: parse_env_or("WORKER_COUNT", 1),
                dispatch: parse_env_or("WORKER_DISPATCH", DispatchMode::Queue),
                poll_interval_ms: parse_env_or("WORKER_POLL_INTERVAL_MS", 1000),
                auto_save: parse_env_or("AUTO_SAVE", false),
            },
            ocr: OcrConfig {
                mode: parse_env_or("OCR_MODE", OcrMode::Fast),
                model_path: env::var("TYPHOON_MODEL_PATH")
                    .unwrap_or_else(|_| "models/typhoon-ocr1.5-2b".to_string()),
                base_url: env::var("OCR_BASE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8080/v1".to_string()),
                model_name: env::var("OCR_MODEL_NAME").unwrap_or_else(|_| "typhoon-ocr".to_string()),
                languages: env::var("OCR_LANGUAGES").unwrap_or_else(|_| "tha+eng".to_string()),
                timeout_secs: parse_env_or("OCR_TIMEOUT_SECS", 60),
                max_image_dimension: parse_env_or("OCR_MAX_IMAGE_DIMENSION", 1400),
                min_image_dimension: parse_env_or("OCR_MIN_IMAGE_DIMENSION", 50),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_mode_parses() {
        assert_eq!("queue".parse::<DispatchMode>().unwrap(), DispatchMode::Queue);
        assert_eq!(
            "POLLING".parse::<DispatchMode>().unwrap(),
            DispatchMode::Polling
        );
        assert!("round-robin".parse::<DispatchMode>().is_err());
    }

    #[test]
    fn ocr_mode_parses() {
        assert_eq!("fast".parse::<OcrMode>().unwrap(), OcrMode::Fast);
        assert_eq!("Typhoon".parse::<OcrMode>().unwrap(), OcrMode::Typhoon);
        assert!("tesseract".parse::<OcrMode>().is_err());
    }
}
