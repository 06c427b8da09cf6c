use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::error::{PoscanError, Result};

use super::{FastEngine, OcrOutput, TextExtractor};

const OCR_PROMPT: &str = "Extract all visible text from this purchase order image. \
Keep line breaks and preserve key-value formatting. Do not add explanations.";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

struct TyphoonComponents {
    client: Client,
    base_url: String,
    model_name: String,
}

/// Model-based engine: a Typhoon vision model hosted by a local
/// OpenAI-compatible runtime serving the downloaded weights. Components
/// are initialized once per process and shared by every job. Every
/// recoverable failure degrades to [`FastEngine`] with a note; the
/// pipeline never sees a model failure as an error.
pub struct TyphoonEngine {
    config: OcrConfig,
    fast: FastEngine,
    components: OnceCell<TyphoonComponents>,
}

impl TyphoonEngine {
    pub fn new(config: OcrConfig) -> Self {
        let fast = FastEngine::new(&config.languages);
        Self {
            config,
            fast,
            components: OnceCell::new(),
        }
    }

    async fn components(&self) -> Result<&TyphoonComponents> {
        self.components
            .get_or_try_init(|| async {
                if !Path::new(&self.config.model_path).exists() {
                    return Err(PoscanError::OcrUnavailable(format!(
                        "typhoon model path '{}' not found; set TYPHOON_MODEL_PATH to a downloaded local model directory",
                        self.config.model_path
                    )));
                }

                let client = Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()
                    .map_err(|e| PoscanError::Ocr(format!("Failed to create HTTP client: {e}")))?;

                info!(
                    base_url = %self.config.base_url,
                    model = %self.config.model_name,
                    "Typhoon OCR components initialized"
                );

                Ok(TyphoonComponents {
                    client,
                    base_url: self.config.base_url.clone(),
                    model_name: self.config.model_name.clone(),
                })
            })
            .await
    }

    async fn run_model(&self, image: &[u8]) -> Result<String> {
        let components = self.components().await?;

        let base64_image = STANDARD.encode(image);
        let data_url = format!("data:image/png;base64,{base64_image}");

        let request = ChatRequest {
            model: components.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: OCR_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 2048,
        };

        let response = components
            .client
            .post(format!("{}/chat/completions", components.base_url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PoscanError::Ocr(format!(
                "typhoon inference endpoint returned {}",
                response.status()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| PoscanError::Ocr(format!("Failed to parse response: {e}")))?;

        let text = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        Ok(text)
    }

    async fn fall_back(&self, image: &[u8], note: String) -> Result<OcrOutput> {
        warn!("{note}");
        let mut out = self.fast.extract(image).await?;
        out.note = Some(note);
        Ok(out)
    }
}

#[async_trait]
impl TextExtractor for TyphoonEngine {
    async fn extract(&self, image: &[u8]) -> Result<OcrOutput> {
        match self.run_model(image).await {
            Ok(text) if !text.is_empty() => Ok(OcrOutput {
                raw_text: text,
                engine: "typhoon".to_string(),
                note: Some("typhoon OCR local inference".to_string()),
            }),
            Ok(_) => {
                self.fall_back(image, "typhoon returned empty text; falling back to fast OCR".to_string())
                    .await
            }
            Err(e) => {
                self.fall_back(image, format!("typhoon inference error: {e}; falling back to fast OCR"))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(base_url: &str, model_path: &str) -> OcrConfig {
        OcrConfig {
            mode: crate::config::OcrMode::Typhoon,
            model_path: model_path.to_string(),
            base_url: base_url.to_string(),
            model_name: "typhoon-ocr".to_string(),
            languages: "tha+eng".to_string(),
            timeout_secs: 5,
            max_image_dimension: 1400,
            min_image_dimension: 50,
        }
    }

    fn chat_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1,
            "model": "typhoon-ocr",
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }
            ]
        })
    }

    #[tokio::test]
    async fn missing_model_path_falls_back_to_fast() {
        let engine = TyphoonEngine::new(make_config(
            "http://127.0.0.1:9",
            "/nonexistent/typhoon-weights",
        ));
        let out = engine.extract(&[]).await.unwrap();
        assert_eq!(out.engine, "fast");
        assert!(!out.raw_text.is_empty());
        let note = out.note.unwrap();
        assert!(note.contains("falling back to fast OCR"));
        assert!(note.contains("model path"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back_to_fast() {
        let model_dir = tempfile::tempdir().unwrap();
        let engine = TyphoonEngine::new(make_config(
            "http://127.0.0.1:9/v1",
            model_dir.path().to_str().unwrap(),
        ));
        let out = engine.extract(&[]).await.unwrap();
        assert_eq!(out.engine, "fast");
        assert!(!out.raw_text.is_empty());
        assert!(out.note.unwrap().contains("typhoon inference error"));
    }

    #[tokio::test]
    async fn empty_decode_falls_back_to_fast() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("   ")))
            .mount(&mock_server)
            .await;

        let model_dir = tempfile::tempdir().unwrap();
        let engine = TyphoonEngine::new(make_config(
            &mock_server.uri(),
            model_dir.path().to_str().unwrap(),
        ));
        let out = engine.extract(&[1, 2, 3]).await.unwrap();
        assert_eq!(out.engine, "fast");
        assert!(out.note.unwrap().contains("empty text"));
    }

    #[tokio::test]
    async fn successful_inference_uses_typhoon_engine() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response("PO Number: PO-9001\nGrand Total: 42")),
            )
            .mount(&mock_server)
            .await;

        let model_dir = tempfile::tempdir().unwrap();
        let engine = TyphoonEngine::new(make_config(
            &mock_server.uri(),
            model_dir.path().to_str().unwrap(),
        ));
        let out = engine.extract(&[1, 2, 3]).await.unwrap();
        assert_eq!(out.engine, "typhoon");
        assert!(out.raw_text.contains("PO-9001"));
        assert_eq!(out.note.as_deref(), Some("typhoon OCR local inference"));
    }
}
