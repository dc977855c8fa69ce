// Remote detector - one call to an OpenAI-compatible multimodal endpoint
//
// Every outcome (missing image, timeout, bad status, odd envelope) is
// normalized into a DetectionResult; nothing is propagated as Err.

use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::catalog::DiseaseCatalog;
use super::errors::DetectError;
use super::extraction::extract_details;
use super::models::{DetectionResult, Mode};
use super::traits::DiseaseDetector;
use super::utils::round_to;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-vl-plus";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const COMPLETIONS_PATH: &str = "/chat/completions";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_MAX_TOKENS: u32 = 10;

/// Connection and model settings for the remote endpoint
#[derive(Clone)]
pub struct RemoteSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    /// http/https/socks5 proxy URL
    pub proxy: Option<String>,
    /// Skip TLS certificate verification. Trusted test environments only.
    pub accept_invalid_certs: bool,
}

impl RemoteSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1500,
            temperature: 0.1,
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            accept_invalid_certs: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_insecure_tls(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), COMPLETIONS_PATH)
    }
}

// Keep the key out of logs
impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Result of a connectivity test
#[derive(Debug)]
pub enum ProbeOutcome {
    Connected { status: u16, body: Value },
    /// 401: key rejected
    Unauthorized,
    HttpError { status: u16, body: String },
    /// Nothing usable came back (credential, transport, timeout)
    Failed(DetectError),
}

pub struct RemoteInferenceClient {
    settings: RemoteSettings,
    http: reqwest::Client,
    catalog: DiseaseCatalog,
}

impl RemoteInferenceClient {
    pub fn new(settings: RemoteSettings) -> Result<Self, DetectError> {
        let http = Self::build_http(&settings)?;
        Ok(Self {
            settings,
            http,
            catalog: DiseaseCatalog::builtin(),
        })
    }

    fn build_http(settings: &RemoteSettings) -> Result<reqwest::Client, DetectError> {
        let mut builder = reqwest::Client::builder().timeout(settings.timeout);

        if let Some(proxy_url) = settings.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                DetectError::ClientSetup(format!("invalid proxy {}: {}", proxy_url, e))
            })?;
            info!("Using proxy {}", proxy_url);
            builder = builder.proxy(proxy);
        }

        if settings.accept_invalid_certs {
            warn!("TLS certificate verification is DISABLED for {}", settings.base_url);
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| DetectError::ClientSetup(e.to_string()))
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// Instruction sent with every image
    pub fn create_prompt(crop_label: &str) -> String {
        format!(
            "你是一位资深农业专家，请分析这张{crop}的田间图像。\n\n\
             请按以下结构化格式返回病虫害识别结果：\n\
             1. **病害名称**：识别出的主要病害或虫害名称\n\
             2. **症状描述**：详细描述病害症状\n\
             3. **严重程度**：评估严重程度（轻微/中等/严重）\n\
             4. **置信度**：你对识别结果的置信度（0-100%）\n\
             5. **防治建议**：提供具体的防治措施和用药建议\n\
             6. **紧急程度**：处理紧急程度（低/中/高）\n\n\
             如果图像中未发现明显病虫害，请返回作物健康状况。\n\n\
             请用中文回答，确保建议专业、实用。",
            crop = crop_label
        )
    }

    pub fn build_request(&self, prompt: String, image_base64: &str) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                        },
                    },
                ]),
            }],
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
        }
    }

    async fn encode_image(image_path: &Path) -> Result<String, DetectError> {
        if !image_path.exists() {
            return Err(DetectError::ImageNotFound(image_path.to_path_buf()));
        }

        let bytes = tokio::fs::read(image_path).await.map_err(|e| {
            warn!("Failed to read {}: {}", image_path.display(), e);
            DetectError::ImageEncoding
        })?;

        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Primary text answer from a completion envelope
    pub fn answer_text(raw: &Value) -> Option<String> {
        match &raw["choices"][0]["message"]["content"] {
            Value::String(text) => Some(text.clone()),
            Value::Array(parts) => {
                let text: String = parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            _ => None,
        }
    }

    fn credential(&self) -> Result<&str, DetectError> {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            Err(DetectError::MissingCredential)
        } else {
            Ok(key)
        }
    }

    pub async fn detect(&self, image_path: &Path, crop_type: &str) -> DetectionResult {
        let image_base64 = match Self::encode_image(image_path).await {
            Ok(encoded) => encoded,
            Err(e) => return DetectionResult::failure(Mode::Remote, e),
        };

        let api_key = match self.credential() {
            Ok(key) => key,
            Err(e) => return DetectionResult::failure(Mode::Remote, e),
        };

        let crop_label = self
            .catalog
            .lookup(crop_type)
            .map(|c| c.label)
            .unwrap_or(crop_type);
        let payload = self.build_request(Self::create_prompt(crop_label), &image_base64);

        info!(
            "Calling {} for {}",
            self.settings.model,
            image_path.file_name().unwrap_or_default().to_string_lossy()
        );
        let started = Instant::now();

        let response = match self
            .http
            .post(self.settings.endpoint())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = DetectError::from_transport(&e, self.settings.timeout);
                warn!("✗ Remote request failed: {}", err);
                return DetectionResult::failure(Mode::Remote, err);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let err = DetectError::from_transport(&e, self.settings.timeout);
                warn!("✗ Reading remote response failed: {}", err);
                return DetectionResult::failure(Mode::Remote, err);
            }
        };
        let elapsed = round_to(started.elapsed().as_secs_f64(), 2);

        if status != reqwest::StatusCode::OK {
            let err = DetectError::http_status(status.as_u16(), &body);
            warn!("✗ Remote returned {} after {}s", status, elapsed);
            return DetectionResult::failure(Mode::Remote, err).with_response_time(elapsed);
        }

        let raw: Value = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("✗ Response is not JSON: {}", e);
                return DetectionResult::failure(Mode::Remote, DetectError::MalformedResponse)
                    .with_response_time(elapsed)
                    .with_raw_response(Value::String(body));
            }
        };

        match Self::answer_text(&raw) {
            Some(answer) => {
                debug!("Remote answer: {}", answer);
                let details = extract_details(&answer);
                info!("✓ Remote answered in {}s", elapsed);
                DetectionResult::success(Mode::Remote, answer, details)
                    .with_response_time(elapsed)
                    .with_raw_response(raw)
            }
            None => {
                warn!("✗ Response has no choices[0].message.content");
                DetectionResult::failure(Mode::Remote, DetectError::MalformedResponse)
                    .with_response_time(elapsed)
                    .with_raw_response(raw)
            }
        }
    }

    /// Text-only round trip to check key and connectivity
    pub async fn probe(&self) -> ProbeOutcome {
        let api_key = match self.credential() {
            Ok(key) => key,
            Err(e) => return ProbeOutcome::Failed(e),
        };

        let payload = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Text("你好，简单测试一下".to_string()),
            }],
            max_tokens: PROBE_MAX_TOKENS,
            temperature: None,
        };

        let timeout = PROBE_TIMEOUT.min(self.settings.timeout);
        let response = match self
            .http
            .post(self.settings.endpoint())
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::Failed(DetectError::from_transport(&e, timeout)),
        };

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match status {
            200 => ProbeOutcome::Connected {
                status,
                body: serde_json::from_str(&body).unwrap_or(Value::String(body)),
            },
            401 => ProbeOutcome::Unauthorized,
            _ => ProbeOutcome::HttpError {
                status,
                body: super::utils::truncate_chars(&body, super::errors::ERROR_BODY_LIMIT),
            },
        }
    }
}

#[async_trait]
impl DiseaseDetector for RemoteInferenceClient {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn detect(&self, image_path: &Path, crop_type: &str) -> DetectionResult {
        RemoteInferenceClient::detect(self, image_path, crop_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> RemoteInferenceClient {
        RemoteInferenceClient::new(RemoteSettings::new("sk-test")).unwrap()
    }

    #[test]
    fn test_endpoint_joins_path() {
        let settings = RemoteSettings::new("k").with_base_url("http://localhost:9000/v1/");
        assert_eq!(settings.endpoint(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = RemoteSettings::new("sk-secret");
        assert!(!format!("{:?}", settings).contains("sk-secret"));
    }

    #[test]
    fn test_prompt_mentions_crop_and_fields() {
        let prompt = RemoteInferenceClient::create_prompt("小麦");
        assert!(prompt.contains("小麦"));
        for field in ["病害名称", "症状描述", "严重程度", "置信度", "防治建议", "紧急程度"] {
            assert!(prompt.contains(field), "missing {}", field);
        }
    }

    #[test]
    fn test_request_wire_format() {
        let request = client().build_request("prompt".to_string(), "QUJD");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["max_tokens"], 1500);
        let content = &json["messages"][0]["content"];
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "prompt");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_answer_text_variants() {
        let plain = json!({"choices": [{"message": {"content": "稻瘟病"}}]});
        assert_eq!(RemoteInferenceClient::answer_text(&plain).as_deref(), Some("稻瘟病"));

        let parts = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "纹枯"},
            {"type": "text", "text": "病"}
        ]}}]});
        assert_eq!(RemoteInferenceClient::answer_text(&parts).as_deref(), Some("纹枯病"));

        assert!(RemoteInferenceClient::answer_text(&json!({"choices": []})).is_none());
        assert!(RemoteInferenceClient::answer_text(&json!({"error": "x"})).is_none());
    }

    #[tokio::test]
    async fn test_missing_image_sends_nothing() {
        let result = client().detect(Path::new("/nonexistent/leaf.jpg"), "rice").await;
        assert!(!result.is_success());
        assert_eq!(result.mode, Mode::Remote);
        assert_eq!(result.error.as_deref(), Some("image not found: /nonexistent/leaf.jpg"));
        assert!(result.response_time.is_none());
    }

    #[tokio::test]
    async fn test_blank_key_is_reported_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        std::fs::write(&image, b"\xff\xd8\xff").unwrap();

        let client = RemoteInferenceClient::new(RemoteSettings::new("  ")).unwrap();
        let result = client.detect(&image, "rice").await;
        assert_eq!(result.error.as_deref(), Some("missing API credential"));
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let settings = RemoteSettings::new("k").with_proxy(Some("::not a url::".to_string()));
        assert!(matches!(
            RemoteInferenceClient::new(settings),
            Err(DetectError::ClientSetup(_))
        ));
    }
}
