use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use roomcraft_contracts::wire::{GenerationPayload, GenerationResponse};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::WorkflowConfig;
use crate::error::{ConfigError, GenerationError};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub artifact_url: String,
    pub metadata: Map<String, Value>,
    pub inline_image: Option<String>,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        payload: &GenerationPayload,
    ) -> Result<GenerationOutcome, GenerationError>;
}

pub struct HttpGenerationClient {
    url: Url,
    http: reqwest::Client,
}

impl HttpGenerationClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http })
    }

    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        Self::new(config.generation_url()?, config.request_timeout())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Artifact URLs may come back relative to the service origin.
    fn resolve_artifact_url(&self, raw: &str) -> Result<String, GenerationError> {
        if raw.starts_with("data:") {
            return Ok(raw.to_string());
        }
        self.url
            .join(raw)
            .map(String::from)
            .map_err(|_| GenerationError::InvalidResponse(format!("unusable imageUrl '{raw}'")))
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        payload: &GenerationPayload,
    ) -> Result<GenerationOutcome, GenerationError> {
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;
        let parsed = response_json_or_error(response).await?;

        if !parsed.success {
            return Err(GenerationError::Rejected {
                message: parsed
                    .error_message()
                    .unwrap_or("Failed to generate design")
                    .to_string(),
            });
        }
        let raw_url = parsed.artifact_url().ok_or_else(|| {
            GenerationError::InvalidResponse("response did not include an imageUrl".to_string())
        })?;
        let artifact_url = self.resolve_artifact_url(raw_url)?;
        debug!(%artifact_url, "generation service returned artifact");
        Ok(GenerationOutcome {
            artifact_url,
            metadata: parsed.metadata_object(),
            inline_image: parsed.base64_image.clone(),
        })
    }
}

async fn response_json_or_error(
    response: reqwest::Response,
) -> Result<GenerationResponse, GenerationError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<GenerationResponse>(&body)
            .ok()
            .and_then(|parsed| parsed.error_message().map(str::to_string))
            .unwrap_or_else(|| {
                let text = truncate_text(body.trim(), 512);
                if text.is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });
        return Err(GenerationError::Status {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_str(&body).map_err(|err| {
        GenerationError::InvalidResponse(format!("{err}: {}", truncate_text(&body, 200)))
    })
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Offline client: answers every request with a flat colour derived from the
/// prompt, returned as a PNG data URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunGenerationClient;

#[async_trait]
impl GenerationClient for DryrunGenerationClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    async fn generate(
        &self,
        payload: &GenerationPayload,
    ) -> Result<GenerationOutcome, GenerationError> {
        let (width, height) = parse_dims(&payload.size);
        let png = render_dryrun_png(width, height, &payload.prompt)?;
        let encoded = BASE64.encode(&png);
        Ok(GenerationOutcome {
            artifact_url: format!("data:image/png;base64,{encoded}"),
            metadata: map_object(json!({
                "provider": "dryrun",
                "prompt": payload.prompt,
                "budgetLevel": payload.budget_level,
                "size": format!("{width}x{height}"),
                "digest": short_id(&payload.prompt),
            })),
            inline_image: Some(encoded),
        })
    }
}

fn render_dryrun_png(width: u32, height: u32, prompt: &str) -> Result<Vec<u8>, GenerationError> {
    let (r, g, b) = color_from_prompt(prompt);
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| GenerationError::InvalidResponse(format!("dryrun render failed: {err}")))?;
    Ok(cursor.into_inner())
}

fn parse_dims(size: &str) -> (u32, u32) {
    let mut parts = size.split(['x', 'X']);
    let width = parts.next().and_then(|raw| raw.trim().parse::<u32>().ok());
    let height = parts.next().and_then(|raw| raw.trim().parse::<u32>().ok());
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w.min(2048), h.min(2048)),
        _ => (1024, 1024),
    }
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use roomcraft_contracts::settings::{BudgetThresholds, GenerationSettings, SettingsField};
    use roomcraft_contracts::settings::{RoomType, Style};
    use roomcraft_contracts::wire::WizardVariant;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn kitchen_payload() -> GenerationPayload {
        let mut settings = GenerationSettings::default();
        settings.apply(SettingsField::Prompt("bright minimalist kitchen".to_string()));
        settings.apply(SettingsField::Style(Style::Modern));
        settings.apply(SettingsField::RoomType(RoomType::Kitchen));
        settings.apply(SettingsField::Budget(25_000));
        GenerationPayload::build(
            &settings,
            &BudgetThresholds::default(),
            &WizardVariant::Studio.profile(),
            Some("data:image/png;base64,AAAA".to_string()),
            Vec::new(),
        )
    }

    fn client_for(server: &MockServer) -> anyhow::Result<HttpGenerationClient> {
        let url = Url::parse(&server.uri())?.join("/api/generate-design")?;
        Ok(HttpGenerationClient::new(url, Duration::from_secs(5))?)
    }

    #[tokio::test]
    async fn posts_tier_tags_and_resolves_relative_url() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate-design"))
            .and(body_partial_json(json!({
                "budgetLevel": "high",
                "style": "modern",
                "roomType": "kitchen",
                "quality": "hd",
                "size": "1024x1024",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "imageUrl": "/generated-images/design-1.png",
                "metadata": {"model": "sdxl", "prompt": "bright minimalist kitchen"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)?.generate(&kitchen_payload()).await?;
        assert_eq!(
            outcome.artifact_url,
            format!("{}/generated-images/design-1.png", server.uri())
        );
        assert_eq!(outcome.metadata["model"], json!("sdxl"));
        assert_eq!(outcome.inline_image, None);
        Ok(())
    }

    #[tokio::test]
    async fn success_false_surfaces_service_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "error": "rate limited"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)?
            .generate(&kitchen_payload())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(matches!(err, GenerationError::Rejected { .. }));
        assert_eq!(err.user_message(), "rate limited");
        Ok(())
    }

    #[tokio::test]
    async fn server_error_uses_error_field() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "error": "Failed to generate design",
                "details": "upstream timeout",
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)?
            .generate(&kitchen_payload())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.user_message(), "Failed to generate design");
        Ok(())
    }

    #[tokio::test]
    async fn non_json_error_body_is_truncated_text() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server)?
            .generate(&kitchen_payload())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.user_message(), "bad gateway");
        Ok(())
    }

    #[tokio::test]
    async fn success_without_image_url_is_invalid() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let err = client_for(&server)?.generate(&kitchen_payload()).await;
        assert!(matches!(err, Err(GenerationError::InvalidResponse(_))));
        Ok(())
    }

    #[tokio::test]
    async fn dryrun_is_deterministic_per_prompt() -> anyhow::Result<()> {
        let mut payload = kitchen_payload();
        payload.size = "8x8".to_string();
        let first = DryrunGenerationClient.generate(&payload).await?;
        let second = DryrunGenerationClient.generate(&payload).await?;
        assert_eq!(first.artifact_url, second.artifact_url);
        assert!(first.artifact_url.starts_with("data:image/png;base64,"));
        assert_eq!(first.metadata["size"], json!("8x8"));

        payload.prompt = "dark industrial office".to_string();
        let third = DryrunGenerationClient.generate(&payload).await?;
        assert_ne!(first.artifact_url, third.artifact_url);
        Ok(())
    }

    #[test]
    fn parse_dims_falls_back_on_garbage() {
        assert_eq!(parse_dims("512x768"), (512, 768));
        assert_eq!(parse_dims("auto"), (1024, 1024));
        assert_eq!(parse_dims("0x10"), (1024, 1024));
    }
}
