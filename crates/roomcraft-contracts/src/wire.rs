use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::settings::{BudgetLevel, BudgetThresholds, GenerationSettings, RoomType, Style};

pub const DEFAULT_QUALITY: &str = "hd";
pub const DEFAULT_SIZE: &str = "1024x1024";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardVariant {
    #[default]
    Studio,
    Flux,
}

impl WizardVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            WizardVariant::Studio => "studio",
            WizardVariant::Flux => "flux",
        }
    }

    pub fn endpoint_path(self) -> &'static str {
        match self {
            WizardVariant::Studio => "/api/generate-design",
            WizardVariant::Flux => "/api/stable-diffusion-generator",
        }
    }

    pub fn profile(self) -> PayloadProfile {
        match self {
            WizardVariant::Studio => {
                let mut extras = Map::new();
                extras.insert("num_inference_steps".to_string(), json!(40));
                extras.insert("guidance_scale".to_string(), json!(7.5));
                PayloadProfile {
                    variant: self,
                    inline_primary_image: true,
                    inline_auxiliary_images: false,
                    include_raw_budget: true,
                    quality: DEFAULT_QUALITY.to_string(),
                    size: DEFAULT_SIZE.to_string(),
                    extras,
                }
            }
            WizardVariant::Flux => {
                let mut extras = Map::new();
                extras.insert("dalleStyle".to_string(), json!("natural"));
                PayloadProfile {
                    variant: self,
                    inline_primary_image: false,
                    inline_auxiliary_images: false,
                    include_raw_budget: false,
                    quality: DEFAULT_QUALITY.to_string(),
                    size: DEFAULT_SIZE.to_string(),
                    extras,
                }
            }
        }
    }
}

impl fmt::Display for WizardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WizardVariant {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "studio" | "design-studio" => Ok(WizardVariant::Studio),
            "flux" | "flux-designer" => Ok(WizardVariant::Flux),
            other => Err(format!("unknown wizard variant '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadProfile {
    pub variant: WizardVariant,
    pub inline_primary_image: bool,
    pub inline_auxiliary_images: bool,
    pub include_raw_budget: bool,
    pub quality: String,
    pub size: String,
    pub extras: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    pub prompt: String,
    pub style: Style,
    pub room_type: RoomType,
    pub budget_level: BudgetLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<u32>,
    pub quality: String,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl GenerationPayload {
    /// Build the body from a settings snapshot. Image data URLs are supplied
    /// by the caller and dropped here when the profile does not inline them.
    pub fn build(
        settings: &GenerationSettings,
        thresholds: &BudgetThresholds,
        profile: &PayloadProfile,
        main_image: Option<String>,
        elements: Vec<String>,
    ) -> Self {
        Self {
            prompt: settings.trimmed_prompt().to_string(),
            style: settings.style,
            room_type: settings.room_type,
            budget_level: settings.budget_level(thresholds),
            budget: profile.include_raw_budget.then_some(settings.bounded_budget()),
            quality: profile.quality.clone(),
            size: profile.size.clone(),
            main_image: main_image.filter(|_| profile.inline_primary_image),
            elements: if profile.inline_auxiliary_images {
                elements
            } else {
                Vec::new()
            },
            extras: profile.extras.clone(),
        }
    }

    pub fn has_inline_image(&self) -> bool {
        self.main_image.is_some() || !self.elements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub base64_image: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl GenerationResponse {
    pub fn artifact_url(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn metadata_object(&self) -> Map<String, Value> {
        match &self.metadata {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
            None => Map::new(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::settings::SettingsField;

    fn kitchen_settings() -> GenerationSettings {
        let mut settings = GenerationSettings::default();
        settings.apply(SettingsField::Prompt("bright minimalist kitchen".to_string()));
        settings.apply(SettingsField::Style(Style::Modern));
        settings.apply(SettingsField::RoomType(RoomType::Kitchen));
        settings.apply(SettingsField::Budget(25_000));
        settings
    }

    #[test]
    fn studio_payload_carries_tier_tags_and_image() -> anyhow::Result<()> {
        let payload = GenerationPayload::build(
            &kitchen_settings(),
            &BudgetThresholds::default(),
            &WizardVariant::Studio.profile(),
            Some("data:image/png;base64,AAAA".to_string()),
            vec!["data:image/png;base64,BBBB".to_string()],
        );
        let body = serde_json::to_value(&payload)?;
        assert_eq!(body["budgetLevel"], json!("high"));
        assert_eq!(body["style"], json!("modern"));
        assert_eq!(body["roomType"], json!("kitchen"));
        assert_eq!(body["budget"], json!(25_000));
        assert_eq!(body["quality"], json!("hd"));
        assert_eq!(body["size"], json!("1024x1024"));
        assert_eq!(body["mainImage"], json!("data:image/png;base64,AAAA"));
        assert_eq!(body["num_inference_steps"], json!(40));
        assert!(body.get("elements").is_none());
        Ok(())
    }

    #[test]
    fn raw_budget_on_the_wire_stays_in_range() -> anyhow::Result<()> {
        let settings = GenerationSettings {
            budget: 100,
            ..kitchen_settings()
        };
        let payload = GenerationPayload::build(
            &settings,
            &BudgetThresholds::default(),
            &WizardVariant::Studio.profile(),
            None,
            Vec::new(),
        );
        assert_eq!(payload.budget, Some(crate::settings::BUDGET_MIN));
        assert_eq!(serde_json::to_value(&payload)?["budgetLevel"], json!("low"));
        Ok(())
    }

    #[test]
    fn flux_payload_is_text_only() -> anyhow::Result<()> {
        let payload = GenerationPayload::build(
            &kitchen_settings(),
            &BudgetThresholds::default(),
            &WizardVariant::Flux.profile(),
            Some("data:image/png;base64,AAAA".to_string()),
            Vec::new(),
        );
        assert!(!payload.has_inline_image());
        let body = serde_json::to_value(&payload)?;
        assert!(body.get("mainImage").is_none());
        assert!(body.get("budget").is_none());
        assert_eq!(body["dalleStyle"], json!("natural"));
        assert_eq!(body["prompt"], json!("bright minimalist kitchen"));
        Ok(())
    }

    #[test]
    fn response_without_url_has_no_artifact() -> anyhow::Result<()> {
        let response: GenerationResponse =
            serde_json::from_value(json!({"success": true, "imageUrl": "  "}))?;
        assert_eq!(response.artifact_url(), None);

        let response: GenerationResponse = serde_json::from_value(
            json!({"success": false, "imageUrl": "/x.png", "error": "rate limited"}),
        )?;
        assert_eq!(response.artifact_url(), None);
        assert_eq!(response.error_message(), Some("rate limited"));
        Ok(())
    }

    #[test]
    fn metadata_non_object_is_wrapped() {
        let response = GenerationResponse {
            success: true,
            metadata: Some(Value::String("sdxl".to_string())),
            ..GenerationResponse::default()
        };
        assert_eq!(response.metadata_object()["value"], json!("sdxl"));
    }

    #[test]
    fn variant_parses_legacy_names() {
        assert_eq!(
            "design-studio".parse::<WizardVariant>(),
            Ok(WizardVariant::Studio)
        );
        assert_eq!("FLUX".parse::<WizardVariant>(), Ok(WizardVariant::Flux));
        assert!("sketchup".parse::<WizardVariant>().is_err());
    }
}
