mod budget;
mod tags;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use budget::{
    clamp_budget, BudgetLevel, BudgetThresholds, BUDGET_DEFAULT, BUDGET_MAX, BUDGET_MIN,
};
pub use tags::{DesignPreset, InspirationWeight, RoomType, Style};

pub const PROMPT_REQUIRED_REASON: &str = "Please enter a prompt to generate the design!";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown settings field '{0}'")]
    UnknownField(String),

    #[error("unknown {field} '{value}'")]
    UnknownTag { field: &'static str, value: String },

    #[error("{field} expects {expected}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
    },
}

impl SettingsError {
    pub(crate) fn unknown_tag(field: &'static str, value: &str) -> Self {
        Self::UnknownTag {
            field,
            value: value.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub room_type: RoomType,
    #[serde(default)]
    pub inspiration_weight: InspirationWeight,
    #[serde(default)]
    pub design: DesignPreset,
    #[serde(default = "default_budget", deserialize_with = "deserialize_budget")]
    pub budget: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            style: Style::default(),
            room_type: RoomType::default(),
            inspiration_weight: InspirationWeight::default(),
            design: DesignPreset::default(),
            budget: BUDGET_DEFAULT,
        }
    }
}

impl GenerationSettings {
    pub fn apply(&mut self, field: SettingsField) {
        match field {
            SettingsField::Prompt(prompt) => self.prompt = prompt,
            SettingsField::Style(style) => self.style = style,
            SettingsField::RoomType(room_type) => self.room_type = room_type,
            SettingsField::InspirationWeight(weight) => self.inspiration_weight = weight,
            SettingsField::Design(design) => self.design = design,
            SettingsField::Budget(raw) => self.budget = clamp_budget(raw),
        }
    }

    /// Pulls a budget written straight into the field back into range.
    pub fn clamped(mut self) -> Self {
        self.budget = self.bounded_budget();
        self
    }

    pub fn bounded_budget(&self) -> u32 {
        clamp_budget(i64::from(self.budget))
    }

    pub fn trimmed_prompt(&self) -> &str {
        self.prompt.trim()
    }

    pub fn validate(&self) -> Validation {
        if self.trimmed_prompt().is_empty() {
            return Validation::blocked(PROMPT_REQUIRED_REASON);
        }
        Validation::ok()
    }

    pub fn budget_level(&self, thresholds: &BudgetThresholds) -> BudgetLevel {
        thresholds.level(self.bounded_budget())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsField {
    Prompt(String),
    Style(Style),
    RoomType(RoomType),
    InspirationWeight(InspirationWeight),
    Design(DesignPreset),
    Budget(i64),
}

impl SettingsField {
    pub fn parse(name: &str, value: &Value) -> Result<Self, SettingsError> {
        let key = name.trim().to_ascii_lowercase().replace(['_', '-'], "");
        match key.as_str() {
            "prompt" | "changes" => match value {
                Value::Null => Ok(Self::Prompt(String::new())),
                other => Ok(Self::Prompt(required_text(other, "prompt")?)),
            },
            "style" | "apartmentstyle" => Ok(Self::Style(required_text(value, "style")?.parse()?)),
            "roomtype" | "room" => Ok(Self::RoomType(required_text(value, "roomType")?.parse()?)),
            "inspirationweight" | "weight" => Ok(Self::InspirationWeight(
                required_text(value, "inspirationWeight")?.parse()?,
            )),
            "design" => Ok(Self::Design(required_text(value, "design")?.parse()?)),
            "budget" => value_integer(value)
                .map(Self::Budget)
                .ok_or(SettingsError::InvalidValue {
                    field: "budget",
                    expected: "an integer amount",
                }),
            _ => Err(SettingsError::UnknownField(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub ok: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn required_text(value: &Value, field: &'static str) -> Result<String, SettingsError> {
    value_text(value).ok_or(SettingsError::InvalidValue {
        field,
        expected: "a text tag",
    })
}

fn value_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|raw| raw.round() as i64)),
        Value::String(text) => {
            let cleaned: String = text
                .trim()
                .chars()
                .filter(|ch| !matches!(ch, ',' | '_' | '$' | ' '))
                .collect();
            cleaned.parse::<i64>().ok()
        }
        _ => None,
    }
}

fn default_budget() -> u32 {
    BUDGET_DEFAULT
}

fn deserialize_budget<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_budget(raw))
}
