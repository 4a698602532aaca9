use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SettingsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Modern,
    Minimalist,
    Classic,
    Loft,
    Scandinavian,
    Industrial,
    Bohemian,
}

impl Style {
    pub const ALL: &'static [Style] = &[
        Style::Modern,
        Style::Minimalist,
        Style::Classic,
        Style::Loft,
        Style::Scandinavian,
        Style::Industrial,
        Style::Bohemian,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Modern => "modern",
            Style::Minimalist => "minimalist",
            Style::Classic => "classic",
            Style::Loft => "loft",
            Style::Scandinavian => "scandinavian",
            Style::Industrial => "industrial",
            Style::Bohemian => "bohemian",
        }
    }
}

impl FromStr for Style {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Style::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| SettingsError::unknown_tag("style", raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomType {
    #[default]
    LivingRoom,
    Bedroom,
    Kitchen,
    Bathroom,
    Office,
    Dining,
}

impl RoomType {
    pub const ALL: &'static [RoomType] = &[
        RoomType::LivingRoom,
        RoomType::Bedroom,
        RoomType::Kitchen,
        RoomType::Bathroom,
        RoomType::Office,
        RoomType::Dining,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoomType::LivingRoom => "living-room",
            RoomType::Bedroom => "bedroom",
            RoomType::Kitchen => "kitchen",
            RoomType::Bathroom => "bathroom",
            RoomType::Office => "office",
            RoomType::Dining => "dining",
        }
    }
}

impl FromStr for RoomType {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        if normalized == "living" {
            return Ok(RoomType::LivingRoom);
        }
        RoomType::ALL
            .iter()
            .copied()
            .find(|room| room.as_str() == normalized)
            .ok_or_else(|| SettingsError::unknown_tag("roomType", raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InspirationWeight {
    Low,
    #[default]
    Medium,
    High,
}

impl InspirationWeight {
    pub const ALL: &'static [InspirationWeight] = &[
        InspirationWeight::Low,
        InspirationWeight::Medium,
        InspirationWeight::High,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InspirationWeight::Low => "Low",
            InspirationWeight::Medium => "Medium",
            InspirationWeight::High => "High",
        }
    }
}

impl FromStr for InspirationWeight {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        InspirationWeight::ALL
            .iter()
            .copied()
            .find(|weight| weight.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| SettingsError::unknown_tag("inspirationWeight", raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignPreset {
    #[default]
    None,
    Professional,
    Friendly,
    Minimalist,
}

impl DesignPreset {
    pub const ALL: &'static [DesignPreset] = &[
        DesignPreset::None,
        DesignPreset::Professional,
        DesignPreset::Friendly,
        DesignPreset::Minimalist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DesignPreset::None => "none",
            DesignPreset::Professional => "professional",
            DesignPreset::Friendly => "friendly",
            DesignPreset::Minimalist => "minimalist",
        }
    }
}

impl FromStr for DesignPreset {
    type Err = SettingsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        DesignPreset::ALL
            .iter()
            .copied()
            .find(|preset| preset.as_str() == normalized)
            .ok_or_else(|| SettingsError::unknown_tag("design", raw))
    }
}

macro_rules! display_as_str {
    ($($tag:ty),+) => {
        $(impl fmt::Display for $tag {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })+
    };
}

display_as_str!(Style, RoomType, InspirationWeight, DesignPreset);
