use roomcraft_contracts::settings::{
    BudgetLevel, BudgetThresholds, GenerationSettings, SettingsError, SettingsField, Validation,
};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ParameterComposer {
    settings: GenerationSettings,
}

impl ParameterComposer {
    pub fn new(settings: GenerationSettings) -> Self {
        Self {
            settings: settings.clamped(),
        }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn update_field(&mut self, field: SettingsField) {
        self.settings.apply(field);
    }

    pub fn update_named(&mut self, name: &str, value: &Value) -> Result<(), SettingsError> {
        let field = SettingsField::parse(name, value)?;
        self.update_field(field);
        Ok(())
    }

    pub fn validate(&self) -> Validation {
        self.settings.validate()
    }

    pub fn budget_level(&self, thresholds: &BudgetThresholds) -> BudgetLevel {
        self.settings.budget_level(thresholds)
    }

    pub fn snapshot(&self) -> GenerationSettings {
        self.settings.clone()
    }

    pub fn replace(&mut self, settings: GenerationSettings) {
        self.settings = settings.clamped();
    }

    pub fn reset(&mut self) {
        self.settings = GenerationSettings::default();
    }
}
