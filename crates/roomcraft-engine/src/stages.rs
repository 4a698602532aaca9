use std::fmt;

use roomcraft_contracts::settings::GenerationSettings;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    #[default]
    Upload = 1,
    Elements = 2,
    Settings = 3,
}

impl WorkflowStage {
    pub const ALL: [WorkflowStage; 3] = [
        WorkflowStage::Upload,
        WorkflowStage::Elements,
        WorkflowStage::Settings,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::Upload => "upload",
            WorkflowStage::Elements => "elements",
            WorkflowStage::Settings => "settings",
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            WorkflowStage::Upload => Some(WorkflowStage::Elements),
            WorkflowStage::Elements => Some(WorkflowStage::Settings),
            WorkflowStage::Settings => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            WorkflowStage::Upload => None,
            WorkflowStage::Elements => Some(WorkflowStage::Upload),
            WorkflowStage::Settings => Some(WorkflowStage::Elements),
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    pub has_primary_image: bool,
    pub auxiliary_count: usize,
    pub settings: &'a GenerationSettings,
}

/// Exit condition for one stage. `Err` carries the reason shown to the user.
pub trait StageGate: Send + Sync {
    fn check(&self, inputs: &StageInputs<'_>) -> Result<(), String>;
}

pub struct PrimaryImageRequired;

impl StageGate for PrimaryImageRequired {
    fn check(&self, inputs: &StageInputs<'_>) -> Result<(), String> {
        if inputs.has_primary_image {
            Ok(())
        } else {
            Err("Upload a room photo to continue.".to_string())
        }
    }
}

pub struct NoGate;

impl StageGate for NoGate {
    fn check(&self, _inputs: &StageInputs<'_>) -> Result<(), String> {
        Ok(())
    }
}

pub struct PromptRequired;

impl StageGate for PromptRequired {
    fn check(&self, inputs: &StageInputs<'_>) -> Result<(), String> {
        let validation = inputs.settings.validate();
        match validation.reason {
            Some(reason) if !validation.ok => Err(reason),
            _ => Ok(()),
        }
    }
}

pub struct StagePlan {
    gates: [Box<dyn StageGate>; 3],
}

impl Default for StagePlan {
    fn default() -> Self {
        Self {
            gates: [
                Box::new(PrimaryImageRequired),
                Box::new(NoGate),
                Box::new(PromptRequired),
            ],
        }
    }
}

impl StagePlan {
    pub fn with_gate(mut self, stage: WorkflowStage, gate: Box<dyn StageGate>) -> Self {
        self.gates[stage.number() as usize - 1] = gate;
        self
    }

    fn gate(&self, stage: WorkflowStage) -> &dyn StageGate {
        self.gates[stage.number() as usize - 1].as_ref()
    }
}

impl fmt::Debug for StagePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePlan").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageTransition {
    Advanced { from: WorkflowStage, to: WorkflowStage },
    Retreated { from: WorkflowStage, to: WorkflowStage },
    Blocked { stage: WorkflowStage, reason: String },
    Finish,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct StageController {
    stage: WorkflowStage,
    plan: StagePlan,
}

impl StageController {
    pub fn new(plan: StagePlan) -> Self {
        Self {
            stage: WorkflowStage::Upload,
            plan,
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn can_advance(&self, inputs: &StageInputs<'_>) -> bool {
        self.plan.gate(self.stage).check(inputs).is_ok()
    }

    pub fn next(&mut self, inputs: &StageInputs<'_>) -> StageTransition {
        if let Err(reason) = self.plan.gate(self.stage).check(inputs) {
            debug!(stage = self.stage.number(), %reason, "stage gate blocked");
            return StageTransition::Blocked {
                stage: self.stage,
                reason,
            };
        }
        match self.stage.next() {
            Some(to) => {
                let from = self.stage;
                self.stage = to;
                StageTransition::Advanced { from, to }
            }
            None => StageTransition::Finish,
        }
    }

    pub fn back(&mut self) -> StageTransition {
        match self.stage.previous() {
            Some(to) => {
                let from = self.stage;
                self.stage = to;
                StageTransition::Retreated { from, to }
            }
            None => StageTransition::Unchanged,
        }
    }

    pub fn reset(&mut self) {
        self.stage = WorkflowStage::Upload;
    }
}
