pub mod client;
pub mod composer;
pub mod config;
pub mod error;
pub mod inputs;
pub mod presenter;
pub mod stages;
pub mod submitter;
pub mod workflow;

pub use client::{DryrunGenerationClient, GenerationClient, GenerationOutcome, HttpGenerationClient};
pub use config::WorkflowConfig;
pub use error::{ConfigError, GenerationError, InputError, PresenterError, SubmitRejection};
pub use inputs::{ImageUpload, InputCollector, PreviewRef};
pub use presenter::{Navigator, ResultPresenter, ResultView};
pub use stages::{StageController, StageGate, StagePlan, StageTransition, WorkflowStage};
pub use submitter::{
    Applied, AttemptId, CompletedGeneration, GenerationFailure, GenerationResult,
    GenerationSubmitter, GenerationSuccess, PendingGeneration,
};
pub use workflow::{DesignWorkflow, ResetScope, StepOutcome};
