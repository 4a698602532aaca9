use std::path::{Path, PathBuf};
use std::sync::Arc;

use roomcraft_contracts::context::UiContext;
use roomcraft_contracts::events::{EventPayload, EventWriter};
use roomcraft_contracts::records::{
    append_design_record, load_design_records, DesignRecord, SAVED_DESIGNS_LIMIT,
};
use roomcraft_contracts::settings::{GenerationSettings, SettingsError, SettingsField, Validation};
use roomcraft_contracts::storage::KeyValueStore;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::GenerationClient;
use crate::composer::ParameterComposer;
use crate::config::WorkflowConfig;
use crate::error::{ConfigError, InputError, PresenterError, SubmitRejection};
use crate::inputs::{ImageUpload, InputCollector, PreviewRef};
use crate::presenter::{Navigator, ResultPresenter, ResultView};
use crate::stages::{StageController, StageInputs, StagePlan, StageTransition, WorkflowStage};
use crate::submitter::{
    Applied, AttemptId, CompletedGeneration, GenerationResult, GenerationSubmitter,
    PendingGeneration,
};

pub const SETTINGS_DRAFT_KEY: &str = "design_settings_draft";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    Result,
    Workflow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Transition(StageTransition),
    Generation(Applied),
}

pub struct DesignWorkflow {
    session_id: String,
    config: WorkflowConfig,
    ui: Arc<dyn UiContext>,
    inputs: InputCollector,
    composer: ParameterComposer,
    stages: StageController,
    submitter: GenerationSubmitter,
    presenter: ResultPresenter,
    store: Option<Box<dyn KeyValueStore>>,
    events: Option<EventWriter>,
}

impl DesignWorkflow {
    pub fn new(
        config: WorkflowConfig,
        client: Arc<dyn GenerationClient>,
        ui: Arc<dyn UiContext>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let submitter =
            GenerationSubmitter::new(client, config.budget_thresholds, config.payload_profile());
        let presenter = ResultPresenter::new(&config.download_dir, config.request_timeout())?;
        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            inputs: InputCollector::new(config.max_auxiliary_images),
            composer: ParameterComposer::default(),
            stages: StageController::new(StagePlan::default()),
            submitter,
            presenter,
            store: None,
            events: None,
            config,
            ui,
        })
    }

    pub fn with_stage_plan(mut self, plan: StagePlan) -> Self {
        self.stages = StageController::new(plan);
        self
    }

    /// Attach persistence. A saved settings draft, if present, is restored.
    pub fn with_store(mut self, mut store: Box<dyn KeyValueStore>) -> Self {
        if let Some(draft) = store.get(SETTINGS_DRAFT_KEY) {
            match serde_json::from_value::<GenerationSettings>(draft) {
                Ok(settings) => self.composer.replace(settings),
                Err(err) => warn!(error = %err, "ignoring unreadable settings draft"),
            }
        }
        self.store = Some(store);
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.emit(
            "session_started",
            json!({
                "variant": self.config.variant,
                "theme": self.ui.current_theme(),
                "language": self.ui.current_language(),
            }),
        );
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn ui(&self) -> &dyn UiContext {
        self.ui.as_ref()
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stages.stage()
    }

    pub fn settings(&self) -> &GenerationSettings {
        self.composer.settings()
    }

    pub fn inputs(&self) -> &InputCollector {
        &self.inputs
    }

    pub fn result(&self) -> &GenerationResult {
        self.submitter.result()
    }

    pub fn is_generating(&self) -> bool {
        self.submitter.is_pending()
    }

    pub fn live_previews(&self) -> usize {
        self.inputs.live_previews()
    }

    // Input Collector

    pub fn set_primary_image(&mut self, upload: ImageUpload) -> PreviewRef {
        self.inputs.set_primary_image(upload)
    }

    pub fn load_primary_image(&mut self, path: &Path) -> Result<PreviewRef, InputError> {
        let upload = ImageUpload::from_path(path, self.config.max_image_bytes)?;
        Ok(self.set_primary_image(upload))
    }

    pub fn add_auxiliary_images(
        &mut self,
        uploads: Vec<ImageUpload>,
    ) -> Result<Vec<PreviewRef>, InputError> {
        self.inputs.add_auxiliary_images(uploads)
    }

    /// Reads every path before adding any, so one bad file leaves the list
    /// untouched.
    pub fn load_auxiliary_images<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<Vec<PreviewRef>, InputError> {
        let uploads = paths
            .iter()
            .map(|path| ImageUpload::from_path(path.as_ref(), self.config.max_image_bytes))
            .collect::<Result<Vec<_>, _>>()?;
        self.add_auxiliary_images(uploads)
    }

    pub fn remove_auxiliary_image(&mut self, index: usize) -> Result<ImageUpload, InputError> {
        self.inputs.remove_auxiliary_image(index)
    }

    // Parameter Composer

    pub fn update_field(&mut self, field: SettingsField) {
        self.composer.update_field(field);
        self.save_draft();
    }

    pub fn update_named(&mut self, name: &str, value: &Value) -> Result<(), SettingsError> {
        self.composer.update_named(name, value)?;
        self.save_draft();
        Ok(())
    }

    pub fn validate(&self) -> Validation {
        self.composer.validate()
    }

    // Stage Controller

    pub fn can_advance(&self) -> bool {
        self.stages.can_advance(&self.stage_inputs())
    }

    pub fn advance(&mut self) -> StageTransition {
        let inputs = StageInputs {
            has_primary_image: self.inputs.has_primary(),
            auxiliary_count: self.inputs.auxiliary().len(),
            settings: self.composer.settings(),
        };
        let transition = match self.stages.next(&inputs) {
            StageTransition::Blocked { stage, reason } => StageTransition::Blocked {
                stage,
                reason: self
                    .ui
                    .message(&format!("stage.{}.blocked", stage.as_str()), &reason),
            },
            other => other,
        };
        self.note_transition(&transition);
        transition
    }

    pub fn back(&mut self) -> StageTransition {
        let transition = self.stages.back();
        self.note_transition(&transition);
        transition
    }

    pub async fn next(&mut self) -> Result<StepOutcome, SubmitRejection> {
        match self.advance() {
            StageTransition::Finish => Ok(StepOutcome::Generation(self.generate().await?)),
            other => Ok(StepOutcome::Transition(other)),
        }
    }

    // Generation Submitter

    pub fn prepare_generation(&mut self) -> Result<PendingGeneration, SubmitRejection> {
        if self.stage() != WorkflowStage::Settings {
            return Err(SubmitRejection::Incomplete {
                reason: self.ui.message(
                    "generation.incomplete",
                    "Complete the upload and elements steps first.",
                ),
            });
        }
        let settings = self.composer.snapshot();
        let pending = self.submitter.prepare(
            &settings,
            self.inputs.primary().map(|image| &image.upload),
            self.inputs.auxiliary().iter().map(|image| &image.upload),
        )?;
        let payload = pending.payload();
        self.emit(
            "generation_submitted",
            json!({
                "attempt": pending.attempt().to_string(),
                "variant": self.config.variant,
                "budgetLevel": payload.budget_level,
                "style": payload.style,
                "roomType": payload.room_type,
                "auxiliary_count": self.inputs.auxiliary().len(),
            }),
        );
        Ok(pending)
    }

    pub fn apply_generation(&mut self, completed: CompletedGeneration) -> Applied {
        let applied = self.submitter.apply(completed);
        match &applied {
            Applied::Success(success) => {
                self.emit(
                    "generation_succeeded",
                    json!({
                        "attempt": success.attempt.to_string(),
                        "artifact_url": summarize_url(&success.artifact_url),
                        "budgetLevel": success.budget_level,
                    }),
                );
                if self.config.remember_designs {
                    self.remember(
                        success.attempt,
                        &success.artifact_url,
                        &success.settings,
                        &success.metadata,
                    );
                }
            }
            Applied::Failure(failure) => {
                self.emit(
                    "generation_failed",
                    json!({
                        "attempt": failure.attempt.to_string(),
                        "message": failure.message,
                        "status": failure.status,
                    }),
                );
            }
            Applied::Discarded(attempt) => {
                self.emit(
                    "generation_discarded",
                    json!({ "attempt": attempt.to_string() }),
                );
            }
        }
        applied
    }

    pub async fn generate(&mut self) -> Result<Applied, SubmitRejection> {
        let pending = self.prepare_generation()?;
        let completed = pending.run().await;
        Ok(self.apply_generation(completed))
    }

    pub fn abandon_generation(&mut self) -> Option<AttemptId> {
        let attempt = self.submitter.abandon()?;
        self.emit(
            "generation_abandoned",
            json!({ "attempt": attempt.to_string() }),
        );
        Some(attempt)
    }

    // Result Presenter

    pub fn result_view(&self) -> Option<ResultView> {
        self.presenter.view(self.submitter.result())
    }

    pub fn open_full_size(&self, navigator: &dyn Navigator) -> Result<(), PresenterError> {
        let view = self.result_view().ok_or(PresenterError::NoResult)?;
        self.presenter.open_full_size(&view, navigator)
    }

    pub async fn download(&self, dir: Option<&Path>) -> Result<PathBuf, PresenterError> {
        let view = self.result_view().ok_or(PresenterError::NoResult)?;
        let path = self.presenter.download(&view, dir).await?;
        self.emit(
            "artifact_downloaded",
            json!({
                "attempt": view.attempt.to_string(),
                "path": path.display().to_string(),
            }),
        );
        Ok(path)
    }

    pub fn reset(&mut self, scope: ResetScope) {
        self.abandon_generation();
        self.submitter.clear_result();
        if scope == ResetScope::Workflow {
            self.inputs.clear();
            self.stages.reset();
        }
        self.emit(
            "workflow_reset",
            json!({
                "scope": match scope {
                    ResetScope::Result => "result",
                    ResetScope::Workflow => "workflow",
                },
                "stage": self.stage().number(),
            }),
        );
    }

    pub fn history(&mut self) -> Vec<DesignRecord> {
        match self.store.as_mut() {
            Some(store) => load_design_records(&mut **store),
            None => Vec::new(),
        }
    }

    fn stage_inputs(&self) -> StageInputs<'_> {
        StageInputs {
            has_primary_image: self.inputs.has_primary(),
            auxiliary_count: self.inputs.auxiliary().len(),
            settings: self.composer.settings(),
        }
    }

    fn note_transition(&self, transition: &StageTransition) {
        match transition {
            StageTransition::Advanced { from, to } | StageTransition::Retreated { from, to } => {
                self.emit(
                    "stage_changed",
                    json!({ "from": from.number(), "to": to.number() }),
                );
            }
            StageTransition::Blocked { stage, reason } => {
                debug!(stage = stage.number(), %reason, "advance blocked");
            }
            StageTransition::Finish | StageTransition::Unchanged => {}
        }
    }

    fn save_draft(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let result = serde_json::to_value(self.composer.settings())
            .map_err(anyhow::Error::from)
            .and_then(|draft| store.set(SETTINGS_DRAFT_KEY, draft));
        if let Err(err) = result {
            warn!(error = %err, "failed saving settings draft");
        }
    }

    fn remember(
        &mut self,
        attempt: AttemptId,
        artifact_url: &str,
        settings: &GenerationSettings,
        metadata: &serde_json::Map<String, Value>,
    ) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let mut record = DesignRecord::new(
            self.session_id.clone(),
            attempt.to_string(),
            artifact_url,
            settings.clone(),
        );
        record.primary_image = self
            .inputs
            .primary()
            .map(|image| image.upload.name().to_string());
        record.auxiliary_images = self.inputs.auxiliary_names();
        record.metadata = metadata.clone();
        if let Err(err) = append_design_record(&mut **store, &record, SAVED_DESIGNS_LIMIT) {
            warn!(error = %err, "failed saving design record");
        }
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = &self.events else {
            return;
        };
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = events.emit(event_type, payload) {
            warn!(event_type, error = %err, "failed writing workflow event");
        }
    }
}

fn summarize_url(url: &str) -> String {
    if url.starts_with("data:") {
        let header = url.split(',').next().unwrap_or("data:");
        return format!("{header},…");
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use roomcraft_contracts::context::{StaticUiContext, ThemeMode};
    use roomcraft_contracts::events::read_event_types;
    use roomcraft_contracts::settings::{RoomType, PROMPT_REQUIRED_REASON};
    use roomcraft_contracts::storage::{JsonFileStore, MemoryStore};

    use super::*;
    use crate::client::DryrunGenerationClient;
    use crate::inputs::tests::upload;
    use crate::submitter::tests::ScriptedClient;

    fn workflow_with(client: Arc<dyn GenerationClient>) -> anyhow::Result<DesignWorkflow> {
        Ok(DesignWorkflow::new(
            WorkflowConfig::default(),
            client,
            Arc::new(StaticUiContext::default()),
        )?)
    }

    fn drive_to_settings(workflow: &mut DesignWorkflow) {
        workflow.set_primary_image(upload("room.png"));
        workflow.advance();
        workflow.advance();
    }

    #[tokio::test]
    async fn happy_path_submits_exactly_once() -> anyhow::Result<()> {
        let client = Arc::new(ScriptedClient::succeeding());
        let mut workflow = workflow_with(client.clone())?;

        let blocked = workflow.next().await?;
        assert!(matches!(
            blocked,
            StepOutcome::Transition(StageTransition::Blocked {
                stage: WorkflowStage::Upload,
                ..
            })
        ));

        drive_to_settings(&mut workflow);
        assert_eq!(workflow.stage(), WorkflowStage::Settings);

        let blocked = workflow.next().await?;
        assert_eq!(
            blocked,
            StepOutcome::Transition(StageTransition::Blocked {
                stage: WorkflowStage::Settings,
                reason: PROMPT_REQUIRED_REASON.to_string(),
            })
        );
        assert_eq!(client.call_count(), 0);

        workflow.update_named("prompt", &json!("bright minimalist kitchen"))?;
        workflow.update_named("roomType", &json!("kitchen"))?;
        let outcome = workflow.next().await?;
        assert!(matches!(outcome, StepOutcome::Generation(Applied::Success(_))));
        assert_eq!(client.call_count(), 1);

        let view = workflow
            .result_view()
            .ok_or_else(|| anyhow::anyhow!("expected result view"))?;
        assert_eq!(view.caption, "Style: modern • Room: kitchen");
        Ok(())
    }

    #[tokio::test]
    async fn failure_keeps_wizard_on_settings_stage() -> anyhow::Result<()> {
        let mut workflow = workflow_with(Arc::new(ScriptedClient::rate_limited()))?;
        drive_to_settings(&mut workflow);
        workflow.update_field(SettingsField::Prompt("cozy reading nook".to_string()));

        let outcome = workflow.next().await?;
        let StepOutcome::Generation(Applied::Failure(failure)) = outcome else {
            anyhow::bail!("expected a failed generation");
        };
        assert_eq!(failure.message, "rate limited");
        assert_eq!(workflow.stage(), WorkflowStage::Settings);
        assert!(workflow.result_view().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn generate_before_settings_stage_is_refused() -> anyhow::Result<()> {
        let client = Arc::new(ScriptedClient::succeeding());
        let mut workflow = workflow_with(client.clone())?;
        workflow.update_field(SettingsField::Prompt("sunny office".to_string()));
        let rejection = workflow.generate().await;
        assert!(matches!(rejection, Err(SubmitRejection::Incomplete { .. })));
        assert_eq!(client.call_count(), 0);
        Ok(())
    }

    #[test]
    fn blocked_reason_is_translated_through_ui_context() -> anyhow::Result<()> {
        let ui = StaticUiContext::new(ThemeMode::Light, "ru")
            .with_message("stage.upload.blocked", "Загрузите фото комнаты");
        let mut workflow = DesignWorkflow::new(
            WorkflowConfig::default(),
            Arc::new(ScriptedClient::succeeding()),
            Arc::new(ui),
        )?;
        assert_eq!(
            workflow.advance(),
            StageTransition::Blocked {
                stage: WorkflowStage::Upload,
                reason: "Загрузите фото комнаты".to_string(),
            }
        );
        assert_eq!(workflow.ui().current_language(), "ru");
        Ok(())
    }

    #[tokio::test]
    async fn workflow_reset_releases_previews_and_logs_events() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let mut workflow = workflow_with(Arc::new(ScriptedClient::succeeding()))?
            .with_events(EventWriter::new(&events_path, "session-test"));

        drive_to_settings(&mut workflow);
        workflow.add_auxiliary_images(vec![upload("sofa.png"), upload("lamp.png")])?;
        workflow.update_field(SettingsField::Prompt("calm bedroom".to_string()));
        workflow.generate().await?;
        assert_eq!(workflow.live_previews(), 3);

        workflow.reset(ResetScope::Result);
        assert_eq!(workflow.result(), &GenerationResult::Absent);
        assert_eq!(workflow.stage(), WorkflowStage::Settings);

        workflow.reset(ResetScope::Workflow);
        assert_eq!(workflow.live_previews(), 0);
        assert_eq!(workflow.stage(), WorkflowStage::Upload);
        assert_eq!(workflow.settings().prompt, "calm bedroom");

        assert_eq!(
            read_event_types(&events_path)?,
            vec![
                "session_started",
                "stage_changed",
                "stage_changed",
                "generation_submitted",
                "generation_succeeded",
                "workflow_reset",
                "workflow_reset",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn abandoned_generation_is_discarded_on_apply() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let mut workflow = workflow_with(Arc::new(ScriptedClient::succeeding()))?
            .with_events(EventWriter::new(&events_path, "session-test"));
        drive_to_settings(&mut workflow);
        workflow.update_field(SettingsField::Prompt("quiet study".to_string()));

        let pending = workflow.prepare_generation()?;
        assert!(workflow.is_generating());
        assert!(workflow.abandon_generation().is_some());
        let applied = workflow.apply_generation(pending.run().await);
        assert!(matches!(applied, Applied::Discarded(_)));
        assert_eq!(workflow.result(), &GenerationResult::Absent);

        let types = read_event_types(&events_path)?;
        assert!(types.ends_with(&[
            "generation_submitted".to_string(),
            "generation_abandoned".to_string(),
            "generation_discarded".to_string(),
        ]));
        Ok(())
    }

    #[tokio::test]
    async fn successful_designs_are_remembered_and_draft_restored() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store_path = temp.path().join("state.json");

        let mut workflow = workflow_with(Arc::new(ScriptedClient::succeeding()))?
            .with_store(Box::new(JsonFileStore::new(&store_path)));
        drive_to_settings(&mut workflow);
        workflow.add_auxiliary_images(vec![upload("sofa.png")])?;
        workflow.update_named("prompt", &json!("loft with plants"))?;
        workflow.update_named("room", &json!("office"))?;
        workflow.generate().await?;

        let history = workflow.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].attempt, "attempt-1");
        assert_eq!(history[0].primary_image.as_deref(), Some("room.png"));
        assert_eq!(history[0].auxiliary_images, vec!["sofa.png"]);
        assert_eq!(history[0].session_id, workflow.session_id());

        let restored = workflow_with(Arc::new(ScriptedClient::succeeding()))?
            .with_store(Box::new(JsonFileStore::new(&store_path)));
        assert_eq!(restored.settings().prompt, "loft with plants");
        assert_eq!(restored.settings().room_type, RoomType::Office);
        Ok(())
    }

    #[tokio::test]
    async fn remember_designs_off_writes_nothing() -> anyhow::Result<()> {
        let config = WorkflowConfig {
            remember_designs: false,
            ..WorkflowConfig::default()
        };
        let mut workflow = DesignWorkflow::new(
            config,
            Arc::new(ScriptedClient::succeeding()),
            Arc::new(StaticUiContext::default()),
        )?
        .with_store(Box::new(MemoryStore::new()));
        drive_to_settings(&mut workflow);
        workflow.update_field(SettingsField::Prompt("small bathroom".to_string()));
        workflow.generate().await?;
        assert!(workflow.history().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn dryrun_round_trip_downloads_png() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = WorkflowConfig {
            download_dir: temp.path().to_path_buf(),
            size: "16x16".to_string(),
            ..WorkflowConfig::default()
        };
        let mut workflow = DesignWorkflow::new(
            config,
            Arc::new(DryrunGenerationClient),
            Arc::new(StaticUiContext::default()),
        )?;
        drive_to_settings(&mut workflow);
        workflow.update_field(SettingsField::Prompt("warm industrial dining".to_string()));
        workflow.generate().await?;

        let saved = workflow.download(None).await?;
        let decoded = image::open(&saved)?;
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        Ok(())
    }

    #[tokio::test]
    async fn download_without_result_is_an_error() -> anyhow::Result<()> {
        let workflow = workflow_with(Arc::new(ScriptedClient::succeeding()))?;
        assert!(matches!(
            workflow.download(None).await,
            Err(PresenterError::NoResult)
        ));
        Ok(())
    }

    #[test]
    fn data_urls_are_shortened_for_events() {
        assert_eq!(
            summarize_url("data:image/png;base64,AAAA"),
            "data:image/png;base64,…"
        );
        assert_eq!(summarize_url("/generated-images/a.png"), "/generated-images/a.png");
    }
}
