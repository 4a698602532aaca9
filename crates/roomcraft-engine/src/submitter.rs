use std::fmt;
use std::sync::Arc;

use roomcraft_contracts::settings::{BudgetLevel, BudgetThresholds, GenerationSettings};
use roomcraft_contracts::wire::{GenerationPayload, PayloadProfile};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{GenerationClient, GenerationOutcome};
use crate::error::{GenerationError, SubmitRejection};
use crate::inputs::ImageUpload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSuccess {
    pub attempt: AttemptId,
    pub artifact_url: String,
    pub metadata: Map<String, Value>,
    pub inline_image: Option<String>,
    pub settings: GenerationSettings,
    pub budget_level: BudgetLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub attempt: AttemptId,
    pub message: String,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationResult {
    #[default]
    Absent,
    Pending(AttemptId),
    Success(GenerationSuccess),
    Failure(GenerationFailure),
}

impl GenerationResult {
    pub fn success(&self) -> Option<&GenerationSuccess> {
        match self {
            GenerationResult::Success(success) => Some(success),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        match self {
            GenerationResult::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, GenerationResult::Pending(_))
    }
}

pub struct PendingGeneration {
    attempt: AttemptId,
    payload: GenerationPayload,
    settings: GenerationSettings,
    client: Arc<dyn GenerationClient>,
    cancel: CancellationToken,
}

impl fmt::Debug for PendingGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingGeneration")
            .field("attempt", &self.attempt)
            .field("client", &self.client.name())
            .finish_non_exhaustive()
    }
}

impl PendingGeneration {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn payload(&self) -> &GenerationPayload {
        &self.payload
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send the request. Resolves early with [`GenerationError::Cancelled`]
    /// once the attempt is abandoned.
    pub async fn run(self) -> CompletedGeneration {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GenerationError::Cancelled),
            result = self.client.generate(&self.payload) => result,
        };
        CompletedGeneration {
            attempt: self.attempt,
            budget_level: self.payload.budget_level,
            settings: self.settings,
            outcome,
        }
    }
}

#[derive(Debug)]
pub struct CompletedGeneration {
    pub attempt: AttemptId,
    pub budget_level: BudgetLevel,
    pub settings: GenerationSettings,
    pub outcome: Result<GenerationOutcome, GenerationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Success(GenerationSuccess),
    Failure(GenerationFailure),
    Discarded(AttemptId),
}

pub struct GenerationSubmitter {
    client: Arc<dyn GenerationClient>,
    thresholds: BudgetThresholds,
    profile: PayloadProfile,
    last_attempt: u64,
    pending: Option<(AttemptId, CancellationToken)>,
    result: GenerationResult,
}

impl fmt::Debug for GenerationSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSubmitter")
            .field("client", &self.client.name())
            .field("thresholds", &self.thresholds)
            .field("variant", &self.profile.variant)
            .field("last_attempt", &self.last_attempt)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl GenerationSubmitter {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        thresholds: BudgetThresholds,
        profile: PayloadProfile,
    ) -> Self {
        Self {
            client,
            thresholds,
            profile,
            last_attempt: 0,
            pending: None,
            result: GenerationResult::Absent,
        }
    }

    pub fn result(&self) -> &GenerationResult {
        &self.result
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_attempt(&self) -> Option<AttemptId> {
        self.pending.as_ref().map(|(attempt, _)| *attempt)
    }

    pub fn thresholds(&self) -> &BudgetThresholds {
        &self.thresholds
    }

    pub fn profile(&self) -> &PayloadProfile {
        &self.profile
    }

    pub fn build_payload<'a>(
        &self,
        settings: &GenerationSettings,
        primary: Option<&ImageUpload>,
        auxiliary: impl IntoIterator<Item = &'a ImageUpload>,
    ) -> GenerationPayload {
        let main_image = primary
            .filter(|_| self.profile.inline_primary_image)
            .map(ImageUpload::data_url);
        let elements = if self.profile.inline_auxiliary_images {
            auxiliary.into_iter().map(ImageUpload::data_url).collect()
        } else {
            Vec::new()
        };
        GenerationPayload::build(settings, &self.thresholds, &self.profile, main_image, elements)
    }

    pub fn prepare<'a>(
        &mut self,
        settings: &GenerationSettings,
        primary: Option<&ImageUpload>,
        auxiliary: impl IntoIterator<Item = &'a ImageUpload>,
    ) -> Result<PendingGeneration, SubmitRejection> {
        if let Some((attempt, _)) = &self.pending {
            return Err(SubmitRejection::AlreadyPending {
                attempt: attempt.to_string(),
            });
        }
        if settings.trimmed_prompt().is_empty() {
            return Err(SubmitRejection::EmptyPrompt);
        }

        let payload = self.build_payload(settings, primary, auxiliary);
        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        let cancel = CancellationToken::new();
        self.pending = Some((attempt, cancel.clone()));
        self.result = GenerationResult::Pending(attempt);
        info!(
            %attempt,
            client = self.client.name(),
            budget_level = %payload.budget_level,
            style = %payload.style,
            room_type = %payload.room_type,
            inline_image = payload.has_inline_image(),
            "generation submitted"
        );

        Ok(PendingGeneration {
            attempt,
            payload,
            settings: settings.clone(),
            client: Arc::clone(&self.client),
            cancel,
        })
    }

    pub fn apply(&mut self, completed: CompletedGeneration) -> Applied {
        if self.pending_attempt() != Some(completed.attempt) {
            debug!(attempt = %completed.attempt, "discarding stale generation result");
            return Applied::Discarded(completed.attempt);
        }
        self.pending = None;

        let CompletedGeneration {
            attempt,
            budget_level,
            settings,
            outcome,
        } = completed;
        match outcome {
            Ok(outcome) => {
                info!(%attempt, artifact_url = %outcome.artifact_url, "generation succeeded");
                let success = GenerationSuccess {
                    attempt,
                    artifact_url: outcome.artifact_url,
                    metadata: outcome.metadata,
                    inline_image: outcome.inline_image,
                    settings,
                    budget_level,
                };
                self.result = GenerationResult::Success(success.clone());
                Applied::Success(success)
            }
            Err(err) => {
                let failure = GenerationFailure {
                    attempt,
                    message: err.user_message(),
                    status: err.status(),
                };
                warn!(%attempt, status = ?failure.status, error = %err, "generation failed");
                self.result = GenerationResult::Failure(failure.clone());
                Applied::Failure(failure)
            }
        }
    }

    pub async fn submit<'a>(
        &mut self,
        settings: &GenerationSettings,
        primary: Option<&ImageUpload>,
        auxiliary: impl IntoIterator<Item = &'a ImageUpload>,
    ) -> Result<Applied, SubmitRejection> {
        let pending = self.prepare(settings, primary, auxiliary)?;
        let completed = pending.run().await;
        Ok(self.apply(completed))
    }

    /// Cancel the in-flight attempt, if any. Its completion will be discarded.
    pub fn abandon(&mut self) -> Option<AttemptId> {
        let (attempt, cancel) = self.pending.take()?;
        cancel.cancel();
        self.result = GenerationResult::Absent;
        info!(%attempt, "generation abandoned");
        Some(attempt)
    }

    pub fn clear_result(&mut self) {
        if self.pending.is_none() {
            self.result = GenerationResult::Absent;
        }
    }
}
