//! Submission service providing a simplified API for workflow operations.

use std::sync::Arc;

use common::SubmissionId;
use event_store::EventStore;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::ports::{FileStoragePort, InMemoryFileStorage, Notification, NotificationPort};
use crate::publisher::EventPublisher;

use super::{
    ArtifactRef, AssignEvaluators, CreateSubmission, EvaluateAnteproyecto, EvaluateFormatoA,
    PresentFormatoA, ResubmitFormatoA, SubmitAnteproyecto, Submission, SubmissionError,
    SubmissionEvent,
};

impl From<SubmissionError> for DomainError {
    fn from(e: SubmissionError) -> Self {
        DomainError::Submission(e)
    }
}

/// Service for managing submissions.
///
/// Wraps the command handler and runs the post-commit hooks: notifications
/// are sent once the events are durable, and their failures never reach the
/// caller.
pub struct SubmissionService<S: EventStore> {
    handler: CommandHandler<S, Submission>,
    storage: Arc<dyn FileStoragePort>,
    notifier: Option<Arc<dyn NotificationPort>>,
}

impl<S: EventStore> SubmissionService<S> {
    /// Creates a service that publishes nowhere, notifies nobody and keeps
    /// documents in memory.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
            storage: Arc::new(InMemoryFileStorage::new()),
            notifier: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.handler = self.handler.with_publisher(publisher);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn FileStoragePort>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationPort>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Submission> {
        &self.handler
    }

    /// Registers a new submission.
    #[tracing::instrument(skip(self))]
    pub async fn create_submission(
        &self,
        cmd: CreateSubmission,
    ) -> Result<CommandResult<Submission>, DomainError> {
        let submission_id = cmd.submission_id;
        let title = cmd.title.clone();
        let participants = cmd.participants.clone();
        let formato_a = cmd.formato_a.clone();
        let acceptance_letter = cmd.acceptance_letter.clone();

        self.run("create_submission", &cmd, |submission| {
            submission.create(
                submission_id,
                title,
                cmd.modality,
                participants,
                formato_a,
                acceptance_letter,
            )
        })
        .await
    }

    /// Presents Formato A to the coordinator.
    #[tracing::instrument(skip(self))]
    pub async fn present_formato_a(
        &self,
        cmd: PresentFormatoA,
    ) -> Result<CommandResult<Submission>, DomainError> {
        self.run("present_formato_a", &cmd, |submission| submission.present())
            .await
    }

    /// Records the coordinator's Formato A verdict.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate_formato_a(
        &self,
        cmd: EvaluateFormatoA,
    ) -> Result<CommandResult<Submission>, DomainError> {
        let comments = cmd.comments.clone();

        self.run("evaluate_formato_a", &cmd, |submission| {
            submission.evaluate_formato_a(cmd.approved, comments)
        })
        .await
    }

    /// Replaces Formato A after a rejection.
    #[tracing::instrument(skip(self))]
    pub async fn resubmit_formato_a(
        &self,
        cmd: ResubmitFormatoA,
    ) -> Result<CommandResult<Submission>, DomainError> {
        let artifact = cmd.artifact.clone();

        self.run("resubmit_formato_a", &cmd, |submission| {
            submission.resubmit_formato_a(artifact)
        })
        .await
    }

    /// Uploads the anteproyecto.
    #[tracing::instrument(skip(self))]
    pub async fn submit_anteproyecto(
        &self,
        cmd: SubmitAnteproyecto,
    ) -> Result<CommandResult<Submission>, DomainError> {
        let artifact = cmd.artifact.clone();
        let actor_id = cmd.actor.id;

        self.run("submit_anteproyecto", &cmd, |submission| {
            submission.submit_anteproyecto(actor_id, artifact)
        })
        .await
    }

    /// Assigns the two anteproyecto evaluators.
    #[tracing::instrument(skip(self))]
    pub async fn assign_evaluators(
        &self,
        cmd: AssignEvaluators,
    ) -> Result<CommandResult<Submission>, DomainError> {
        self.run("assign_evaluators", &cmd, |submission| {
            submission.assign_evaluators(cmd.evaluator_1, cmd.evaluator_2)
        })
        .await
    }

    /// Records the anteproyecto verdict.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate_anteproyecto(
        &self,
        cmd: EvaluateAnteproyecto,
    ) -> Result<CommandResult<Submission>, DomainError> {
        let comments = cmd.comments.clone();
        let actor_id = cmd.actor.id;

        self.run("evaluate_anteproyecto", &cmd, |submission| {
            submission.evaluate_anteproyecto(cmd.approved, comments, actor_id)
        })
        .await
    }

    /// Gets a submission by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_submission(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Option<Submission>, DomainError> {
        self.handler.load_existing(submission_id).await
    }

    /// Stores a document and returns the reference to put in a command.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_document(
        &self,
        bytes: Vec<u8>,
        name: &str,
    ) -> Result<ArtifactRef, DomainError> {
        Ok(self.storage.store(bytes, name).await?)
    }

    /// Reads back a stored document.
    pub async fn fetch_document(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, DomainError> {
        Ok(self.storage.fetch(artifact).await?)
    }

    async fn run<C, F>(
        &self,
        name: &'static str,
        cmd: &C,
        decide: F,
    ) -> Result<CommandResult<Submission>, DomainError>
    where
        C: Command<Aggregate = Submission>,
        F: FnOnce(&Submission) -> Result<Vec<SubmissionEvent>, SubmissionError>,
    {
        metrics::counter!("submission_commands_total", "command" => name).increment(1);

        let result = self
            .handler
            .execute(cmd.submission_id(), cmd.actor(), cmd.expected_version(), decide)
            .await;

        match result {
            Ok(result) => {
                self.notify(&result).await;
                Ok(result)
            }
            Err(e) => {
                metrics::counter!("submission_command_errors_total", "command" => name)
                    .increment(1);
                tracing::debug!(command = name, error = %e, "command rejected");
                Err(e)
            }
        }
    }

    async fn notify(&self, result: &CommandResult<Submission>) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let Some(submission_id) = result.aggregate.id() else {
            return;
        };

        for event in &result.events {
            let Some(notification) = notification_for(submission_id, &result.aggregate, event)
            else {
                continue;
            };
            let event_type = notification.event_type.clone();
            if let Err(e) = notifier.notify(notification).await {
                metrics::counter!("notification_failures_total").increment(1);
                tracing::warn!(%submission_id, %event_type, error = %e, "notification failed");
            }
        }
    }
}

/// Builds the notification for a committed event, if that kind notifies anyone.
fn notification_for(
    submission_id: SubmissionId,
    submission: &Submission,
    event: &SubmissionEvent,
) -> Option<Notification> {
    let participants = submission.participants()?;
    let mut recipients = participants.all_ids();

    let message = match event {
        SubmissionEvent::SubmissionCreated(data) => {
            format!("Se registró el Formato A \"{}\"", data.title)
        }
        SubmissionEvent::FormatoAPresented(_) => return None,
        SubmissionEvent::FormatoAResubmitted(data) => {
            format!("Se reenvió el Formato A (intento {})", data.intento)
        }
        SubmissionEvent::FormatoAEvaluated(data) if data.approved => {
            "El Formato A fue aprobado".to_string()
        }
        SubmissionEvent::FormatoAEvaluated(data) if data.definitive => {
            "El Formato A fue rechazado definitivamente".to_string()
        }
        SubmissionEvent::FormatoAEvaluated(data) => {
            format!("El Formato A requiere correcciones (intento {})", data.intento)
        }
        SubmissionEvent::AnteproyectoSubmitted(_) => {
            "El director presentó el anteproyecto".to_string()
        }
        SubmissionEvent::EvaluatorsAssigned(data) => {
            recipients = vec![data.evaluator_1, data.evaluator_2, participants.director.id];
            "Se asignaron evaluadores al anteproyecto".to_string()
        }
        SubmissionEvent::AnteproyectoEvaluated(data) if data.approved => {
            "El anteproyecto fue aprobado".to_string()
        }
        SubmissionEvent::AnteproyectoEvaluated(_) => "El anteproyecto fue rechazado".to_string(),
    };

    Some(Notification::new(
        submission_id,
        event.event_type(),
        recipients,
        message,
    ))
}
