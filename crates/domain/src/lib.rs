//! Write side of the thesis submission workflow.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits, with validated snapshot rehydration
//! - Command trait and CommandHandler (optimistic concurrency, publish after persist)
//! - The Submission aggregate with its Formato A and anteproyecto state machine
//! - Ports for file storage, notifications and identity lookup

pub mod aggregate;
pub mod command;
pub mod error;
pub mod ports;
pub mod publisher;
pub mod submission;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use ports::{
    FileStoragePort, IdentityPort, InMemoryFileStorage, InMemoryIdentityDirectory,
    InMemoryNotifier, Notification, NotificationPort, PortError, UserProfile,
};
pub use publisher::{BusPublisher, EventPublisher, NoopPublisher, PublishError};
pub use submission::{
    AnteproyectoInfo, ArtifactRef, AssignEvaluators, CreateSubmission, EvaluateAnteproyecto,
    EvaluateFormatoA, FormatoAInfo, MAX_FORMATO_A_ATTEMPTS, Modality, Operation, Participant,
    Participants, PresentFormatoA, ResubmitFormatoA, SubmitAnteproyecto, Submission,
    SubmissionError, SubmissionEvent, SubmissionService, SubmissionSnapshot, SubmissionState,
};
