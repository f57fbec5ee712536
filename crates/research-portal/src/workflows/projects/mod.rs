//! Research project listings and the application (SOP) workflow built around them.

pub mod domain;
pub(crate) mod guards;
pub mod identity;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationRecord, ApplicationView, NewApplication, Payload, PayloadError,
    Project, ProjectChange, ProjectDraft, ProjectPatch, ProjectSlug, ProjectStatus, ProjectView,
    ShortlistDecision, StatementOfPurpose, Username, Verdict, VerdictInput,
};
pub use identity::{
    DirectoryError, Identity, ProfileDirectory, Role, StudentProfile, TeacherProfile,
};
pub use memory::{InMemoryDirectory, InMemoryPortalStore, RecordingNoticePublisher};
pub use repository::{
    ApplicationRepository, NoticeError, NoticePublisher, PortalNotice, ProjectRepository,
    RepositoryError,
};
pub use router::{project_router, CALLER_HEADER};
pub use service::{ProjectWorkflowService, WorkflowError};
