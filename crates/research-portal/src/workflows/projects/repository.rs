use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationRecord, NewApplication, Project, ProjectSlug, Username, Verdict,
};

/// Storage for projects. Listing methods return insertion order.
pub trait ProjectRepository: Send + Sync {
    /// Fails with `Conflict` when the slug is taken.
    fn insert_project(&self, project: Project) -> Result<Project, RepositoryError>;
    /// Replaces the mutable fields of a stored project. The stored applicant set is kept, since
    /// only `ApplicationRepository::enroll` may grow it.
    fn update_project(&self, project: Project) -> Result<Project, RepositoryError>;
    fn fetch_project(&self, slug: &ProjectSlug) -> Result<Option<Project>, RepositoryError>;
    fn published_projects(&self) -> Result<Vec<Project>, RepositoryError>;
    fn projects_owned_by(&self, teacher: &Username) -> Result<Vec<Project>, RepositoryError>;
}

/// Storage for statements of purpose.
pub trait ApplicationRepository: Send + Sync {
    /// Atomically assigns an id, stores the application and adds the student to the project's
    /// applicant set. Ids are unique per store, however many services share it. Fails with
    /// `Conflict` if the (student, project) pair already exists and with `NotFound` if the
    /// project is gone; nothing is written in either case.
    fn enroll(&self, application: NewApplication) -> Result<ApplicationRecord, RepositoryError>;
    /// Moves a pending application to `verdict`. Fails with `Conflict` when it is no longer
    /// pending, so concurrent decisions and withdrawals cannot both land.
    fn settle(
        &self,
        id: &ApplicationId,
        verdict: Verdict,
        at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn find_application(
        &self,
        project: &ProjectSlug,
        student: &Username,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn applications_for_project(
        &self,
        project: &ProjectSlug,
        verdict: Verdict,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn applications_by_student(
        &self,
        student: &Username,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for applicant/teacher notifications (e-mail, chat, ...).
pub trait NoticePublisher: Send + Sync {
    fn publish(&self, notice: PortalNotice) -> Result<(), NoticeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalNotice {
    pub template: String,
    pub project: ProjectSlug,
    pub student: Username,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NoticeError {
    #[error("notice transport unavailable: {0}")]
    Transport(String),
}
