use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use super::domain::{
    ApplicationRecord, NewApplication, Payload, PayloadError, Project, ProjectChange,
    ProjectDraft, ProjectSlug, ShortlistDecision, StatementOfPurpose, Username, Verdict,
    VerdictInput,
};
use super::guards;
use super::identity::{DirectoryError, Identity, ProfileDirectory, Role, StudentProfile};
use super::repository::{
    ApplicationRepository, NoticePublisher, PortalNotice, ProjectRepository, RepositoryError,
};
use crate::config::WorkflowConfig;

/// Slugs that collide with static routes under `/api/v1/projects/`.
const RESERVED_SLUGS: &[&str] = &["mine"];
const MAX_SLUG_ATTEMPTS: usize = 1000;

/// Application workflow engine: project ownership, SOP submission, verdicts, withdrawal.
pub struct ProjectWorkflowService<S, D, N> {
    store: Arc<S>,
    directory: Arc<D>,
    notices: Arc<N>,
    config: WorkflowConfig,
}

impl<S, D, N> ProjectWorkflowService<S, D, N>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, notices: Arc<N>, config: WorkflowConfig) -> Self {
        Self {
            store,
            directory,
            notices,
            config,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Published, active projects in storage order.
    pub fn published(&self) -> Result<Vec<Project>, WorkflowError> {
        Ok(self.store.published_projects()?)
    }

    pub fn create_project(
        &self,
        caller: &Identity,
        draft: impl Into<Payload<ProjectDraft>>,
    ) -> Result<Project, WorkflowError> {
        guards::require_role(caller, Role::Teacher, "not a teacher")?;
        let teacher = guards::teacher_profile(self.directory.teacher(&caller.username)?)?;
        let draft = draft.into().decode()?;
        draft.validate()?;

        let now = Utc::now();
        let base = ProjectSlug::from_title(&draft.title);
        let mut project = Project {
            slug: base.clone(),
            title: String::new(),
            description: String::new(),
            tags: Vec::new(),
            teacher: teacher.username,
            status: draft.status,
            is_active: draft.is_active,
            applicants: Default::default(),
            created_at: now,
            updated_at: now,
        };
        project.apply_draft(draft, now);

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = if attempt == 1 {
                base.clone()
            } else {
                base.with_suffix(attempt)
            };
            if RESERVED_SLUGS.contains(&slug.as_str()) {
                continue;
            }
            project.slug = slug;
            match self.store.insert_project(project.clone()) {
                Ok(stored) => {
                    info!(project = %stored.slug, teacher = %stored.teacher, "project created");
                    return Ok(stored);
                }
                Err(RepositoryError::Conflict) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Err(WorkflowError::Conflict(format!(
            "no free slug for title '{}'",
            project.title
        )))
    }

    /// Every project owned by the calling teacher, whatever its status.
    pub fn owned_projects(&self, caller: &Identity) -> Result<Vec<Project>, WorkflowError> {
        guards::require_role(caller, Role::Teacher, "not a teacher")?;
        Ok(self.store.projects_owned_by(&caller.username)?)
    }

    pub fn view_project(
        &self,
        caller: &Identity,
        slug: &ProjectSlug,
    ) -> Result<Project, WorkflowError> {
        let project = guards::existing_project(self.store.fetch_project(slug)?, slug)?;
        guards::viewable(project, caller)
    }

    pub fn update_project(
        &self,
        caller: &Identity,
        slug: &ProjectSlug,
        change: impl Into<Payload<ProjectChange>>,
    ) -> Result<Project, WorkflowError> {
        let mut project = guards::existing_project(self.store.fetch_project(slug)?, slug)?;
        guards::project_owner(&project, caller)?;

        let draft = match change.into().decode()? {
            ProjectChange::Replace(draft) => draft,
            ProjectChange::Patch(patch) => patch.merge_into(project.draft()),
        };
        draft.validate()?;

        project.apply_draft(draft, Utc::now());
        let stored = self.store.update_project(project)?;
        info!(project = %stored.slug, status = stored.status.label(), "project updated");
        Ok(stored)
    }

    /// Submit a statement of purpose. Guards run in order and the first failure wins.
    pub fn apply(
        &self,
        caller: &Identity,
        slug: &ProjectSlug,
        sop: impl Into<Payload<StatementOfPurpose>>,
    ) -> Result<ApplicationRecord, WorkflowError> {
        let project = guards::existing_project(self.store.fetch_project(slug)?, slug)?;
        guards::require_role(caller, Role::Student, "only students can apply for projects")?;
        let student = guards::student_with_cv(self.directory.student(&caller.username)?)?;
        guards::not_yet_applied(
            self.store.find_application(slug, &student.username)?,
            &project,
            &student,
        )?;
        let sop = sop.into().decode()?;
        sop.validate()?;

        let application = NewApplication {
            project: project.slug.clone(),
            student: student.username.clone(),
            statement: sop.statement,
            submitted_at: Utc::now(),
        };

        let stored = self.store.enroll(application).map_err(|err| match err {
            RepositoryError::Conflict => WorkflowError::Conflict("already applied".to_string()),
            other => other.into(),
        })?;

        info!(project = %stored.project, student = %stored.student, application = %stored.id, "application submitted");
        self.notify("application_submitted", &stored, BTreeMap::new());
        Ok(stored)
    }

    /// Record the owning teacher's verdict on an existing, still pending application.
    pub fn shortlist(
        &self,
        caller: &Identity,
        slug: &ProjectSlug,
        decision: impl Into<Payload<ShortlistDecision>>,
    ) -> Result<ApplicationRecord, WorkflowError> {
        let project = guards::owned_project(self.store.fetch_project(slug)?, caller, slug)?;
        let decision = decision.into().decode()?;

        let student = match decision.student.trim() {
            "" => None,
            username => self.directory.student(&Username::new(username))?,
        };
        let verdict = guards::permitted_verdict(
            decision.accepted.and_then(VerdictInput::resolve),
            &self.config.shortlist_verdicts,
        )?;
        let student = student.ok_or_else(|| {
            WorkflowError::validation("provide a proper student username and a verdict")
        })?;

        let record = self
            .store
            .find_application(&project.slug, &student.username)?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!(
                    "no application from {} exists for this project",
                    student.username
                ))
            })?;
        let record = guards::undecided(record)?;

        let settled = self.settle(&record, verdict)?;
        info!(project = %settled.project, student = %settled.student, verdict = settled.verdict.label(), "application decided");
        let template = match verdict {
            Verdict::Accepted => "application_accepted",
            _ => "application_rejected",
        };
        self.notify(template, &settled, BTreeMap::new());
        Ok(settled)
    }

    /// Students on the owner's project whose application currently holds `verdict`.
    pub fn roster(
        &self,
        caller: &Identity,
        slug: &ProjectSlug,
        verdict: Verdict,
    ) -> Result<Vec<StudentProfile>, WorkflowError> {
        let project = guards::owned_project(self.store.fetch_project(slug)?, caller, slug)?;
        let records = self.store.applications_for_project(&project.slug, verdict)?;

        let mut students = Vec::with_capacity(records.len());
        for record in records {
            match self.directory.student(&record.student)? {
                Some(profile) => students.push(profile),
                None => warn!(
                    project = %project.slug,
                    student = %record.student,
                    "application references a student without a profile"
                ),
            }
        }
        Ok(students)
    }

    /// Withdraw the caller's pending application. Not repeatable, not reversible.
    pub fn withdraw(
        &self,
        caller: &Identity,
        slug: &ProjectSlug,
    ) -> Result<ApplicationRecord, WorkflowError> {
        if self.store.fetch_project(slug)?.is_none() {
            return Err(WorkflowError::Conflict(format!(
                "project '{slug}' does not exist"
            )));
        }
        let record =
            guards::pending_application(self.store.find_application(slug, &caller.username)?)?;

        let withdrawn = self.settle(&record, Verdict::Declined)?;
        info!(project = %withdrawn.project, student = %withdrawn.student, "application withdrawn");
        let mut details = BTreeMap::new();
        details.insert("initiated_by".to_string(), "student".to_string());
        self.notify("application_withdrawn", &withdrawn, details);
        Ok(withdrawn)
    }

    pub fn applications_of(
        &self,
        caller: &Identity,
    ) -> Result<Vec<ApplicationRecord>, WorkflowError> {
        guards::require_role(caller, Role::Student, "not a student")?;
        Ok(self.store.applications_by_student(&caller.username)?)
    }

    /// Record where the caller's CV is stored.
    pub fn attach_cv(
        &self,
        caller: &Identity,
        cv_reference: impl Into<Payload<String>>,
    ) -> Result<StudentProfile, WorkflowError> {
        guards::require_role(caller, Role::Student, "not a student")?;
        let cv_reference = cv_reference.into().decode()?;
        if cv_reference.trim().is_empty() {
            return Err(WorkflowError::validation("cv reference must not be blank"));
        }
        match self.directory.attach_cv(&caller.username, cv_reference) {
            Ok(profile) => {
                info!(student = %profile.username, "cv attached");
                Ok(profile)
            }
            Err(DirectoryError::UnknownProfile(_)) => Err(WorkflowError::Precursor(
                "student profile incomplete".to_string(),
            )),
            Err(other) => Err(other.into()),
        }
    }

    fn settle(
        &self,
        record: &ApplicationRecord,
        verdict: Verdict,
    ) -> Result<ApplicationRecord, WorkflowError> {
        self.store
            .settle(&record.id, verdict, Utc::now())
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    WorkflowError::Conflict("no pending application for that project".to_string())
                }
                other => other.into(),
            })
    }

    fn notify(
        &self,
        template: &str,
        record: &ApplicationRecord,
        mut details: BTreeMap<String, String>,
    ) {
        details.insert("application_id".to_string(), record.id.0.clone());
        details.insert("verdict".to_string(), record.verdict.label().to_string());
        let notice = PortalNotice {
            template: template.to_string(),
            project: record.project.clone(),
            student: record.student.clone(),
            details,
        };
        if let Err(err) = self.notices.publish(notice) {
            warn!(template, application = %record.id, error = %err, "notice not delivered");
        }
    }
}

/// Failures surfaced by workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("precondition missing: {0}")]
    Precursor(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not available: {0}")]
    NotAvailable(String),
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        fields: Option<ValidationErrors>,
    },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: None,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Permission(_) => "permission_denied",
            WorkflowError::Precursor(_) => "precondition_missing",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::NotAvailable(_) => "not_available",
            WorkflowError::Validation { .. } => "validation",
            WorkflowError::Directory(_) => "directory",
            WorkflowError::Repository(_) => "repository",
        }
    }
}

impl From<PayloadError> for WorkflowError {
    fn from(error: PayloadError) -> Self {
        Self::validation(error.to_string())
    }
}

impl From<ValidationErrors> for WorkflowError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation {
            message: errors.to_string(),
            fields: Some(errors),
        }
    }
}
