//! Precondition checks shared by the workflow operations.
//!
//! Each guard either hands back the value the next step needs or fails with a typed
//! `WorkflowError`; operations chain them with `?` so the first failing guard wins.

use super::domain::{ApplicationRecord, Project, ProjectSlug, Verdict};
use super::identity::{Identity, Role, StudentProfile, TeacherProfile};
use super::service::WorkflowError;

/// The single role capability check used by every operation.
pub(crate) fn require_role(
    caller: &Identity,
    role: Role,
    message: &str,
) -> Result<(), WorkflowError> {
    if caller.holds(role) {
        Ok(())
    } else {
        Err(WorkflowError::Permission(message.to_string()))
    }
}

pub(crate) fn existing_project(
    project: Option<Project>,
    slug: &ProjectSlug,
) -> Result<Project, WorkflowError> {
    project.ok_or_else(|| WorkflowError::NotFound(format!("project '{slug}' does not exist")))
}

/// Projects visible only through their owner resolve as missing for everyone else.
pub(crate) fn owned_project(
    project: Option<Project>,
    caller: &Identity,
    slug: &ProjectSlug,
) -> Result<Project, WorkflowError> {
    match project {
        Some(project) if caller.holds(Role::Teacher) && project.is_owned_by(&caller.username) => {
            Ok(project)
        }
        _ => Err(WorkflowError::NotFound(format!(
            "project '{slug}' not found"
        ))),
    }
}

pub(crate) fn viewable(project: Project, caller: &Identity) -> Result<Project, WorkflowError> {
    if project.is_listed() || project.is_owned_by(&caller.username) {
        Ok(project)
    } else {
        Err(WorkflowError::NotAvailable(
            "requested project not available".to_string(),
        ))
    }
}

pub(crate) fn project_owner(project: &Project, caller: &Identity) -> Result<(), WorkflowError> {
    require_role(caller, Role::Teacher, "only teachers can modify projects")?;
    if project.is_owned_by(&caller.username) {
        Ok(())
    } else {
        Err(WorkflowError::Permission(
            "cannot change someone else's project".to_string(),
        ))
    }
}

pub(crate) fn teacher_profile(
    profile: Option<TeacherProfile>,
) -> Result<TeacherProfile, WorkflowError> {
    profile.ok_or_else(|| WorkflowError::Precursor("profile incomplete".to_string()))
}

pub(crate) fn student_with_cv(
    profile: Option<StudentProfile>,
) -> Result<StudentProfile, WorkflowError> {
    match profile {
        Some(profile) if profile.has_cv() => Ok(profile),
        _ => Err(WorkflowError::Precursor(
            "must upload CV before applying".to_string(),
        )),
    }
}

pub(crate) fn not_yet_applied(
    existing: Option<ApplicationRecord>,
    project: &Project,
    student: &StudentProfile,
) -> Result<(), WorkflowError> {
    if existing.is_some() || project.has_applicant(&student.username) {
        return Err(WorkflowError::Conflict("already applied".to_string()));
    }
    Ok(())
}

pub(crate) fn pending_application(
    existing: Option<ApplicationRecord>,
) -> Result<ApplicationRecord, WorkflowError> {
    match existing {
        Some(record) if record.verdict.is_pending() => Ok(record),
        _ => Err(WorkflowError::Conflict(
            "no pending application for that project".to_string(),
        )),
    }
}

pub(crate) fn undecided(record: ApplicationRecord) -> Result<ApplicationRecord, WorkflowError> {
    if record.verdict.is_pending() {
        Ok(record)
    } else {
        Err(WorkflowError::Conflict(format!(
            "application already decided ({})",
            record.verdict.label()
        )))
    }
}

/// Decisions must land on one of the configured terminal verdicts.
pub(crate) fn permitted_verdict(
    verdict: Option<Verdict>,
    permitted: &[Verdict],
) -> Result<Verdict, WorkflowError> {
    match verdict {
        Some(verdict) if !verdict.is_pending() && permitted.contains(&verdict) => Ok(verdict),
        _ => {
            let allowed = permitted
                .iter()
                .map(|verdict| verdict.label())
                .collect::<Vec<_>>()
                .join(", ");
            Err(WorkflowError::validation(format!(
                "provide a proper student username and a verdict ({allowed})"
            )))
        }
    }
}
