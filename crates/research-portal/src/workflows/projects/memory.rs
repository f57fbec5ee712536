//! Mutex-backed adapters used by the API binary, the demo, and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, ApplicationRecord, NewApplication, Project, ProjectSlug, Username, Verdict,
};
use super::identity::{
    DirectoryError, Identity, ProfileDirectory, Role, StudentProfile, TeacherProfile,
};
use super::repository::{
    ApplicationRepository, NoticeError, NoticePublisher, PortalNotice, ProjectRepository,
    RepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    projects: Vec<Project>,
    applications: Vec<ApplicationRecord>,
    issued: u64,
}

impl StoreState {
    fn project_mut(&mut self, slug: &ProjectSlug) -> Option<&mut Project> {
        self.projects.iter_mut().find(|project| &project.slug == slug)
    }
}

/// Project and application storage sharing one lock, so `enroll` is a single critical section.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPortalStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryPortalStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl ProjectRepository for InMemoryPortalStore {
    fn insert_project(&self, project: Project) -> Result<Project, RepositoryError> {
        let mut state = self.lock()?;
        if state.projects.iter().any(|stored| stored.slug == project.slug) {
            return Err(RepositoryError::Conflict);
        }
        state.projects.push(project.clone());
        Ok(project)
    }

    fn update_project(&self, project: Project) -> Result<Project, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .project_mut(&project.slug)
            .ok_or(RepositoryError::NotFound)?;
        let applicants = std::mem::take(&mut stored.applicants);
        *stored = Project {
            applicants,
            ..project
        };
        Ok(stored.clone())
    }

    fn fetch_project(&self, slug: &ProjectSlug) -> Result<Option<Project>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .projects
            .iter()
            .find(|project| &project.slug == slug)
            .cloned())
    }

    fn published_projects(&self) -> Result<Vec<Project>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .projects
            .iter()
            .filter(|project| project.is_listed())
            .cloned()
            .collect())
    }

    fn projects_owned_by(&self, teacher: &Username) -> Result<Vec<Project>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .projects
            .iter()
            .filter(|project| project.is_owned_by(teacher))
            .cloned()
            .collect())
    }
}

impl ApplicationRepository for InMemoryPortalStore {
    fn enroll(&self, application: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        let mut state = self.lock()?;
        if state.applications.iter().any(|stored| {
            stored.project == application.project && stored.student == application.student
        }) {
            return Err(RepositoryError::Conflict);
        }

        let project = state
            .project_mut(&application.project)
            .ok_or(RepositoryError::NotFound)?;
        if !project.applicants.insert(application.student.clone()) {
            return Err(RepositoryError::Conflict);
        }

        state.issued += 1;
        let record = application.into_record(ApplicationId(format!("sop-{:06}", state.issued)));
        state.applications.push(record.clone());
        Ok(record)
    }

    fn settle(
        &self,
        id: &ApplicationId,
        verdict: Verdict,
        at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut state = self.lock()?;
        let record = state
            .applications
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if !record.verdict.is_pending() {
            return Err(RepositoryError::Conflict);
        }
        record.verdict = verdict;
        record.decided_at = Some(at);
        Ok(record.clone())
    }

    fn find_application(
        &self,
        project: &ProjectSlug,
        student: &Username,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .applications
            .iter()
            .find(|record| &record.project == project && &record.student == student)
            .cloned())
    }

    fn applications_for_project(
        &self,
        project: &ProjectSlug,
        verdict: Verdict,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .applications
            .iter()
            .filter(|record| &record.project == project && record.verdict == verdict)
            .cloned()
            .collect())
    }

    fn applications_by_student(
        &self,
        student: &Username,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .applications
            .iter()
            .filter(|record| &record.student == student)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    teachers: HashMap<Username, TeacherProfile>,
    students: HashMap<Username, StudentProfile>,
    accounts: HashMap<Username, Role>,
}

/// User accounts with their role and optional profile.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryDirectory {
    fn lock(&self) -> Result<MutexGuard<'_, DirectoryState>, DirectoryError> {
        self.state
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory mutex poisoned".to_string()))
    }

    /// Register an account without a profile record.
    pub fn register_account(&self, username: Username, role: Role) -> Result<(), DirectoryError> {
        self.lock()?.accounts.insert(username, role);
        Ok(())
    }

    pub fn register_teacher(&self, profile: TeacherProfile) -> Result<(), DirectoryError> {
        let mut state = self.lock()?;
        state
            .accounts
            .insert(profile.username.clone(), Role::Teacher);
        state.teachers.insert(profile.username.clone(), profile);
        Ok(())
    }

    pub fn register_student(&self, profile: StudentProfile) -> Result<(), DirectoryError> {
        let mut state = self.lock()?;
        state
            .accounts
            .insert(profile.username.clone(), Role::Student);
        state.students.insert(profile.username.clone(), profile);
        Ok(())
    }
}

impl ProfileDirectory for InMemoryDirectory {
    fn resolve(&self, username: &Username) -> Result<Option<Identity>, DirectoryError> {
        let state = self.lock()?;
        Ok(state.accounts.get(username).map(|role| Identity {
            username: username.clone(),
            role: *role,
        }))
    }

    fn teacher(&self, username: &Username) -> Result<Option<TeacherProfile>, DirectoryError> {
        Ok(self.lock()?.teachers.get(username).cloned())
    }

    fn student(&self, username: &Username) -> Result<Option<StudentProfile>, DirectoryError> {
        Ok(self.lock()?.students.get(username).cloned())
    }

    fn attach_cv(
        &self,
        username: &Username,
        cv_reference: String,
    ) -> Result<StudentProfile, DirectoryError> {
        let mut state = self.lock()?;
        let profile = state
            .students
            .get_mut(username)
            .ok_or_else(|| DirectoryError::UnknownProfile(username.clone()))?;
        profile.cv = Some(cv_reference);
        Ok(profile.clone())
    }
}

/// Keeps every published notice so callers can inspect them.
#[derive(Debug, Default, Clone)]
pub struct RecordingNoticePublisher {
    events: Arc<Mutex<Vec<PortalNotice>>>,
}

impl RecordingNoticePublisher {
    pub fn events(&self) -> Vec<PortalNotice> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl NoticePublisher for RecordingNoticePublisher {
    fn publish(&self, notice: PortalNotice) -> Result<(), NoticeError> {
        self.events
            .lock()
            .map_err(|_| NoticeError::Transport("notice mutex poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}
