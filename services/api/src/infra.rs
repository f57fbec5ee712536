use metrics_exporter_prometheus::PrometheusHandle;
use research_portal::error::AppError;
use research_portal::workflows::projects::{
    DirectoryError, InMemoryDirectory, NoticeError, NoticePublisher, PortalNotice,
    StudentProfile, TeacherProfile,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Publishes notices to the log until a mail transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNoticePublisher;

impl NoticePublisher for TracingNoticePublisher {
    fn publish(&self, notice: PortalNotice) -> Result<(), NoticeError> {
        info!(
            template = %notice.template,
            project = %notice.project,
            student = %notice.student,
            details = ?notice.details,
            "portal notice"
        );
        Ok(())
    }
}

/// Accounts and profiles loaded into the in-memory directory at startup.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DirectorySeed {
    #[serde(default)]
    pub(crate) teachers: Vec<TeacherProfile>,
    #[serde(default)]
    pub(crate) students: Vec<StudentProfile>,
}

impl DirectorySeed {
    /// Register every profile, returning (teachers, students) counts.
    pub(crate) fn apply(
        self,
        directory: &InMemoryDirectory,
    ) -> Result<(usize, usize), DirectoryError> {
        let counts = (self.teachers.len(), self.students.len());
        for teacher in self.teachers {
            directory.register_teacher(teacher)?;
        }
        for student in self.students {
            directory.register_student(student)?;
        }
        Ok(counts)
    }
}

pub(crate) fn load_seed(path: &Path) -> Result<DirectorySeed, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| AppError::Seed {
        path: path.to_path_buf(),
        source,
    })
}
