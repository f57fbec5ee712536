use std::sync::Arc;

use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::projects::domain::{
    ApplicationId, ApplicationRecord, NewApplication, Project, ProjectDraft, ProjectSlug,
    ProjectStatus, StatementOfPurpose, Username, Verdict,
};
use crate::workflows::projects::identity::{Identity, StudentProfile, TeacherProfile};
use crate::workflows::projects::memory::{
    InMemoryDirectory, InMemoryPortalStore, RecordingNoticePublisher,
};
use crate::workflows::projects::repository::{
    ApplicationRepository, NoticeError, NoticePublisher, PortalNotice, ProjectRepository,
    RepositoryError,
};
use crate::workflows::projects::{project_router, ProjectWorkflowService, CALLER_HEADER};

pub(super) type MemoryService =
    ProjectWorkflowService<InMemoryPortalStore, InMemoryDirectory, RecordingNoticePublisher>;

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) store: Arc<InMemoryPortalStore>,
    pub(super) directory: Arc<InMemoryDirectory>,
    pub(super) notices: Arc<RecordingNoticePublisher>,
}

pub(super) fn teacher(username: &str) -> TeacherProfile {
    TeacherProfile {
        username: Username::new(username),
        name: format!("Prof. {username}"),
        department: Some("Computer Science".to_string()),
    }
}

pub(super) fn student(username: &str, cv: Option<&str>) -> StudentProfile {
    StudentProfile {
        username: Username::new(username),
        name: username.to_uppercase(),
        cv: cv.map(str::to_string),
    }
}

/// Two teachers (`turing`, `hopper`) and three students; `lovelace` has no CV yet.
pub(super) fn harness() -> Harness {
    harness_with_config(WorkflowConfig::default())
}

pub(super) fn harness_with_config(config: WorkflowConfig) -> Harness {
    let store = Arc::new(InMemoryPortalStore::default());
    let directory = Arc::new(InMemoryDirectory::default());
    let notices = Arc::new(RecordingNoticePublisher::default());

    directory.register_teacher(teacher("turing")).expect("seed");
    directory.register_teacher(teacher("hopper")).expect("seed");
    directory
        .register_student(student("lovelace", None))
        .expect("seed");
    directory
        .register_student(student("noether", Some("cv/noether.pdf")))
        .expect("seed");
    directory
        .register_student(student("curie", Some("cv/curie.pdf")))
        .expect("seed");

    let service = Arc::new(ProjectWorkflowService::new(
        store.clone(),
        directory.clone(),
        notices.clone(),
        config,
    ));

    Harness {
        service,
        store,
        directory,
        notices,
    }
}

pub(super) fn draft(title: &str, status: ProjectStatus) -> ProjectDraft {
    ProjectDraft {
        title: title.to_string(),
        description: "Investigate sparse attention for long documents.".to_string(),
        tags: vec!["nlp".to_string()],
        status,
        is_active: true,
    }
}

pub(super) fn sop(text: &str) -> StatementOfPurpose {
    StatementOfPurpose {
        statement: text.to_string(),
    }
}

pub(super) fn published_project(harness: &Harness, title: &str) -> Project {
    harness
        .service
        .create_project(
            &Identity::teacher("turing"),
            draft(title, ProjectStatus::Published),
        )
        .expect("project created")
}

pub(super) fn pending_record(project: &str, student: &str) -> ApplicationRecord {
    ApplicationRecord {
        id: ApplicationId(format!("sop-{project}-{student}")),
        project: ProjectSlug(project.to_string()),
        student: Username::new(student),
        statement: "Keen to contribute.".to_string(),
        verdict: Verdict::Pending,
        submitted_at: Utc::now(),
        decided_at: None,
    }
}

pub(super) fn new_application(project: &str, student: &str) -> NewApplication {
    NewApplication {
        project: ProjectSlug(project.to_string()),
        student: Username::new(student),
        statement: "Keen to contribute.".to_string(),
        submitted_at: Utc::now(),
    }
}

pub(super) struct UnavailableStore;

impl ProjectRepository for UnavailableStore {
    fn insert_project(&self, _project: Project) -> Result<Project, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_project(&self, _project: Project) -> Result<Project, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_project(&self, _slug: &ProjectSlug) -> Result<Option<Project>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn published_projects(&self) -> Result<Vec<Project>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn projects_owned_by(&self, _teacher: &Username) -> Result<Vec<Project>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl ApplicationRepository for UnavailableStore {
    fn enroll(&self, _application: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn settle(
        &self,
        _id: &ApplicationId,
        _verdict: Verdict,
        _at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_application(
        &self,
        _project: &ProjectSlug,
        _student: &Username,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn applications_for_project(
        &self,
        _project: &ProjectSlug,
        _verdict: Verdict,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn applications_by_student(
        &self,
        _student: &Username,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct FailingNotices;

impl NoticePublisher for FailingNotices {
    fn publish(&self, _notice: PortalNotice) -> Result<(), NoticeError> {
        Err(NoticeError::Transport("smtp down".to_string()))
    }
}

pub(super) fn app(harness: &Harness) -> axum::Router {
    project_router(harness.service.clone())
}

pub(super) fn request(
    method: &str,
    uri: &str,
    caller: Option<&str>,
    body: Option<Value>,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(CALLER_HEADER, caller);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            axum::body::Body::from(serde_json::to_vec(&value).expect("json body"))
        }
        None => axum::body::Body::empty(),
    };
    builder.body(body).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn expect_status(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    read_json_body(response).await
}
