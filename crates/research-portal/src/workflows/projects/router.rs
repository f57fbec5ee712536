use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::domain::{
    Payload, ProjectChange, ProjectDraft, ProjectSlug, ShortlistDecision, StatementOfPurpose,
    Username, Verdict,
};
use super::identity::{Identity, ProfileDirectory};
use super::repository::{ApplicationRepository, NoticePublisher, ProjectRepository};
use super::service::{ProjectWorkflowService, WorkflowError};

/// Header naming the authenticated caller, set by the upstream auth proxy.
pub const CALLER_HEADER: &str = "x-portal-user";

type SharedService<S, D, N> = Arc<ProjectWorkflowService<S, D, N>>;

/// Router builder exposing the project listing and application endpoints.
pub fn project_router<S, D, N>(service: SharedService<S, D, N>) -> Router
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/projects",
            get(list_handler::<S, D, N>).post(create_handler::<S, D, N>),
        )
        .route("/api/v1/projects/mine", get(owned_handler::<S, D, N>))
        .route(
            "/api/v1/projects/:slug",
            get(view_handler::<S, D, N>)
                .put(replace_handler::<S, D, N>)
                .patch(patch_handler::<S, D, N>),
        )
        .route("/api/v1/projects/:slug/apply", post(apply_handler::<S, D, N>))
        .route(
            "/api/v1/projects/:slug/shortlist",
            post(shortlist_handler::<S, D, N>),
        )
        .route(
            "/api/v1/projects/:slug/shortlisted",
            get(shortlisted_handler::<S, D, N>),
        )
        .route(
            "/api/v1/projects/:slug/applicants",
            get(applicants_handler::<S, D, N>),
        )
        .route(
            "/api/v1/projects/:slug/withdraw",
            post(withdraw_handler::<S, D, N>),
        )
        .route(
            "/api/v1/applications/mine",
            get(my_applications_handler::<S, D, N>),
        )
        .route("/api/v1/profile/cv", put(attach_cv_handler::<S, D, N>))
        .with_state(service)
}

/// Rejection returned by every handler in this router.
#[derive(Debug)]
pub(crate) enum RouteError {
    Unauthenticated(String),
    Workflow(WorkflowError),
}

impl From<WorkflowError> for RouteError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let error = match self {
            RouteError::Unauthenticated(message) => {
                warn!(%message, "unauthenticated request");
                let payload = json!({ "error": "unauthenticated", "message": message });
                return (StatusCode::UNAUTHORIZED, Json(payload)).into_response();
            }
            RouteError::Workflow(error) => error,
        };

        let status = match &error {
            WorkflowError::Permission(_) => StatusCode::FORBIDDEN,
            WorkflowError::Precursor(_) => StatusCode::PRECONDITION_FAILED,
            WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::NotFound(_) | WorkflowError::NotAvailable(_) => StatusCode::NOT_FOUND,
            WorkflowError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Directory(_) | WorkflowError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(kind = error.kind(), error = %error, "request failed");
        } else {
            warn!(kind = error.kind(), error = %error, "request rejected");
        }

        let mut payload = json!({
            "error": error.kind(),
            "message": error.to_string(),
        });
        if let WorkflowError::Validation {
            fields: Some(fields),
            ..
        } = &error
        {
            payload["fields"] = serde_json::to_value(fields).unwrap_or(Value::Null);
        }
        (status, Json(payload)).into_response()
    }
}

/// Bodies reach the workflow undecoded; it decodes them after its other checks pass.
type RawBody = Result<Json<Value>, JsonRejection>;

fn payload<T>(body: RawBody, decode: impl FnOnce(Value) -> Payload<T>) -> Payload<T> {
    match body {
        Ok(Json(value)) => decode(value),
        Err(rejection) => Payload::Malformed(rejection.body_text()),
    }
}

fn caller<S, D, N>(
    service: &ProjectWorkflowService<S, D, N>,
    headers: &HeaderMap,
) -> Result<Identity, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let username = headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RouteError::Unauthenticated(format!("missing {CALLER_HEADER} header")))?;

    service
        .directory()
        .resolve(&Username::new(username))
        .map_err(WorkflowError::from)?
        .ok_or_else(|| RouteError::Unauthenticated(format!("unknown user '{username}'")))
}

pub(crate) async fn list_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let projects = service.published()?;
    let views: Vec<_> = projects.iter().map(|project| project.view(false)).collect();
    Ok((StatusCode::OK, Json(views)).into_response())
}

pub(crate) async fn create_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    body: RawBody,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let draft = payload::<ProjectDraft>(body, Payload::from_json);
    let project = service.create_project(&identity, draft)?;
    Ok((StatusCode::CREATED, Json(project.view(true))).into_response())
}

pub(crate) async fn owned_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let projects = service.owned_projects(&identity)?;
    let views: Vec<_> = projects.iter().map(|project| project.view(true)).collect();
    Ok((StatusCode::OK, Json(views)).into_response())
}

pub(crate) async fn view_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let project = service.view_project(&identity, &ProjectSlug(slug))?;
    let owner = project.is_owned_by(&identity.username);
    Ok((StatusCode::OK, Json(project.view(owner))).into_response())
}

pub(crate) async fn replace_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: RawBody,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let change = payload(body, ProjectChange::replace_from_json);
    let project = service.update_project(&identity, &ProjectSlug(slug), change)?;
    Ok((StatusCode::OK, Json(project.view(true))).into_response())
}

pub(crate) async fn patch_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: RawBody,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let change = payload(body, ProjectChange::patch_from_json);
    let project = service.update_project(&identity, &ProjectSlug(slug), change)?;
    Ok((StatusCode::OK, Json(project.view(true))).into_response())
}

pub(crate) async fn apply_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: RawBody,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let sop = payload::<StatementOfPurpose>(body, Payload::from_json);
    let record = service.apply(&identity, &ProjectSlug(slug), sop)?;
    Ok((StatusCode::CREATED, Json(json!({ "sop": record.view() }))).into_response())
}

pub(crate) async fn shortlist_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: RawBody,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let decision = payload::<ShortlistDecision>(body, Payload::from_json);
    let record = service.shortlist(&identity, &ProjectSlug(slug), decision)?;
    Ok((StatusCode::OK, Json(record.view())).into_response())
}

pub(crate) async fn shortlisted_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let students = service.roster(&identity, &ProjectSlug(slug), Verdict::Accepted)?;
    Ok((StatusCode::OK, Json(students)).into_response())
}

pub(crate) async fn applicants_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let students = service.roster(&identity, &ProjectSlug(slug), Verdict::Pending)?;
    Ok((StatusCode::OK, Json(students)).into_response())
}

pub(crate) async fn withdraw_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let record = service.withdraw(&identity, &ProjectSlug(slug))?;
    let payload = json!({
        "msg": "Application withdrawn successfully. You can't apply again",
        "application": record.view(),
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn my_applications_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let records = service.applications_of(&identity)?;
    let views: Vec<_> = records.iter().map(|record| record.view()).collect();
    Ok((StatusCode::OK, Json(views)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct CvAttachment {
    #[serde(default)]
    pub(crate) cv: String,
}

pub(crate) async fn attach_cv_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    headers: HeaderMap,
    body: RawBody,
) -> Result<Response, RouteError>
where
    S: ProjectRepository + ApplicationRepository + 'static,
    D: ProfileDirectory + 'static,
    N: NoticePublisher + 'static,
{
    let identity = caller(&service, &headers)?;
    let cv = payload(body, |value| {
        Payload::json_with(value, |value| {
            serde_json::from_value::<CvAttachment>(value).map(|attachment| attachment.cv)
        })
    });
    let profile = service.attach_cv(&identity, cv)?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}
