//! End-to-end scenarios for the project application workflow, driven through the public service
//! facade and the HTTP router.

mod common {
    use std::sync::Arc;

    use research_portal::config::WorkflowConfig;
    use research_portal::workflows::projects::{
        InMemoryDirectory, InMemoryPortalStore, ProjectWorkflowService, RecordingNoticePublisher,
        StudentProfile, TeacherProfile, Username,
    };

    pub(super) type Service =
        ProjectWorkflowService<InMemoryPortalStore, InMemoryDirectory, RecordingNoticePublisher>;

    pub(super) fn build_service() -> (Arc<Service>, Arc<InMemoryDirectory>) {
        let directory = Arc::new(InMemoryDirectory::default());
        for username in ["t", "t2"] {
            directory
                .register_teacher(TeacherProfile {
                    username: Username::new(username),
                    name: format!("Teacher {username}"),
                    department: None,
                })
                .expect("teacher registered");
        }
        directory
            .register_student(StudentProfile {
                username: Username::new("s"),
                name: "Student S".to_string(),
                cv: None,
            })
            .expect("student registered");
        directory
            .register_student(StudentProfile {
                username: Username::new("s2"),
                name: "Student S2".to_string(),
                cv: Some("cv/s2.pdf".to_string()),
            })
            .expect("student registered");

        let service = Arc::new(ProjectWorkflowService::new(
            Arc::new(InMemoryPortalStore::default()),
            directory.clone(),
            Arc::new(RecordingNoticePublisher::default()),
            WorkflowConfig::default(),
        ));
        (service, directory)
    }
}

mod scenarios {
    use super::common::*;
    use research_portal::workflows::projects::{
        Identity, ProfileDirectory, ProjectChange, ProjectDraft, ProjectPatch, ProjectStatus,
        ShortlistDecision, StatementOfPurpose, Username, Verdict, VerdictInput, WorkflowError,
    };

    fn draft() -> ProjectDraft {
        ProjectDraft {
            title: "Protein Folding".to_string(),
            description: "Learned potentials for folding".to_string(),
            tags: vec!["bio".to_string()],
            status: ProjectStatus::Draft,
            is_active: true,
        }
    }

    fn sop() -> StatementOfPurpose {
        StatementOfPurpose {
            statement: "I have worked on molecular dynamics.".to_string(),
        }
    }

    #[test]
    fn teacher_decides_and_accepted_student_cannot_withdraw() {
        let (service, directory) = build_service();
        let teacher = Identity::teacher("t");
        let s = Identity::student("s");
        let s2 = Identity::student("s2");

        let project = service.create_project(&teacher, draft()).expect("created");
        assert_eq!(project.status, ProjectStatus::Draft);

        assert!(matches!(
            service.apply(&s, &project.slug, sop()),
            Err(WorkflowError::Precursor(_))
        ));

        directory
            .attach_cv(&Username::new("s"), "cv/s.pdf".to_string())
            .expect("cv uploaded");
        let application = service.apply(&s, &project.slug, sop()).expect("applied");
        assert_eq!(application.verdict, Verdict::Pending);
        let stored = service.view_project(&teacher, &project.slug).expect("owner view");
        assert!(stored.has_applicant(&Username::new("s")));

        let decided = service
            .shortlist(
                &teacher,
                &project.slug,
                ShortlistDecision {
                    student: "s".to_string(),
                    accepted: Some(VerdictInput::Code(1)),
                },
            )
            .expect("accepted");
        assert_eq!(decided.verdict, Verdict::Accepted);

        assert!(matches!(
            service.withdraw(&s, &project.slug),
            Err(WorkflowError::Conflict(_))
        ));

        let second = service.apply(&s2, &project.slug, sop()).expect("independent");
        assert_ne!(second.id, application.id);
        assert_eq!(second.verdict, Verdict::Pending);
    }

    #[test]
    fn non_owner_teacher_cannot_update() {
        let (service, _) = build_service();
        let project = service
            .create_project(&Identity::teacher("t"), draft())
            .expect("created");

        let result = service.update_project(
            &Identity::teacher("t2"),
            &project.slug,
            ProjectChange::Patch(ProjectPatch {
                status: Some(ProjectStatus::Published),
                ..ProjectPatch::default()
            }),
        );
        assert!(matches!(result, Err(WorkflowError::Permission(_))));
    }

    #[test]
    fn students_without_cv_are_refused_regardless_of_project_state() {
        let (service, _) = build_service();
        let teacher = Identity::teacher("t");
        let draft_project = service.create_project(&teacher, draft()).expect("created");
        let mut published = draft();
        published.status = ProjectStatus::Published;
        let published_project = service.create_project(&teacher, published).expect("created");

        for slug in [&draft_project.slug, &published_project.slug] {
            assert!(matches!(
                service.apply(&Identity::student("s"), slug, sop()),
                Err(WorkflowError::Precursor(_))
            ));
        }
    }

    #[test]
    fn withdrawn_application_never_returns_to_pending() {
        let (service, _) = build_service();
        let teacher = Identity::teacher("t");
        let s2 = Identity::student("s2");
        let project = service.create_project(&teacher, draft()).expect("created");
        service.apply(&s2, &project.slug, sop()).expect("applied");

        let withdrawn = service.withdraw(&s2, &project.slug).expect("withdrawn");
        assert_eq!(withdrawn.verdict, Verdict::Declined);
        assert!(service.withdraw(&s2, &project.slug).is_err());
        assert!(service
            .shortlist(
                &teacher,
                &project.slug,
                ShortlistDecision {
                    student: "s2".to_string(),
                    accepted: Some(VerdictInput::Flag(true)),
                },
            )
            .is_err());

        let mine = service.applications_of(&s2).expect("listing");
        assert_eq!(mine[0].verdict, Verdict::Declined);
    }
}

mod routing {
    use super::common::*;
    use axum::http::{header, Request, StatusCode};
    use research_portal::workflows::projects::{project_router, CALLER_HEADER};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post(uri: &str, caller: &str, body: Value) -> Request<axum::body::Body> {
        Request::post(uri)
            .header(CALLER_HEADER, caller)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn published_project_round_trip_over_http() {
        let (service, _) = build_service();
        let app = project_router(service);

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/projects",
                "t",
                json!({ "title": "Open Problems", "description": "x", "status": "published" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/projects/open-problems/apply",
                "s2",
                json!({ "statement": "Let me in" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::get("/api/v1/projects")
                    .body(axum::body::Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        let payload: Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload[0]["applicant_count"], 1);
    }
}
