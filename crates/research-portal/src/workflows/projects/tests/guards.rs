use chrono::Utc;

use super::common::*;
use crate::config::WorkflowConfig;
use crate::workflows::projects::domain::{
    Project, ProjectSlug, ProjectStatus, ShortlistDecision, Username, Verdict, VerdictInput,
};
use crate::workflows::projects::guards;
use crate::workflows::projects::identity::{Identity, Role};
use crate::workflows::projects::repository::ApplicationRepository;
use crate::workflows::projects::{ProjectWorkflowService, WorkflowError};

fn project(status: ProjectStatus, is_active: bool) -> Project {
    let now = Utc::now();
    Project {
        slug: ProjectSlug("sparse-attention".to_string()),
        title: "Sparse Attention".to_string(),
        description: "Long documents".to_string(),
        tags: Vec::new(),
        teacher: Username::new("turing"),
        status,
        is_active,
        applicants: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn require_role_is_the_only_capability_check() {
    let student = Identity::student("curie");
    assert!(guards::require_role(&student, Role::Student, "x").is_ok());
    match guards::require_role(&student, Role::Teacher, "not a teacher") {
        Err(WorkflowError::Permission(message)) => assert_eq!(message, "not a teacher"),
        other => panic!("expected permission error, got {other:?}"),
    }
}

#[test]
fn unlisted_projects_are_only_viewable_by_owner() {
    let stranger = Identity::teacher("hopper");
    let owner = Identity::teacher("turing");

    for (status, active) in [
        (ProjectStatus::Draft, true),
        (ProjectStatus::Draft, false),
        (ProjectStatus::Published, false),
    ] {
        assert!(matches!(
            guards::viewable(project(status, active), &stranger),
            Err(WorkflowError::NotAvailable(_))
        ));
        assert!(guards::viewable(project(status, active), &owner).is_ok());
    }
    assert!(guards::viewable(project(ProjectStatus::Published, true), &stranger).is_ok());
}

#[test]
fn owned_project_hides_foreign_projects() {
    let slug = ProjectSlug("sparse-attention".to_string());
    let stored = Some(project(ProjectStatus::Published, true));
    assert!(guards::owned_project(stored.clone(), &Identity::teacher("turing"), &slug).is_ok());
    assert!(matches!(
        guards::owned_project(stored, &Identity::teacher("hopper"), &slug),
        Err(WorkflowError::NotFound(_))
    ));
    assert!(matches!(
        guards::owned_project(None, &Identity::teacher("turing"), &slug),
        Err(WorkflowError::NotFound(_))
    ));
}

#[test]
fn applicant_set_alone_blocks_reapplication() {
    let mut stored = project(ProjectStatus::Published, true);
    stored.applicants.insert(Username::new("curie"));

    match guards::not_yet_applied(None, &stored, &student("curie", Some("cv.pdf"))) {
        Err(WorkflowError::Conflict(message)) => assert_eq!(message, "already applied"),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(guards::not_yet_applied(None, &stored, &student("noether", Some("cv.pdf"))).is_ok());
}

#[test]
fn pending_application_requires_pending_verdict() {
    let mut record = pending_record("sparse-attention", "curie");
    assert!(guards::pending_application(Some(record.clone())).is_ok());
    record.verdict = Verdict::Accepted;
    assert!(matches!(
        guards::pending_application(Some(record)),
        Err(WorkflowError::Conflict(_))
    ));
    assert!(matches!(
        guards::pending_application(None),
        Err(WorkflowError::Conflict(_))
    ));
}

#[test]
fn permitted_verdict_never_allows_pending() {
    let permitted = [Verdict::Accepted, Verdict::Declined, Verdict::Pending];
    assert!(guards::permitted_verdict(Some(Verdict::Pending), &permitted).is_err());
    assert_eq!(
        guards::permitted_verdict(Some(Verdict::Declined), &permitted).unwrap(),
        Verdict::Declined
    );
    assert!(guards::permitted_verdict(None, &permitted).is_err());
}

#[test]
fn store_enroll_is_unique_per_pair() {
    let harness = harness();
    let project = published_project(&harness, "Unique");
    let application = new_application(project.slug.as_str(), "curie");
    harness
        .store
        .enroll(application.clone())
        .expect("first enroll");

    assert!(matches!(
        harness.store.enroll(application),
        Err(crate::workflows::projects::RepositoryError::Conflict)
    ));
    assert_eq!(
        harness
            .store
            .applications_for_project(&project.slug, Verdict::Pending)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn store_enroll_requires_project() {
    let harness = harness();
    assert!(matches!(
        harness.store.enroll(new_application("ghost", "curie")),
        Err(crate::workflows::projects::RepositoryError::NotFound)
    ));
}

#[test]
fn concurrent_submissions_produce_one_application() {
    let harness = harness();
    let project = published_project(&harness, "Race");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = harness.service.clone();
            let slug = project.slug.clone();
            std::thread::spawn(move || {
                service.apply(&Identity::student("curie"), &slug, sop("race"))
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread joins"))
        .filter(Result::is_ok)
        .count();
    assert_eq!(successes, 1);
}

#[test]
fn settle_refuses_terminal_applications() {
    let harness = harness();
    let project = published_project(&harness, "Settle");
    let record = harness
        .store
        .enroll(new_application(project.slug.as_str(), "curie"))
        .expect("enrolled");

    harness
        .store
        .settle(&record.id, Verdict::Accepted, Utc::now())
        .expect("first transition");
    assert!(matches!(
        harness.store.settle(&record.id, Verdict::Declined, Utc::now()),
        Err(crate::workflows::projects::RepositoryError::Conflict)
    ));
}

#[test]
fn services_sharing_a_store_never_reuse_application_ids() {
    let harness = harness();
    let project = published_project(&harness, "Shared Store");
    let second = ProjectWorkflowService::new(
        harness.store.clone(),
        harness.directory.clone(),
        harness.notices.clone(),
        WorkflowConfig::default(),
    );

    let first = harness
        .service
        .apply(&Identity::student("curie"), &project.slug, sop("first service"))
        .expect("applied through first service");
    let other = second
        .apply(&Identity::student("noether"), &project.slug, sop("second service"))
        .expect("applied through second service");
    assert_ne!(first.id, other.id);

    second
        .shortlist(
            &Identity::teacher("turing"),
            &project.slug,
            ShortlistDecision {
                student: "noether".to_string(),
                accepted: Some(VerdictInput::Flag(true)),
            },
        )
        .expect("decided");
    let untouched = harness
        .store
        .find_application(&project.slug, &Username::new("curie"))
        .unwrap()
        .expect("stored");
    assert_eq!(untouched.verdict, Verdict::Pending);
}
