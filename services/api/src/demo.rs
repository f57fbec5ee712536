use clap::Args;
use research_portal::config::WorkflowConfig;
use research_portal::error::AppError;
use research_portal::workflows::projects::{
    ApplicationRecord, Identity, InMemoryDirectory, InMemoryPortalStore, ProjectChange,
    ProjectDraft, ProjectPatch, ProjectStatus, ProjectWorkflowService, RecordingNoticePublisher,
    ShortlistDecision, StatementOfPurpose, StudentProfile, TeacherProfile, Username, Verdict,
    VerdictInput, WorkflowError,
};
use std::sync::Arc;

type DemoService =
    ProjectWorkflowService<InMemoryPortalStore, InMemoryDirectory, RecordingNoticePublisher>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the final project, applications, and notices as JSON.
    #[arg(long)]
    pub(crate) json: bool,
    /// Accept the applicant instead of rejecting them.
    #[arg(long)]
    pub(crate) accept: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let directory = Arc::new(InMemoryDirectory::default());
    directory.register_teacher(TeacherProfile {
        username: Username::new("t"),
        name: "Dr. Grace Hopper".to_string(),
        department: Some("Computer Science".to_string()),
    })?;
    directory.register_teacher(TeacherProfile {
        username: Username::new("t2"),
        name: "Dr. Alan Turing".to_string(),
        department: None,
    })?;
    directory.register_student(StudentProfile {
        username: Username::new("s"),
        name: "Ada Lovelace".to_string(),
        cv: None,
    })?;
    directory.register_student(StudentProfile {
        username: Username::new("s2"),
        name: "Emmy Noether".to_string(),
        cv: Some("cv/s2.pdf".to_string()),
    })?;

    let notices = Arc::new(RecordingNoticePublisher::default());
    let service: DemoService = ProjectWorkflowService::new(
        Arc::new(InMemoryPortalStore::default()),
        directory,
        notices.clone(),
        WorkflowConfig::default(),
    );

    let teacher = Identity::teacher("t");
    let rival = Identity::teacher("t2");
    let student = Identity::student("s");
    let other = Identity::student("s2");

    println!("Research Portal Demo");
    println!("====================");

    let project = service.create_project(
        &teacher,
        ProjectDraft {
            title: "Graph Neural Networks for Chemistry".to_string(),
            description: "Message passing models for molecular property prediction.".to_string(),
            tags: vec!["ml".to_string(), "chemistry".to_string()],
            status: ProjectStatus::Draft,
            is_active: true,
        },
    )?;
    println!(
        "t created '{}' as {} ({})",
        project.title,
        project.slug,
        project.status.label()
    );

    expect_refusal(
        "t2 publishes t's project",
        service.update_project(
            &rival,
            &project.slug,
            ProjectChange::Patch(ProjectPatch {
                status: Some(ProjectStatus::Published),
                ..ProjectPatch::default()
            }),
        ),
    )?;

    let statement = || StatementOfPurpose {
        statement: "I have built message passing models for small molecules.".to_string(),
    };

    expect_refusal(
        "s applies without a CV",
        service.apply(&student, &project.slug, statement()),
    )?;

    let profile = service.attach_cv(&student, "cv/s.pdf".to_string())?;
    println!("s uploaded a CV ({})", profile.cv.as_deref().unwrap_or("-"));

    let application = service.apply(&student, &project.slug, statement())?;
    print_application("s applied", &application);

    expect_refusal(
        "s applies a second time",
        service.apply(&student, &project.slug, statement()),
    )?;

    let verdict = if args.accept {
        VerdictInput::Flag(true)
    } else {
        VerdictInput::Code(i64::from(Verdict::Declined.code()))
    };
    let decided = service.shortlist(
        &teacher,
        &project.slug,
        ShortlistDecision {
            student: "s".to_string(),
            accepted: Some(verdict),
        },
    )?;
    print_application("t decided s", &decided);

    expect_refusal(
        "s withdraws a decided application",
        service.withdraw(&student, &project.slug),
    )?;

    let second = service.apply(&other, &project.slug, statement())?;
    print_application("s2 applied", &second);
    let withdrawn = service.withdraw(&other, &project.slug)?;
    print_application("s2 withdrew", &withdrawn);

    let accepted = service.roster(&teacher, &project.slug, Verdict::Accepted)?;
    let pending = service.roster(&teacher, &project.slug, Verdict::Pending)?;
    println!(
        "Roster: {} shortlisted, {} awaiting a decision",
        accepted.len(),
        pending.len()
    );

    let events = notices.events();
    if args.json {
        let stored = service.view_project(&teacher, &project.slug)?;
        let mut applications = service.applications_of(&student)?;
        applications.extend(service.applications_of(&other)?);
        let summary = serde_json::json!({
            "project": stored.view(true),
            "applications": applications.iter().map(ApplicationRecord::view).collect::<Vec<_>>(),
            "notices": events,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("failed to render summary: {err}"),
        }
    } else {
        println!("Notices sent: {}", events.len());
        for notice in &events {
            println!("  - {} -> {} ({})", notice.template, notice.student, notice.project);
        }
    }

    Ok(())
}

/// Print a refusal the walkthrough expects; anything that succeeds or fails
/// for an infrastructure reason aborts the demo.
fn expect_refusal<T>(step: &str, outcome: Result<T, WorkflowError>) -> Result<(), AppError> {
    match outcome {
        Err(err @ (WorkflowError::Directory(_) | WorkflowError::Repository(_))) => Err(err.into()),
        Err(err) => {
            println!("{step}: refused [{}] {err}", err.kind());
            Ok(())
        }
        Ok(_) => Err(WorkflowError::validation(format!("{step} unexpectedly succeeded")).into()),
    }
}

fn print_application(step: &str, record: &ApplicationRecord) {
    println!(
        "{step}: {} on {} is {}",
        record.id,
        record.project,
        record.verdict.label()
    );
}
