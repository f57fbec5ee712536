use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// URL-safe project identifier derived from the title at creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectSlug(pub String);

impl ProjectSlug {
    /// Lowercase ASCII alphanumeric runs joined by single dashes.
    pub fn from_title(title: &str) -> Self {
        let mut slug = String::with_capacity(title.len());
        let mut separator = false;
        for ch in title.chars() {
            if ch.is_ascii_alphanumeric() {
                if separator && !slug.is_empty() {
                    slug.push('-');
                }
                separator = false;
                slug.push(ch.to_ascii_lowercase());
            } else {
                separator = true;
            }
        }

        if slug.is_empty() {
            slug.push_str("project");
        }
        Self(slug)
    }

    pub fn with_suffix(&self, suffix: usize) -> Self {
        Self(format!("{}-{suffix}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login name shared by the identity provider and profile records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Published,
}

impl ProjectStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Published => "published",
        }
    }
}

/// Research project posted by a teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub slug: ProjectSlug,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub teacher: Username,
    pub status: ProjectStatus,
    pub is_active: bool,
    pub applicants: BTreeSet<Username>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Visible to callers other than the owner.
    pub fn is_listed(&self) -> bool {
        self.status == ProjectStatus::Published && self.is_active
    }

    pub fn is_owned_by(&self, username: &Username) -> bool {
        &self.teacher == username
    }

    pub fn has_applicant(&self, username: &Username) -> bool {
        self.applicants.contains(username)
    }

    /// Overwrite every mutable field from a validated draft. Slug and applicants are untouched.
    pub fn apply_draft(&mut self, draft: ProjectDraft, at: DateTime<Utc>) {
        self.title = draft.title;
        self.description = draft.description;
        self.tags = draft.tags;
        self.status = draft.status;
        self.is_active = draft.is_active;
        self.updated_at = at;
    }

    pub fn draft(&self) -> ProjectDraft {
        ProjectDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            status: self.status,
            is_active: self.is_active,
        }
    }

    /// Wire representation; the applicant roster is only disclosed to the owner.
    pub fn view(&self, include_applicants: bool) -> ProjectView {
        ProjectView {
            slug: self.slug.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            teacher: self.teacher.clone(),
            status: self.status.label(),
            is_active: self.is_active,
            applicant_count: self.applicants.len(),
            applicants: include_applicants.then(|| self.applicants.iter().cloned().collect()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub slug: ProjectSlug,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub teacher: Username,
    pub status: &'static str,
    pub is_active: bool,
    pub applicant_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicants: Option<Vec<Username>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Payload for creating a project or replacing all of its mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProjectDraft {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 10))]
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ProjectPatch {
    pub fn merge_into(self, mut draft: ProjectDraft) -> ProjectDraft {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(tags) = self.tags {
            draft.tags = tags;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(is_active) = self.is_active {
            draft.is_active = is_active;
        }
        draft
    }
}

/// Update requested by the owner: full replacement (PUT) or partial (PATCH).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectChange {
    Replace(ProjectDraft),
    Patch(ProjectPatch),
}

impl ProjectChange {
    pub fn replace_from_json(body: Value) -> Payload<ProjectChange> {
        Payload::json_with(body, |body| {
            serde_json::from_value(body).map(ProjectChange::Replace)
        })
    }

    pub fn patch_from_json(body: Value) -> Payload<ProjectChange> {
        Payload::json_with(body, |body| serde_json::from_value(body).map(ProjectChange::Patch))
    }
}

/// Request body handed to the workflow undecoded, so decoding runs after the
/// existence, role and profile checks instead of ahead of them.
#[derive(Debug)]
pub enum Payload<T> {
    Typed(T),
    Json {
        body: Value,
        decode: fn(Value) -> Result<T, serde_json::Error>,
    },
    /// The body never parsed as JSON; carries the extractor's explanation.
    Malformed(String),
}

impl<T: DeserializeOwned> Payload<T> {
    pub fn from_json(body: Value) -> Self {
        Payload::Json {
            body,
            decode: serde_json::from_value::<T>,
        }
    }
}

impl<T> Payload<T> {
    pub fn json_with(body: Value, decode: fn(Value) -> Result<T, serde_json::Error>) -> Self {
        Payload::Json { body, decode }
    }

    pub fn decode(self) -> Result<T, PayloadError> {
        match self {
            Payload::Typed(value) => Ok(value),
            Payload::Json { body, decode } => {
                decode(body).map_err(|err| PayloadError(err.to_string()))
            }
            Payload::Malformed(reason) => Err(PayloadError(reason)),
        }
    }
}

impl<T> From<T> for Payload<T> {
    fn from(value: T) -> Self {
        Payload::Typed(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid request body: {0}")]
pub struct PayloadError(pub String);

/// Identifier wrapper for submitted statements of purpose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of an application. Rejection and withdrawal share the same terminal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Verdict {
    Pending,
    Accepted,
    Declined,
}

impl Verdict {
    pub const fn code(self) -> i8 {
        match self {
            Verdict::Pending => 0,
            Verdict::Accepted => 1,
            Verdict::Declined => -1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Verdict::Pending => "pending",
            Verdict::Accepted => "accepted",
            Verdict::Declined => "rejected",
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, Verdict::Pending)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Verdict::Pending),
            1 => Some(Verdict::Accepted),
            -1 => Some(Verdict::Declined),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Verdict::Pending),
            "accepted" | "accept" => Some(Verdict::Accepted),
            "rejected" | "reject" | "declined" => Some(Verdict::Declined),
            _ => None,
        }
    }
}

impl From<Verdict> for i8 {
    fn from(value: Verdict) -> Self {
        value.code()
    }
}

impl TryFrom<i8> for Verdict {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Verdict::from_code(i64::from(value)).ok_or_else(|| format!("unknown verdict code {value}"))
    }
}

/// Statement of purpose submitted with an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StatementOfPurpose {
    #[validate(length(min = 1, max = 10000), custom(function = "not_blank"))]
    #[serde(default)]
    pub statement: String,
}

/// Stored application linking one student to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub project: ProjectSlug,
    pub student: Username,
    pub statement: String,
    pub verdict: Verdict,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            id: self.id.clone(),
            project: self.project.clone(),
            student: self.student.clone(),
            statement: self.statement.clone(),
            verdict: self.verdict,
            verdict_label: self.verdict.label(),
            submitted_at: self.submitted_at,
            decided_at: self.decided_at,
        }
    }
}

/// Application as submitted; the store assigns the id when it enrolls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub project: ProjectSlug,
    pub student: Username,
    pub statement: String,
    pub submitted_at: DateTime<Utc>,
}

impl NewApplication {
    pub fn into_record(self, id: ApplicationId) -> ApplicationRecord {
        ApplicationRecord {
            id,
            project: self.project,
            student: self.student,
            statement: self.statement,
            verdict: Verdict::Pending,
            submitted_at: self.submitted_at,
            decided_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub project: ProjectSlug,
    pub student: Username,
    pub statement: String,
    pub verdict: Verdict,
    pub verdict_label: &'static str,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Verdict as sent by clients: a boolean flag or a raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerdictInput {
    Flag(bool),
    Code(i64),
}

impl VerdictInput {
    pub fn resolve(self) -> Option<Verdict> {
        match self {
            VerdictInput::Flag(true) => Some(Verdict::Accepted),
            VerdictInput::Flag(false) => Some(Verdict::Declined),
            VerdictInput::Code(code) => Verdict::from_code(code),
        }
    }
}

/// Teacher's accept/reject decision for one applicant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortlistDecision {
    #[serde(default, alias = "stud_username")]
    pub student: String,
    #[serde(default)]
    pub accepted: Option<VerdictInput>,
}
