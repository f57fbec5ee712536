use serde::{Deserialize, Serialize};

use super::domain::Username;

/// Closed set of portal roles; every user holds exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

/// Authenticated caller, passed explicitly into every workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: Username,
    pub role: Role,
}

impl Identity {
    pub fn teacher(username: impl Into<String>) -> Self {
        Self {
            username: Username::new(username),
            role: Role::Teacher,
        }
    }

    pub fn student(username: impl Into<String>) -> Self {
        Self {
            username: Username::new(username),
            role: Role::Student,
        }
    }

    pub fn holds(&self, role: Role) -> bool {
        self.role == role
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub username: Username,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub username: Username,
    pub name: String,
    /// Reference to an uploaded CV; storage of the file itself lives elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv: Option<String>,
}

impl StudentProfile {
    pub fn has_cv(&self) -> bool {
        self.cv
            .as_deref()
            .map(|reference| !reference.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Identity provider plus role-specific profile lookups.
pub trait ProfileDirectory: Send + Sync {
    fn resolve(&self, username: &Username) -> Result<Option<Identity>, DirectoryError>;
    fn teacher(&self, username: &Username) -> Result<Option<TeacherProfile>, DirectoryError>;
    fn student(&self, username: &Username) -> Result<Option<StudentProfile>, DirectoryError>;
    fn attach_cv(
        &self,
        username: &Username,
        cv_reference: String,
    ) -> Result<StudentProfile, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("no profile registered for {0}")]
    UnknownProfile(Username),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}
