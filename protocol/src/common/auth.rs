//! Authentication-related common types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role reported by the API for the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
    Guest,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "student" => Role::Student,
            "teacher" => Role::Teacher,
            "admin" => Role::Admin,
            "guest" => Role::Guest,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => f.write_str("student"),
            Role::Teacher => f.write_str("teacher"),
            Role::Admin => f.write_str("admin"),
            Role::Guest => f.write_str("guest"),
            Role::Other(name) => f.write_str(name),
        }
    }
}

/// Signed-in user as remembered by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub uid: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}
