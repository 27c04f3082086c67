//! User identity record and role tags.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of roles. Operations are keyed by role instead of user
/// subtypes, so authorization stays a flat enum check.
#[derive(ToSchema, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record. Either verified with no token fields, or unverified with
/// both `verification_token` and `verification_expiry` set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; never serialized back to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub birthday: Option<NaiveDate>,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_expiry: Option<DateTime<Utc>>,
}
