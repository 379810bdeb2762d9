use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Practitioner,
    Admin,
    /// Internal role used by background lifecycle maintenance.
    System,
}

impl ActorRole {
    pub fn parse(role: &str) -> Option<Self> {
        match role.trim().to_ascii_lowercase().as_str() {
            "patient" => Some(ActorRole::Patient),
            "doctor" | "practitioner" => Some(ActorRole::Practitioner),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Practitioner => write!(f, "practitioner"),
            ActorRole::Admin => write!(f, "admin"),
            ActorRole::System => write!(f, "system"),
        }
    }
}

/// The caller on whose behalf an operation runs. Supplied per call, never stored globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn patient(id: Uuid) -> Self {
        Self { id, role: ActorRole::Patient }
    }

    pub fn practitioner(id: Uuid) -> Self {
        Self { id, role: ActorRole::Practitioner }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, role: ActorRole::Admin }
    }

    pub fn system() -> Self {
        Self { id: Uuid::nil(), role: ActorRole::System }
    }

    pub fn is_system(&self) -> bool {
        self.role == ActorRole::System
    }

    /// Build an actor from an authenticated user. The system role can never come from a token.
    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("User id is not a valid UUID".to_string()))?;

        let role = user
            .role
            .as_deref()
            .and_then(ActorRole::parse)
            .ok_or_else(|| AppError::Auth("User role is missing or not recognised".to_string()))?;

        Ok(Self { id, role })
    }
}
