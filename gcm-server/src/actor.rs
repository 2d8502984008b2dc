//! Caller identity
//!
//! Authentication happens upstream. The fronting layer forwards the user id
//! in `X-GCM-User` and, optionally, a display name in `X-GCM-User-Name`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-gcm-user";
pub const USER_NAME_HEADER: &str = "x-gcm-user-name";

const MAX_NAME_LEN: usize = 100;

/// Identity of the user making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub display_name: String,
}

impl Actor {
    pub fn new(user_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }

    /// Fallback display name derived from the id
    fn default_name(user_id: Uuid) -> String {
        let id = user_id.simple().to_string();
        format!("Participant {}", &id[..8])
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-GCM-User header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("X-GCM-User is not valid text".to_string()))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| ApiError::Unauthorized("X-GCM-User is not a valid UUID".to_string()))?;

        let display_name = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.chars().take(MAX_NAME_LEN).collect())
            .unwrap_or_else(|| Actor::default_name(user_id));

        Ok(Actor { user_id, display_name })
    }
}
