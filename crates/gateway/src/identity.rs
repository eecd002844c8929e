//! Caller identity.
//!
//! The gateway sits behind a platform that authenticates the session and
//! injects the user id as a request header. Requests without it are
//! rejected before any body is read.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Json, Response},
};

use {calbridge_common::StoreTokenResponse, tracing::warn};

use crate::server::AppState;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Please log in to connect your calendar.";

/// Authenticated user id taken from the configured identity header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(&*state.identity_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user_id {
            Some(user_id) => Ok(Self(user_id.to_string())),
            None => {
                warn!(path = %parts.uri.path(), "request without user identity");
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(StoreTokenResponse::failure(UNAUTHORIZED_MESSAGE)),
                )
                    .into_response())
            },
        }
    }
}
