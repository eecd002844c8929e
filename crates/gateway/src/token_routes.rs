//! `/api/calendar/tokens` handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use {
    calbridge_common::{CalendarProvider, StoreTokenResponse},
    serde::Deserialize,
    tracing::{error, info, warn},
};

use crate::{
    identity::CallerIdentity,
    server::AppState,
    token_store::NewToken,
};

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: provider and accessToken";
pub const STORE_FAILED_MESSAGE: &str = "Failed to connect calendar. Please try again.";

/// Lifetime assumed when the client sends no `expiresIn`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Body of `POST /api/calendar/tokens`. Every field is optional here so
/// validation can answer with the endpoint's own messages.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreTokenRequest {
    provider: Option<String>,
    access_token: Option<String>,
    scope: Option<String>,
    expires_in: Option<serde_json::Value>,
}

/// `expiresIn` arrives as a decimal string from the callback page, but a
/// plain JSON number is accepted too.
fn parse_expires_in(value: Option<&serde_json::Value>) -> Option<i64> {
    match value {
        None | Some(serde_json::Value::Null) => Some(DEFAULT_EXPIRES_IN_SECS),
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Some(DEFAULT_EXPIRES_IN_SECS),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    }
}

fn reply(status: StatusCode, body: StoreTokenResponse) -> Response {
    (status, Json(body)).into_response()
}

fn reject(reason: &'static str) -> Response {
    #[cfg(feature = "metrics")]
    calbridge_metrics::counter!(
        calbridge_metrics::tokens::REJECTED_TOTAL,
        calbridge_metrics::labels::REASON => reason
    )
    .increment(1);
    warn!(reason, "rejected calendar token request");
    reply(
        StatusCode::BAD_REQUEST,
        StoreTokenResponse::failure(MISSING_FIELDS_MESSAGE),
    )
}

pub async fn store_token_handler(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: String,
) -> Response {
    let Ok(request) = serde_json::from_str::<StoreTokenRequest>(&body) else {
        return reject("invalid_json");
    };

    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(provider), Some(access_token)) =
        (non_empty(request.provider), non_empty(request.access_token))
    else {
        return reject("missing_fields");
    };
    let Ok(provider) = provider.parse::<CalendarProvider>() else {
        return reject("unknown_provider");
    };
    let Some(expires_in_secs) = parse_expires_in(request.expires_in.as_ref()) else {
        return reject("invalid_expires_in");
    };
    let scope = request.scope.unwrap_or_default();

    info!(user_id = caller.user_id(), %provider, "storing calendar token");

    let stored = state
        .store
        .upsert(NewToken {
            user_id: caller.user_id(),
            provider,
            access_token: &access_token,
            scope: &scope,
            expires_in_secs,
        })
        .await;

    match stored {
        Ok(record) => {
            #[cfg(feature = "metrics")]
            calbridge_metrics::counter!(
                calbridge_metrics::tokens::STORED_TOTAL,
                calbridge_metrics::labels::PROVIDER => provider.as_str()
            )
            .increment(1);
            info!(user_id = caller.user_id(), %provider, "stored calendar token");
            reply(StatusCode::OK, StoreTokenResponse {
                success: true,
                message: format!("{provider} calendar connected successfully"),
                provider: Some(provider.to_string()),
                connected_at: Some(record.connected_at),
                error: None,
            })
        },
        Err(e) => {
            error!(user_id = caller.user_id(), %provider, error = %e, "failed to store calendar token");
            reply(StatusCode::INTERNAL_SERVER_ERROR, StoreTokenResponse {
                error: Some(e.to_string()),
                ..StoreTokenResponse::failure(STORE_FAILED_MESSAGE)
            })
        },
    }
}

pub async fn list_tokens_handler(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Response {
    match state.store.list_for_user(caller.user_id()).await {
        Ok(records) => {
            let calendars: Vec<_> = records.iter().map(|r| r.summary()).collect();
            Json(calendars).into_response()
        },
        Err(e) => {
            error!(user_id = caller.user_id(), error = %e, "failed to list calendar tokens");
            reply(StatusCode::INTERNAL_SERVER_ERROR, StoreTokenResponse {
                error: Some(e.to_string()),
                ..StoreTokenResponse::failure("Failed to load connected calendars.")
            })
        },
    }
}

pub async fn delete_token_handler(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(provider): Path<String>,
) -> Response {
    let Ok(provider) = provider.parse::<CalendarProvider>() else {
        return reply(
            StatusCode::NOT_FOUND,
            StoreTokenResponse::failure(format!("Unknown calendar provider: {provider}")),
        );
    };

    match state.store.delete(caller.user_id(), provider).await {
        Ok(true) => {
            #[cfg(feature = "metrics")]
            calbridge_metrics::counter!(
                calbridge_metrics::tokens::DELETED_TOTAL,
                calbridge_metrics::labels::PROVIDER => provider.as_str()
            )
            .increment(1);
            info!(user_id = caller.user_id(), %provider, "calendar disconnected");
            reply(StatusCode::OK, StoreTokenResponse {
                success: true,
                message: format!("{provider} calendar disconnected"),
                provider: Some(provider.to_string()),
                connected_at: None,
                error: None,
            })
        },
        Ok(false) => reply(
            StatusCode::NOT_FOUND,
            StoreTokenResponse::failure(format!("No {provider} calendar connected")),
        ),
        Err(e) => {
            error!(user_id = caller.user_id(), %provider, error = %e, "failed to delete calendar token");
            reply(StatusCode::INTERNAL_SERVER_ERROR, StoreTokenResponse {
                error: Some(e.to_string()),
                ..StoreTokenResponse::failure("Failed to disconnect calendar. Please try again.")
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_in_accepts_strings_and_numbers() {
        assert_eq!(parse_expires_in(None), Some(3600));
        assert_eq!(
            parse_expires_in(Some(&serde_json::json!("1800"))),
            Some(1800)
        );
        assert_eq!(parse_expires_in(Some(&serde_json::json!(60))), Some(60));
        assert_eq!(parse_expires_in(Some(&serde_json::json!(""))), Some(3600));
        assert_eq!(parse_expires_in(Some(&serde_json::json!("soon"))), None);
        assert_eq!(parse_expires_in(Some(&serde_json::json!(1.5))), None);
        assert_eq!(parse_expires_in(Some(&serde_json::json!(true))), None);
    }
}
