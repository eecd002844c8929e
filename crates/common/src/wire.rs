//! JSON bodies exchanged with the token-storage endpoint.

use {
    secrecy::{ExposeSecret, SecretString},
    serde::{Deserialize, Serialize, Serializer},
};

/// Token payload submitted after a successful callback.
///
/// `expires_in` stays a string-encoded integer (seconds), matching what the
/// provider put in the redirect fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSubmission {
    pub provider: String,
    #[serde(serialize_with = "expose_secret")]
    pub access_token: SecretString,
    pub scope: String,
    pub expires_in: String,
}

fn expose_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Acknowledgement returned by the token-storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTokenResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreTokenResponse {
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            provider: None,
            connected_at: None,
            error: None,
        }
    }
}

/// A connected calendar as listed back to its owner. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedCalendar {
    pub provider: String,
    pub scope: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
    /// ISO-8601, UTC.
    pub connected_at: String,
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_uses_camel_case_and_exposes_token_on_the_wire() {
        let submission = TokenSubmission {
            provider: "google".into(),
            access_token: SecretString::new("tok123".into()),
            scope: "a b".into(),
            expires_in: "3600".into(),
        };
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["accessToken"], "tok123");
        assert_eq!(json["expiresIn"], "3600");
        assert_eq!(json["provider"], "google");
    }

    #[test]
    fn submission_debug_redacts_token() {
        let submission = TokenSubmission {
            provider: "google".into(),
            access_token: SecretString::new("super-secret".into()),
            scope: String::new(),
            expires_in: "3600".into(),
        };
        assert!(!format!("{submission:?}").contains("super-secret"));
    }

    #[test]
    fn failure_response_omits_optional_fields() {
        let json = serde_json::to_value(StoreTokenResponse::failure("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "nope"}));
    }

    #[test]
    fn response_parses_server_success_body() {
        let body = r#"{
            "success": true,
            "message": "google calendar connected successfully",
            "provider": "google",
            "connectedAt": "2026-01-02T03:04:05.678Z"
        }"#;
        let resp: StoreTokenResponse = serde_json::from_str(body).unwrap();
        assert!(resp.success);
        assert_eq!(resp.provider.as_deref(), Some("google"));
        assert_eq!(
            resp.connected_at.as_deref(),
            Some("2026-01-02T03:04:05.678Z")
        );
    }
}
