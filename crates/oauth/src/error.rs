use calbridge_common::{CalendarProvider, UnknownProvider};

/// Everything that can go wrong between "Connect" and a stored token.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{0} client ID not configured")]
    NotConfigured(CalendarProvider),
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),
    #[error("invalid authorization request: {0}")]
    InvalidRequest(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("secure randomness unavailable: {0}")]
    Randomness(String),
    #[error("provider returned an error: {error}")]
    ProviderReported {
        error: String,
        description: Option<String>,
    },
    #[error("state mismatch, possible CSRF attack")]
    StateMismatch,
    #[error("OAuth flow expired before the callback arrived")]
    FlowExpired,
    #[error("malformed OAuth response: {0}")]
    MalformedResponse(String),
    #[error("token submission failed: {0}")]
    Submission(String),
    #[error("flow storage error: {0}")]
    Storage(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("callback server error: {0}")]
    CallbackServer(String),
    #[error("no OAuth callback received within {0} seconds")]
    CallbackTimeout(u64),
}

impl OAuthError {
    /// State mismatch or expiry: the callback cannot be trusted.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::StateMismatch | Self::FlowExpired)
    }

    /// Errors caused by missing or unusable local configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured(_) | Self::UnknownProvider(_) | Self::InvalidRequest(_)
        )
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Submission(err.to_string())
    }
}
