//! Client for the token-storage endpoint.

use {
    async_trait::async_trait,
    calbridge_common::{ConnectedCalendar, StoreTokenResponse, TokenSubmission},
    tracing::{debug, error, info},
    url::Url,
};

use crate::error::OAuthError;

/// Hands a freshly obtained token to whatever persists it.
#[async_trait]
pub trait TokenSubmitter: Send + Sync {
    /// One attempt; retrying is up to the caller.
    async fn submit(&self, submission: &TokenSubmission) -> Result<StoreTokenResponse, OAuthError>;
}

/// HTTP client for the gateway's `/api/calendar/tokens` endpoint.
///
/// The caller's identity travels as a single header, standing in for the
/// platform session that the gateway trusts.
#[derive(Debug, Clone)]
pub struct TokenApiClient {
    client: reqwest::Client,
    endpoint: Url,
    identity: Option<(String, String)>,
}

impl TokenApiClient {
    pub fn new(endpoint: &str) -> Result<Self, OAuthError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: Url::parse(endpoint)?,
            identity: None,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, header: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.identity = Some((header.into(), user_id.into()));
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.identity {
            Some((header, user_id)) => builder.header(header.as_str(), user_id.as_str()),
            None => builder,
        }
    }

    /// Calendars the current identity has connected.
    pub async fn list_calendars(&self) -> Result<Vec<ConnectedCalendar>, OAuthError> {
        let resp = self
            .request(reqwest::Method::GET, self.endpoint.clone())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::Submission(format!(
                "listing calendars failed ({status}): {body}"
            )));
        }
        Ok(resp.json().await?)
    }

    /// Remove the stored token for `provider`. Returns whether one existed.
    pub async fn disconnect(&self, provider: &str) -> Result<bool, OAuthError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| OAuthError::InvalidRequest("token endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .push(provider);
        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(OAuthError::Submission(format!(
                    "disconnect failed ({status}): {body}"
                )))
            },
        }
    }
}

#[async_trait]
impl TokenSubmitter for TokenApiClient {
    async fn submit(&self, submission: &TokenSubmission) -> Result<StoreTokenResponse, OAuthError> {
        debug!(provider = %submission.provider, endpoint = %self.endpoint, "submitting calendar token");

        let resp = self
            .request(reqwest::Method::POST, self.endpoint.clone())
            .json(submission)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<StoreTokenResponse>(&body).ok();

        #[cfg(feature = "metrics")]
        calbridge_metrics::counter!(
            calbridge_metrics::oauth::TOKEN_SUBMISSIONS_TOTAL,
            calbridge_metrics::labels::SUCCESS => (status.is_success() && parsed.as_ref().is_some_and(|r| r.success)).to_string()
        )
        .increment(1);

        match parsed {
            Some(ack) if status.is_success() && ack.success => {
                info!(provider = %submission.provider, "calendar token stored");
                Ok(ack)
            },
            Some(ack) => {
                error!(%status, message = %ack.message, "token storage rejected the submission");
                Err(OAuthError::Submission(ack.message))
            },
            None => {
                error!(%status, "token storage returned an unexpected response");
                Err(OAuthError::Submission(format!(
                    "unexpected response ({status}): {body}"
                )))
            },
        }
    }
}
