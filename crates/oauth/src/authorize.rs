//! Authorization URL construction for the implicit grant.

use {calbridge_common::CalendarProvider, url::Url};

use crate::{
    defaults::{GOOGLE_AUTH_ENDPOINT, MICROSOFT_DEFAULT_TENANT, microsoft_auth_endpoint},
    error::OAuthError,
    state::generate_nonce,
};

/// Everything needed to build one authorization redirect. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub state: String,
    /// Microsoft only; defaults to `common`.
    pub tenant: Option<String>,
    /// Microsoft only; a fresh one is drawn when absent.
    pub nonce: Option<String>,
}

impl AuthorizationRequest {
    /// Build the provider URL. Checks the request first so a bad configuration
    /// never produces a partial redirect.
    pub fn authorization_url(&self, provider: CalendarProvider) -> Result<Url, OAuthError> {
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::NotConfigured(provider));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(OAuthError::InvalidRequest("redirect_uri is required".into()));
        }
        if self.state.is_empty() {
            return Err(OAuthError::InvalidRequest("state is required".into()));
        }
        if self.scopes.is_empty() {
            return Err(OAuthError::InvalidRequest("at least one scope is required".into()));
        }

        match provider {
            CalendarProvider::Google => self.google_url(),
            CalendarProvider::Microsoft => self.microsoft_url(),
        }
    }

    fn google_url(&self) -> Result<Url, OAuthError> {
        let mut url = Url::parse(GOOGLE_AUTH_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "token")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &self.state)
            .append_pair("include_granted_scopes", "true");
        Ok(url)
    }

    fn microsoft_url(&self) -> Result<Url, OAuthError> {
        let tenant = self
            .tenant
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(MICROSOFT_DEFAULT_TENANT);
        let nonce = match &self.nonce {
            Some(nonce) => nonce.clone(),
            None => generate_nonce()?,
        };

        let mut url = Url::parse(&microsoft_auth_endpoint(tenant))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "token")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &self.state)
            .append_pair("response_mode", "fragment")
            .append_pair("nonce", &nonce);
        Ok(url)
    }
}
