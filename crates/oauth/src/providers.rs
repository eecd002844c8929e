//! Provider handler factory.

use {
    calbridge_common::CalendarProvider,
    calbridge_config::CalbridgeConfig,
    url::Url,
};

use crate::{
    defaults::{GOOGLE_CONNECT_SCOPES, MICROSOFT_CONNECT_SCOPES, MICROSOFT_DEFAULT_TENANT},
    error::OAuthError,
    flow::{BeginParams, OAuthFlow},
};

/// A configuration-checked handler for one calendar provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderHandler {
    Google {
        client_id: Option<String>,
        redirect_uri: String,
    },
    Microsoft {
        client_id: Option<String>,
        redirect_uri: String,
        tenant: String,
    },
}

impl ProviderHandler {
    #[must_use]
    pub fn new(provider: CalendarProvider, config: &CalbridgeConfig) -> Self {
        let fallback = |provider: CalendarProvider| {
            format!(
                "{}/oauth/{provider}/callback",
                config.oauth.redirect_base_url.trim_end_matches('/')
            )
        };
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match provider {
            CalendarProvider::Google => Self::Google {
                client_id: non_empty(&config.google.client_id),
                redirect_uri: non_empty(&config.google.redirect_uri)
                    .unwrap_or_else(|| fallback(provider)),
            },
            CalendarProvider::Microsoft => Self::Microsoft {
                client_id: non_empty(&config.microsoft.client_id),
                redirect_uri: non_empty(&config.microsoft.redirect_uri)
                    .unwrap_or_else(|| fallback(provider)),
                tenant: non_empty(&config.microsoft.tenant)
                    .unwrap_or_else(|| MICROSOFT_DEFAULT_TENANT.to_string()),
            },
        }
    }

    /// Look a handler up by its identifier (`"google"`, `"microsoft"`).
    pub fn for_name(name: &str, config: &CalbridgeConfig) -> Result<Self, OAuthError> {
        let provider: CalendarProvider = name.parse()?;
        Ok(Self::new(provider, config))
    }

    #[must_use]
    pub fn provider(&self) -> CalendarProvider {
        match self {
            Self::Google { .. } => CalendarProvider::Google,
            Self::Microsoft { .. } => CalendarProvider::Microsoft,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        Self::display_name(self.provider())
    }

    #[must_use]
    pub fn display_name(provider: CalendarProvider) -> &'static str {
        match provider {
            CalendarProvider::Google => "Google Calendar",
            CalendarProvider::Microsoft => "Microsoft Outlook",
        }
    }

    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        let scopes = match self {
            Self::Google { .. } => GOOGLE_CONNECT_SCOPES,
            Self::Microsoft { .. } => MICROSOFT_CONNECT_SCOPES,
        };
        scopes.iter().map(|s| (*s).to_string()).collect()
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        match self {
            Self::Google { redirect_uri, .. } | Self::Microsoft { redirect_uri, .. } => redirect_uri,
        }
    }

    fn client_id(&self) -> Option<&str> {
        match self {
            Self::Google { client_id, .. } | Self::Microsoft { client_id, .. } => {
                client_id.as_deref()
            },
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_id().is_some()
    }

    /// What to do about a missing client id. Only meaningful when
    /// [`is_configured`](Self::is_configured) is false.
    #[must_use]
    pub fn config_error(&self) -> String {
        let (section, env) = match self {
            Self::Google { .. } => ("google", "GOOGLE_CLIENT_ID"),
            Self::Microsoft { .. } => ("microsoft", "MICROSOFT_CLIENT_ID"),
        };
        format!(
            "{} integration is not configured. Please set {section}.client_id in calbridge.toml or {env} in your environment.",
            self.name()
        )
    }

    /// Start the connect flow for this provider.
    pub fn initiate(&self, flow: &OAuthFlow) -> Result<Url, OAuthError> {
        let Some(client_id) = self.client_id() else {
            return Err(OAuthError::NotConfigured(self.provider()));
        };
        let tenant = match self {
            Self::Microsoft { tenant, .. } => Some(tenant.clone()),
            Self::Google { .. } => None,
        };
        flow.begin(self.provider(), BeginParams {
            client_id: client_id.to_string(),
            redirect_uri: self.redirect_uri().to_string(),
            scopes: self.scopes(),
            tenant,
        })
    }
}
