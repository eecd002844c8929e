use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root of `calbridge.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalbridgeConfig {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub microsoft: MicrosoftConfig,
    pub oauth: FlowConfig,
    pub gateway: GatewayClientConfig,
    pub storage: StorageConfig,
}

/// Where the token-storage gateway listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 18790,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrosoftConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// `common`, `organizations`, `consumers`, or a tenant id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// Client-side flow behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Origin used to derive `/oauth/{provider}/callback` when a provider has
    /// no explicit redirect URI.
    pub redirect_base_url: String,
    /// Pending flows older than this are rejected at verification time.
    pub state_ttl_secs: u64,
    /// How long `connect` waits for the browser to come back.
    pub callback_timeout_secs: u64,
    /// View to navigate to once a callback has been handled.
    pub landing_path: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            redirect_base_url: "http://localhost:18791".into(),
            state_ttl_secs: 600,
            callback_timeout_secs: 300,
            landing_path: "/calendar".into(),
        }
    }
}

/// How the client reaches the token-storage endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayClientConfig {
    /// Full URL of the token endpoint. Derived from `[server]` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Header carrying the platform-injected user identity.
    pub identity_header: String,
    /// Identity the CLI presents when talking to a local gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Default for GatewayClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            identity_header: "x-calbridge-user-id".into(),
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// sqlx connection string; defaults to `sqlite://<data_dir>/calbridge.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl CalbridgeConfig {
    /// Token endpoint URL the client submits to.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.gateway.endpoint.clone().unwrap_or_else(|| {
            format!(
                "http://{}:{}/api/calendar/tokens",
                self.server.bind, self.server.port
            )
        })
    }

    /// Directory for the pending-flow file and the default database.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .or_else(crate::loader::data_dir)
            .unwrap_or_else(|| PathBuf::from(".calbridge"))
    }

    #[must_use]
    pub fn database_url(&self) -> String {
        self.storage.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                self.resolved_data_dir().join("calbridge.db").display()
            )
        })
    }
}
