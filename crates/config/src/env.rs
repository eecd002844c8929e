//! Environment variable overlay.

use crate::schema::CalbridgeConfig;

/// Variables read by [`apply_env_overrides`], with the setting they replace.
pub const ENV_VARS: &[(&str, &str)] = &[
    ("GOOGLE_CLIENT_ID", "google.client_id"),
    ("GOOGLE_REDIRECT_URI", "google.redirect_uri"),
    ("MICROSOFT_CLIENT_ID", "microsoft.client_id"),
    ("MICROSOFT_REDIRECT_URI", "microsoft.redirect_uri"),
    ("MICROSOFT_TENANT", "microsoft.tenant"),
    ("CALBRIDGE_TOKEN_ENDPOINT", "gateway.endpoint"),
    ("CALBRIDGE_USER_ID", "gateway.user_id"),
    ("CALBRIDGE_DATABASE_URL", "storage.database_url"),
];

/// Overlay values from `lookup` onto `config`. Empty values are ignored so an
/// exported-but-blank variable does not wipe a value from the file.
pub fn apply_env_overrides(config: &mut CalbridgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("GOOGLE_CLIENT_ID") {
        config.google.client_id = Some(v);
    }
    if let Some(v) = get("GOOGLE_REDIRECT_URI") {
        config.google.redirect_uri = Some(v);
    }
    if let Some(v) = get("MICROSOFT_CLIENT_ID") {
        config.microsoft.client_id = Some(v);
    }
    if let Some(v) = get("MICROSOFT_REDIRECT_URI") {
        config.microsoft.redirect_uri = Some(v);
    }
    if let Some(v) = get("MICROSOFT_TENANT") {
        config.microsoft.tenant = Some(v);
    }
    if let Some(v) = get("CALBRIDGE_TOKEN_ENDPOINT") {
        config.gateway.endpoint = Some(v);
    }
    if let Some(v) = get("CALBRIDGE_USER_ID") {
        config.gateway.user_id = Some(v);
    }
    if let Some(v) = get("CALBRIDGE_DATABASE_URL") {
        config.storage.database_url = Some(v);
    }
}

/// [`apply_env_overrides`] against the process environment.
pub fn apply_process_env(config: &mut CalbridgeConfig) {
    apply_env_overrides(config, |key| std::env::var(key).ok());
}
