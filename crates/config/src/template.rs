/// Commented starter config written by `calbridge config init`.
#[must_use]
pub fn default_config_template(port: u16) -> String {
    format!(
        r#"# calbridge configuration
#
# Every provider value can also come from the environment (or a .env file):
# GOOGLE_CLIENT_ID, GOOGLE_REDIRECT_URI, MICROSOFT_CLIENT_ID,
# MICROSOFT_REDIRECT_URI, MICROSOFT_TENANT.

[server]
bind = "127.0.0.1"
port = {port}

[google]
# client_id = "1234567890-abc.apps.googleusercontent.com"
# redirect_uri = "http://localhost:18791/oauth/google/callback"

[microsoft]
# client_id = "00000000-0000-0000-0000-000000000000"
# redirect_uri = "http://localhost:18791/oauth/microsoft/callback"
# tenant = "common"

[oauth]
redirect_base_url = "http://localhost:18791"
state_ttl_secs = 600
callback_timeout_secs = 300
landing_path = "/calendar"

[gateway]
identity_header = "x-calbridge-user-id"
# endpoint = "http://127.0.0.1:{port}/api/calendar/tokens"
# user_id = "me"

[storage]
# data_dir = "/var/lib/calbridge"
# database_url = "sqlite:///var/lib/calbridge/calbridge.db?mode=rwc"
"#
    )
}
