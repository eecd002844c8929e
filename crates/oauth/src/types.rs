use std::{collections::BTreeMap, fmt, time::Duration};

use {
    calbridge_common::CalendarProvider,
    serde::{Deserialize, Serialize},
};

/// A flow that has redirected away and is waiting for its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFlow {
    pub state: String,
    pub provider: CalendarProvider,
    /// Sent to Microsoft only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Unix timestamp in milliseconds.
    pub created_at: u64,
}

impl PendingFlow {
    #[must_use]
    pub fn is_expired(&self, now_ms: u64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.created_at) > ttl.as_millis() as u64
    }
}

/// Key/value pairs recovered from a redirect fragment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallbackParams(BTreeMap<String, String>);

impl CallbackParams {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.get("state")
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.get("access_token").filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn token_type(&self) -> Option<&str> {
        self.get("token_type")
    }

    #[must_use]
    pub fn expires_in(&self) -> Option<&str> {
        self.get("expires_in").filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.get("scope")
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.get("error")
    }

    #[must_use]
    pub fn error_description(&self) -> Option<&str> {
        self.get("error_description")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for CallbackParams {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for CallbackParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// Tokens must not end up in logs.
impl fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if matches!(key.as_str(), "access_token" | "id_token" | "code") {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// A callback whose state matched a pending flow.
#[derive(Debug, Clone)]
pub struct CompletedFlow {
    pub provider: CalendarProvider,
    pub nonce: Option<String>,
    pub params: CallbackParams,
}

/// Where to send the user once a callback has been handled, and after how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPlan {
    pub target: String,
    pub delay: Duration,
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
