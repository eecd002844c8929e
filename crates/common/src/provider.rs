use std::fmt;

use serde::{Deserialize, Serialize};

/// External calendar identity system a user can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProvider {
    Google,
    Microsoft,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown calendar provider: {0}")]
pub struct UnknownProvider(pub String);

impl CalendarProvider {
    pub const ALL: [Self; 2] = [Self::Google, Self::Microsoft];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for CalendarProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CalendarProvider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "google" => Ok(Self::Google),
            "microsoft" => Ok(Self::Microsoft),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!(
            "google".parse::<CalendarProvider>().unwrap(),
            CalendarProvider::Google
        );
        assert_eq!(
            "microsoft".parse::<CalendarProvider>().unwrap(),
            CalendarProvider::Microsoft
        );
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = "yahoo".parse::<CalendarProvider>().unwrap_err();
        assert_eq!(err.to_string(), "unknown calendar provider: yahoo");
        // Matching is exact, no case folding.
        assert!("Google".parse::<CalendarProvider>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&CalendarProvider::Microsoft).unwrap();
        assert_eq!(json, "\"microsoft\"");
    }
}
