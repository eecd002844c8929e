//! CSRF state and nonce generation.

use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::{TryRngCore, rngs::OsRng},
};

use crate::error::OAuthError;

/// Random bytes behind each state value (256 bits).
pub const STATE_BYTES: usize = 32;

/// Generate an unguessable, URL-safe state value straight from the OS RNG.
///
/// Fails rather than falling back to a weaker source.
pub fn generate_state() -> Result<String, OAuthError> {
    let mut bytes = [0_u8; STATE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OAuthError::Randomness(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Nonce for providers that accept one. Same construction as the state, but
/// always an independent draw.
pub fn generate_nonce() -> Result<String, OAuthError> {
    generate_state()
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn state_is_url_safe_without_padding() {
        let state = generate_state().unwrap();
        assert_eq!(state.len(), 43);
        assert!(
            state
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn consecutive_states_never_repeat() {
        let mut seen = HashSet::with_capacity(10_000);
        let mut previous = generate_state().unwrap();
        for _ in 0..10_000 {
            let next = generate_state().unwrap();
            assert_ne!(next, previous);
            assert!(seen.insert(next.clone()), "duplicate state generated");
            previous = next;
        }
    }

    #[test]
    fn nonce_is_independent_of_state() {
        assert_ne!(generate_state().unwrap(), generate_nonce().unwrap());
    }
}
