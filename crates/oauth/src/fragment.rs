//! Parsing of implicit-grant responses carried in the URL fragment.

use {tracing::debug, url::Url};

use crate::types::CallbackParams;

/// Decode a fragment (`a=1&b=2`, optionally still prefixed with `#`).
///
/// Returns `None` when nothing usable is present. Pieces without `=` or with
/// an empty key are skipped; a later duplicate key wins. Only `%XX` escapes
/// are decoded, `+` stays literal.
#[must_use]
pub fn parse_fragment(fragment: &str) -> Option<CallbackParams> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    if fragment.is_empty() {
        return None;
    }

    let params: CallbackParams = fragment
        .split('&')
        .filter_map(|piece| {
            let Some((key, value)) = piece.split_once('=') else {
                debug!(piece, "skipping fragment piece without '='");
                return None;
            };
            if key.is_empty() {
                return None;
            }
            Some((decode(key), decode(value)))
        })
        .collect();

    (!params.is_empty()).then_some(params)
}

/// Parse the fragment of a full redirect URL as it appears in the browser.
#[must_use]
pub fn parse_redirect_url(redirect: &str) -> Option<CallbackParams> {
    match Url::parse(redirect) {
        Ok(url) => url.fragment().and_then(parse_fragment),
        Err(_) => redirect
            .split_once('#')
            .and_then(|(_, fragment)| parse_fragment(fragment)),
    }
}

/// Whether a space separated scope list granted by the provider contains `required`.
#[must_use]
pub fn has_scope(granted: &str, required: &str) -> bool {
    granted.split(' ').any(|scope| scope == required)
}

fn decode(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}
