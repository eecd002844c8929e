//! Redirect/callback coordination.
//!
//! [`OAuthFlow::begin`] records a pending flow and sends the browser to the
//! provider; [`OAuthFlow::complete`] reconciles the fragment the provider
//! redirects back with.

use std::{sync::Arc, time::Duration};

use {
    calbridge_common::CalendarProvider,
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{
    authorize::AuthorizationRequest,
    error::OAuthError,
    fragment::parse_fragment,
    navigator::Navigator,
    state::{generate_nonce, generate_state},
    storage::FlowStore,
    types::{CompletedFlow, PendingFlow, now_ms},
};

pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Provider-specific inputs for [`OAuthFlow::begin`].
#[derive(Debug, Clone)]
pub struct BeginParams {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub tenant: Option<String>,
}

pub struct OAuthFlow {
    store: Arc<dyn FlowStore>,
    navigator: Arc<dyn Navigator>,
    ttl: Duration,
}

impl OAuthFlow {
    pub fn new(store: Arc<dyn FlowStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            navigator,
            ttl: DEFAULT_STATE_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn FlowStore> {
        &self.store
    }

    /// Start a flow: store fresh state, build the provider URL and navigate to it.
    ///
    /// Returns the URL that was navigated to. Nothing is stored when the
    /// request cannot be built.
    pub fn begin(&self, provider: CalendarProvider, params: BeginParams) -> Result<Url, OAuthError> {
        if params.client_id.trim().is_empty() {
            return Err(OAuthError::NotConfigured(provider));
        }

        self.store.remove_expired(now_ms(), self.ttl)?;

        let state = generate_state()?;
        let nonce = match provider {
            CalendarProvider::Microsoft => Some(generate_nonce()?),
            CalendarProvider::Google => None,
        };

        let request = AuthorizationRequest {
            client_id: params.client_id,
            redirect_uri: params.redirect_uri,
            scopes: params.scopes,
            state: state.clone(),
            tenant: params.tenant,
            nonce: nonce.clone(),
        };
        let url = request.authorization_url(provider)?;

        self.store.put(PendingFlow {
            state,
            provider,
            nonce,
            created_at: now_ms(),
        })?;

        #[cfg(feature = "metrics")]
        calbridge_metrics::counter!(
            calbridge_metrics::oauth::FLOWS_STARTED_TOTAL,
            calbridge_metrics::labels::PROVIDER => provider.as_str()
        )
        .increment(1);

        info!(%provider, redirect_uri = %request.redirect_uri, "starting OAuth flow");
        self.navigator
            .navigate(&url)
            .map_err(|e| OAuthError::Navigation(e.to_string()))?;
        Ok(url)
    }

    /// Reconcile a redirect fragment with the pending flows.
    ///
    /// `Ok(None)` means the fragment carries no `state` at all (an ordinary
    /// page load). A state that matches no pending flow is a CSRF failure and
    /// leaves every stored flow in place; a match consumes the flow.
    pub fn complete(&self, fragment: &str) -> Result<Option<CompletedFlow>, OAuthError> {
        let Some(params) = parse_fragment(fragment) else {
            return Ok(None);
        };
        let Some(state) = params.state() else {
            debug!("fragment has no state parameter, nothing to complete");
            return Ok(None);
        };

        let Some(pending) = self.store.take(state)? else {
            warn!("OAuth state mismatch, possible CSRF attack");
            record_integrity_failure("state_mismatch");
            return Err(OAuthError::StateMismatch);
        };

        if pending.is_expired(now_ms(), self.ttl) {
            warn!(provider = %pending.provider, "OAuth callback arrived after the flow expired");
            record_integrity_failure("expired");
            return Err(OAuthError::FlowExpired);
        }

        info!(provider = %pending.provider, "OAuth state verified");
        Ok(Some(CompletedFlow {
            provider: pending.provider,
            nonce: pending.nonce,
            params,
        }))
    }

    /// [`complete`](Self::complete) for a full redirect URL.
    pub fn complete_redirect_url(&self, redirect: &str) -> Result<Option<CompletedFlow>, OAuthError> {
        let fragment = redirect
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .unwrap_or_default();
        self.complete(fragment)
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_integrity_failure(reason: &'static str) {
    #[cfg(feature = "metrics")]
    calbridge_metrics::counter!(
        calbridge_metrics::oauth::INTEGRITY_FAILURES_TOTAL,
        calbridge_metrics::labels::REASON => reason
    )
    .increment(1);
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::storage::MemoryFlowStore;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Url>>);

    impl Navigator for Recorder {
        fn navigate(&self, url: &Url) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    fn setup() -> (OAuthFlow, Arc<MemoryFlowStore>, Arc<Recorder>) {
        let store = Arc::new(MemoryFlowStore::new());
        let nav = Arc::new(Recorder::default());
        let flow = OAuthFlow::new(store.clone(), nav.clone());
        (flow, store, nav)
    }

    fn params(client_id: &str) -> BeginParams {
        BeginParams {
            client_id: client_id.into(),
            redirect_uri: "http://localhost:18791/oauth/google/callback".into(),
            scopes: vec!["a".into(), "b".into()],
            tenant: None,
        }
    }

    fn state_of(url: &Url) -> String {
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        query["state"].clone()
    }

    #[test]
    fn begin_stores_state_and_navigates() {
        let (flow, store, nav) = setup();
        let url = flow.begin(CalendarProvider::Google, params("cid")).unwrap();

        let navigated = nav.0.lock().unwrap().clone();
        assert_eq!(navigated, vec![url.clone()]);

        let pending = store.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].state, state_of(&url));
        assert_eq!(pending[0].provider, CalendarProvider::Google);
        assert!(pending[0].nonce.is_none());
    }

    #[test]
    fn begin_records_microsoft_nonce() {
        let (flow, store, _) = setup();
        let url = flow
            .begin(CalendarProvider::Microsoft, params("cid"))
            .unwrap();
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        let pending = store.pending().unwrap();
        assert_eq!(pending[0].nonce.as_deref(), Some(query["nonce"].as_str()));
    }

    #[test]
    fn begin_without_client_id_touches_nothing() {
        let (flow, store, nav) = setup();
        let err = flow.begin(CalendarProvider::Google, params("")).unwrap_err();
        assert!(matches!(err, OAuthError::NotConfigured(_)));
        assert!(store.pending().unwrap().is_empty());
        assert!(nav.0.lock().unwrap().is_empty());
    }

    #[test]
    fn complete_without_state_is_absent() {
        let (flow, store, _) = setup();
        flow.begin(CalendarProvider::Google, params("cid")).unwrap();

        assert!(flow.complete("").unwrap().is_none());
        assert!(flow.complete("foo=bar&baz=1").unwrap().is_none());
        // Nothing consumed.
        assert_eq!(store.pending().unwrap().len(), 1);
    }

    #[test]
    fn complete_with_matching_state_consumes_it() {
        let (flow, store, _) = setup();
        let url = flow.begin(CalendarProvider::Google, params("cid")).unwrap();
        let state = state_of(&url);

        let fragment = format!(
            "access_token=abc&token_type=Bearer&expires_in=3600&scope=x%20y&state={state}"
        );
        let completed = flow.complete(&fragment).unwrap().unwrap();
        assert_eq!(completed.provider, CalendarProvider::Google);
        assert_eq!(completed.params.access_token(), Some("abc"));
        assert_eq!(completed.params.token_type(), Some("Bearer"));
        assert_eq!(completed.params.expires_in(), Some("3600"));
        assert_eq!(completed.params.scope(), Some("x y"));
        assert_eq!(completed.params.state(), Some(state.as_str()));
        assert!(store.pending().unwrap().is_empty());

        // Replaying the same response fails.
        assert!(matches!(
            flow.complete(&fragment),
            Err(OAuthError::StateMismatch)
        ));
    }

    #[test]
    fn mismatch_leaves_other_flows_pending() {
        let (flow, store, _) = setup();
        let url = flow.begin(CalendarProvider::Google, params("cid")).unwrap();
        let stored = state_of(&url);

        let err = flow
            .complete("access_token=evil&state=forged")
            .unwrap_err();
        assert!(err.is_integrity());

        let pending = store.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].state, stored);
    }

    #[test]
    fn concurrent_flows_do_not_clobber_each_other() {
        let (flow, store, _) = setup();
        let google = state_of(&flow.begin(CalendarProvider::Google, params("g")).unwrap());
        let microsoft =
            state_of(&flow.begin(CalendarProvider::Microsoft, params("m")).unwrap());
        assert_eq!(store.pending().unwrap().len(), 2);

        let done = flow
            .complete(&format!("access_token=t&state={google}"))
            .unwrap()
            .unwrap();
        assert_eq!(done.provider, CalendarProvider::Google);

        let done = flow
            .complete(&format!("access_token=t&state={microsoft}"))
            .unwrap()
            .unwrap();
        assert_eq!(done.provider, CalendarProvider::Microsoft);
        assert!(done.nonce.is_some());
    }

    #[test]
    fn expired_flow_is_rejected_and_removed() {
        let (flow, store, _) = setup();
        store
            .put(PendingFlow {
                state: "old".into(),
                provider: CalendarProvider::Google,
                nonce: None,
                created_at: now_ms() - 700_000,
            })
            .unwrap();

        let err = flow.complete("access_token=t&state=old").unwrap_err();
        assert!(matches!(err, OAuthError::FlowExpired));
        assert!(store.pending().unwrap().is_empty());
    }

    #[test]
    fn begin_prunes_abandoned_flows() {
        let (flow, store, _) = setup();
        store
            .put(PendingFlow {
                state: "abandoned".into(),
                provider: CalendarProvider::Google,
                nonce: None,
                created_at: 0,
            })
            .unwrap();
        flow.begin(CalendarProvider::Google, params("cid")).unwrap();
        let states: Vec<_> = store.pending().unwrap().into_iter().map(|f| f.state).collect();
        assert!(!states.contains(&"abandoned".to_string()));
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn complete_redirect_url_reads_fragment() {
        let (flow, _, _) = setup();
        let url = flow.begin(CalendarProvider::Google, params("cid")).unwrap();
        let redirect = format!(
            "http://localhost:18791/oauth/google/callback#access_token=tok&state={}",
            state_of(&url)
        );
        let done = flow.complete_redirect_url(&redirect).unwrap().unwrap();
        assert_eq!(done.params.access_token(), Some("tok"));
        assert!(
            flow.complete_redirect_url("http://localhost:18791/")
                .unwrap()
                .is_none()
        );
    }
}
