//! Callback completion: verify, submit, then decide where the user goes next.

use std::{sync::Arc, time::Duration};

use {
    calbridge_common::{CalendarProvider, StoreTokenResponse, TokenSubmission},
    secrecy::SecretString,
    serde::Serialize,
    tracing::{error, info, warn},
    url::Url,
};

use crate::{
    error::OAuthError,
    flow::OAuthFlow,
    submit::TokenSubmitter,
    types::NavigationPlan,
};

pub const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_secs(1);
pub const FAILURE_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Lifetime used when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: &str = "3600";

const INTEGRITY_MESSAGE: &str =
    "Could not verify the sign-in response. Please try connecting your calendar again.";

/// What a callback page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    /// No OAuth response on this page load.
    Idle,
    /// Verifying and storing.
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// State mismatch or expired flow.
    Integrity,
    /// The provider put an `error` in the fragment.
    ProviderReported,
    /// No `error` but no `access_token` either.
    MalformedResponse,
    /// Storing the token failed; it may or may not have been persisted.
    Submission,
    /// The pending-flow store could not be read.
    Storage,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integrity => "integrity",
            Self::ProviderReported => "provider_reported",
            Self::MalformedResponse => "malformed_response",
            Self::Submission => "submission",
            Self::Storage => "storage",
        }
    }
}

#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    NoResponse,
    Succeeded {
        provider: CalendarProvider,
        response: StoreTokenResponse,
        navigate: NavigationPlan,
    },
    Failed {
        kind: FailureKind,
        message: String,
        navigate: NavigationPlan,
    },
}

impl CallbackOutcome {
    #[must_use]
    pub fn status(&self) -> CallbackStatus {
        match self {
            Self::NoResponse => CallbackStatus::Idle,
            Self::Succeeded { .. } => CallbackStatus::Success,
            Self::Failed { .. } => CallbackStatus::Error,
        }
    }

    #[must_use]
    pub fn navigation(&self) -> Option<&NavigationPlan> {
        match self {
            Self::NoResponse => None,
            Self::Succeeded { navigate, .. } | Self::Failed { navigate, .. } => Some(navigate),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// JSON-friendly summary for a callback page once the response is handled.
    #[must_use]
    pub fn report(&self) -> CallbackReport {
        let (message, provider) = match self {
            Self::NoResponse => (None, None),
            Self::Succeeded {
                provider, response, ..
            } => (Some(response.message.clone()), Some(provider.to_string())),
            Self::Failed { message, .. } => (Some(message.clone()), None),
        };
        let navigation = self.navigation();
        CallbackReport {
            status: self.status(),
            message,
            provider,
            redirect_to: navigation.map(|plan| plan.target.clone()),
            redirect_after_ms: navigation.map(|plan| plan.delay.as_millis() as u64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackReport {
    pub status: CallbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_after_ms: Option<u64>,
}

impl CallbackReport {
    /// What a callback page shows while its fragment is being verified.
    #[must_use]
    pub fn loading(provider: Option<CalendarProvider>) -> Self {
        Self {
            status: CallbackStatus::Loading,
            message: Some("Verifying the sign-in response...".to_string()),
            provider: provider.map(|p| p.to_string()),
            redirect_to: None,
            redirect_after_ms: None,
        }
    }
}

/// Runs once per callback page load: parse, verify, submit, navigate.
pub struct CallbackHandler {
    flow: Arc<OAuthFlow>,
    submitter: Arc<dyn TokenSubmitter>,
    landing_path: String,
    success_delay: Duration,
    failure_delay: Duration,
}

impl CallbackHandler {
    pub fn new(flow: Arc<OAuthFlow>, submitter: Arc<dyn TokenSubmitter>) -> Self {
        Self {
            flow,
            submitter,
            landing_path: "/calendar".into(),
            success_delay: SUCCESS_REDIRECT_DELAY,
            failure_delay: FAILURE_REDIRECT_DELAY,
        }
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    #[must_use]
    pub fn with_delays(mut self, success: Duration, failure: Duration) -> Self {
        self.success_delay = success;
        self.failure_delay = failure;
        self
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn flow(&self) -> &Arc<OAuthFlow> {
        &self.flow
    }

    pub async fn handle(&self, fragment: &str) -> CallbackOutcome {
        let outcome = self.run(fragment).await;
        record_outcome(&outcome);
        outcome
    }

    async fn run(&self, fragment: &str) -> CallbackOutcome {
        let completed = match self.flow.complete(fragment) {
            Ok(Some(completed)) => completed,
            Ok(None) => return CallbackOutcome::NoResponse,
            Err(e) if e.is_integrity() => {
                // Details stay in the log; the page only gets the generic text.
                warn!(error = %e, "discarding untrusted OAuth callback");
                return self.fail(FailureKind::Integrity, INTEGRITY_MESSAGE.to_string());
            },
            Err(e) => {
                error!(error = %e, "could not verify OAuth callback");
                return self.fail(
                    FailureKind::Storage,
                    format!("Failed to process OAuth callback: {e}"),
                );
            },
        };
        let params = &completed.params;

        if let Some(provider_error) = params.error() {
            let message = match params.error_description() {
                Some(description) => format!("{provider_error}: {description}"),
                None => provider_error.to_string(),
            };
            warn!(provider = %completed.provider, error = %message, "provider reported an OAuth error");
            return self.fail(FailureKind::ProviderReported, message);
        }

        let Some(access_token) = params.access_token() else {
            warn!(provider = %completed.provider, "OAuth response without access token");
            return self.fail(
                FailureKind::MalformedResponse,
                "Access token not found in OAuth response".to_string(),
            );
        };

        info!(
            provider = %completed.provider,
            token_type = params.token_type().unwrap_or_default(),
            expires_in = params.expires_in().unwrap_or_default(),
            scope = params.scope().unwrap_or_default(),
            "OAuth callback received"
        );

        let submission = TokenSubmission {
            provider: completed.provider.as_str().to_string(),
            access_token: SecretString::new(access_token.to_string()),
            scope: params.scope().unwrap_or_default().to_string(),
            expires_in: params.expires_in().unwrap_or(DEFAULT_EXPIRES_IN).to_string(),
        };

        match self.submitter.submit(&submission).await {
            Ok(response) => CallbackOutcome::Succeeded {
                provider: completed.provider,
                response,
                navigate: NavigationPlan {
                    target: self.landing_path.clone(),
                    delay: self.success_delay,
                },
            },
            Err(e) => {
                error!(provider = %completed.provider, error = %e, "failed to store calendar token");
                self.fail(
                    FailureKind::Submission,
                    format!("Failed to connect calendar: {e}. Please try again."),
                )
            },
        }
    }

    fn fail(&self, kind: FailureKind, message: String) -> CallbackOutcome {
        CallbackOutcome::Failed {
            kind,
            message,
            navigate: NavigationPlan {
                target: self.landing_path.clone(),
                delay: self.failure_delay,
            },
        }
    }

    /// Wait out the outcome's display delay, then navigate to its target
    /// resolved against `base`. No-op for [`CallbackOutcome::NoResponse`].
    pub async fn finish(&self, outcome: &CallbackOutcome, base: &Url) -> Result<(), OAuthError> {
        let Some(plan) = outcome.navigation() else {
            return Ok(());
        };
        tokio::time::sleep(plan.delay).await;
        let target = base.join(&plan.target)?;
        self.flow
            .navigator()
            .navigate(&target)
            .map_err(|e| OAuthError::Navigation(e.to_string()))
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_outcome(outcome: &CallbackOutcome) {
    #[cfg(feature = "metrics")]
    {
        let label = match outcome {
            CallbackOutcome::NoResponse => "no_response",
            CallbackOutcome::Succeeded { .. } => "success",
            CallbackOutcome::Failed { kind, .. } => kind.as_str(),
        };
        calbridge_metrics::counter!(
            calbridge_metrics::oauth::CALLBACKS_TOTAL,
            calbridge_metrics::labels::OUTCOME => label
        )
        .increment(1);
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {async_trait::async_trait, secrecy::ExposeSecret};

    use super::*;
    use crate::{
        navigator::Navigator,
        storage::{FlowStore, MemoryFlowStore},
        types::PendingFlow,
    };

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Url>>);

    impl Navigator for Recorder {
        fn navigate(&self, url: &Url) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    /// Records submissions; fails when `reject` is set.
    #[derive(Default)]
    struct StubSubmitter {
        calls: Mutex<Vec<(String, String, String, String)>>,
        reject: bool,
    }

    #[async_trait]
    impl TokenSubmitter for StubSubmitter {
        async fn submit(
            &self,
            submission: &TokenSubmission,
        ) -> Result<StoreTokenResponse, OAuthError> {
            self.calls.lock().unwrap().push((
                submission.provider.clone(),
                submission.access_token.expose_secret().clone(),
                submission.scope.clone(),
                submission.expires_in.clone(),
            ));
            if self.reject {
                return Err(OAuthError::Submission("database unavailable".into()));
            }
            Ok(StoreTokenResponse {
                success: true,
                message: format!("{} calendar connected successfully", submission.provider),
                provider: Some(submission.provider.clone()),
                connected_at: Some("2026-01-01T00:00:00.000Z".into()),
                error: None,
            })
        }
    }

    struct Harness {
        handler: CallbackHandler,
        store: Arc<MemoryFlowStore>,
        submitter: Arc<StubSubmitter>,
        nav: Arc<Recorder>,
    }

    fn harness(reject: bool) -> Harness {
        let store = Arc::new(MemoryFlowStore::new());
        let nav = Arc::new(Recorder::default());
        let submitter = Arc::new(StubSubmitter {
            reject,
            ..Default::default()
        });
        let flow = Arc::new(OAuthFlow::new(store.clone(), nav.clone()));
        let handler = CallbackHandler::new(flow, submitter.clone())
            .with_delays(Duration::from_millis(5), Duration::from_millis(10));
        Harness {
            handler,
            store,
            submitter,
            nav,
        }
    }

    fn pending(store: &MemoryFlowStore, state: &str, provider: CalendarProvider) {
        store
            .put(PendingFlow {
                state: state.into(),
                provider,
                nonce: None,
                created_at: crate::types::now_ms(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn no_fragment_is_idle() {
        let h = harness(false);
        let outcome = h.handler.handle("").await;
        assert!(matches!(outcome, CallbackOutcome::NoResponse));
        assert_eq!(outcome.status(), CallbackStatus::Idle);
        assert!(outcome.navigation().is_none());
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn matching_state_submits_and_schedules_landing() {
        let h = harness(false);
        pending(&h.store, "S", CalendarProvider::Microsoft);

        let outcome = h
            .handler
            .handle("access_token=tok&token_type=Bearer&expires_in=1800&scope=Calendars.Read&state=S")
            .await;

        assert_eq!(outcome.status(), CallbackStatus::Success);
        assert_eq!(
            outcome.navigation(),
            Some(&NavigationPlan {
                target: "/calendar".into(),
                delay: Duration::from_millis(5),
            })
        );
        let calls = h.submitter.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(
            "microsoft".to_string(),
            "tok".to_string(),
            "Calendars.Read".to_string(),
            "1800".to_string()
        )]);
    }

    #[tokio::test]
    async fn missing_scope_and_expiry_get_defaults() {
        let h = harness(false);
        pending(&h.store, "S", CalendarProvider::Google);

        h.handler.handle("access_token=tok&state=S").await;

        let calls = h.submitter.calls.lock().unwrap().clone();
        assert_eq!(calls[0].2, "");
        assert_eq!(calls[0].3, DEFAULT_EXPIRES_IN);
    }

    #[tokio::test]
    async fn csrf_mismatch_never_submits() {
        let h = harness(false);
        pending(&h.store, "T", CalendarProvider::Google);

        let outcome = h.handler.handle("access_token=tok&state=S").await;

        match &outcome {
            CallbackOutcome::Failed { kind, message, .. } => {
                assert_eq!(*kind, FailureKind::Integrity);
                assert!(!message.contains("CSRF"));
            },
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h.submitter.calls.lock().unwrap().is_empty());
        assert_eq!(h.store.pending().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_is_reported_verbatim() {
        let h = harness(false);
        pending(&h.store, "S", CalendarProvider::Google);

        let outcome = h
            .handler
            .handle("error=access_denied&error_description=User%20declined&state=S")
            .await;

        match outcome {
            CallbackOutcome::Failed { kind, message, .. } => {
                assert_eq!(kind, FailureKind::ProviderReported);
                assert_eq!(message, "access_denied: User declined");
            },
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h.submitter.calls.lock().unwrap().is_empty());
        // The state was still consumed.
        assert!(h.store.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_token_is_malformed() {
        let h = harness(false);
        pending(&h.store, "S", CalendarProvider::Google);

        let outcome = h.handler.handle("token_type=Bearer&state=S").await;
        assert!(matches!(
            outcome,
            CallbackOutcome::Failed {
                kind: FailureKind::MalformedResponse,
                ..
            }
        ));
        assert!(h.submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_still_navigates_after_longer_delay() {
        let h = harness(true);
        pending(&h.store, "S", CalendarProvider::Google);

        let outcome = h.handler.handle("access_token=tok&state=S").await;
        match &outcome {
            CallbackOutcome::Failed {
                kind,
                message,
                navigate,
            } => {
                assert_eq!(*kind, FailureKind::Submission);
                assert!(message.contains("Please try again"));
                assert_eq!(navigate.delay, Duration::from_millis(10));
            },
            other => panic!("unexpected outcome: {other:?}"),
        }
        // Single attempt.
        assert_eq!(h.submitter.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finish_navigates_to_landing_view() {
        let h = harness(false);
        pending(&h.store, "S", CalendarProvider::Google);
        let outcome = h.handler.handle("access_token=tok&state=S").await;

        let base = Url::parse("http://localhost:18791/oauth/google/callback").unwrap();
        h.handler.finish(&outcome, &base).await.unwrap();

        let navigated = h.nav.0.lock().unwrap().clone();
        assert_eq!(navigated.len(), 1);
        assert_eq!(navigated[0].as_str(), "http://localhost:18791/calendar");
    }

    #[tokio::test]
    async fn report_serializes_for_callback_page() {
        let h = harness(false);
        pending(&h.store, "S", CalendarProvider::Google);
        let outcome = h.handler.handle("access_token=tok&state=S").await;

        let json = serde_json::to_value(outcome.report()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["provider"], "google");
        assert_eq!(json["redirectTo"], "/calendar");
        assert_eq!(json["redirectAfterMs"], 5);

        let idle = serde_json::to_value(CallbackOutcome::NoResponse.report()).unwrap();
        assert_eq!(idle, serde_json::json!({"status": "idle"}));
    }

    #[test]
    fn loading_report_has_no_navigation() {
        let report = CallbackReport::loading(Some(CalendarProvider::Microsoft));
        assert_eq!(report.status, CallbackStatus::Loading);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "loading");
        assert_eq!(json["provider"], "microsoft");
        assert!(json.get("redirectTo").is_none());
    }
}
