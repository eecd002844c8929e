pub mod authorize;
pub mod callback;
pub mod callback_server;
pub mod defaults;
pub mod error;
pub mod flow;
pub mod fragment;
pub mod navigator;
pub mod providers;
pub mod state;
pub mod storage;
pub mod submit;
pub mod types;

pub use {
    authorize::AuthorizationRequest,
    callback::{CallbackHandler, CallbackOutcome, CallbackReport, CallbackStatus, FailureKind},
    callback_server::CallbackServer,
    error::OAuthError,
    flow::{BeginParams, OAuthFlow},
    fragment::{has_scope, parse_fragment, parse_redirect_url},
    navigator::{BrowserNavigator, Navigator, PrintNavigator},
    providers::ProviderHandler,
    state::generate_state,
    storage::{FileFlowStore, FlowStore, MemoryFlowStore},
    submit::{TokenApiClient, TokenSubmitter},
    types::{CallbackParams, CompletedFlow, NavigationPlan, PendingFlow},
};
