//! Metric name and label definitions.
//!
//! Every metric calbridge records is named here so the gateway and the CLI
//! agree on spelling.

/// HTTP request metrics (gateway)
pub mod http {
    /// Total number of HTTP requests handled
    pub const REQUESTS_TOTAL: &str = "calbridge_http_requests_total";
    /// Duration of HTTP requests in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "calbridge_http_request_duration_seconds";
}

/// OAuth connection flow metrics (client side)
pub mod oauth {
    /// Flows started, labelled by provider
    pub const FLOWS_STARTED_TOTAL: &str = "calbridge_oauth_flows_started_total";
    /// Callbacks handled, labelled by outcome
    pub const CALLBACKS_TOTAL: &str = "calbridge_oauth_callbacks_total";
    /// State mismatches and expired flows
    pub const INTEGRITY_FAILURES_TOTAL: &str = "calbridge_oauth_integrity_failures_total";
    /// Token submissions sent to the storage endpoint
    pub const TOKEN_SUBMISSIONS_TOTAL: &str = "calbridge_oauth_token_submissions_total";
}

/// Token store metrics (gateway)
pub mod tokens {
    /// Tokens written, labelled by provider
    pub const STORED_TOTAL: &str = "calbridge_tokens_stored_total";
    /// Store requests rejected before reaching the database
    pub const REJECTED_TOTAL: &str = "calbridge_tokens_rejected_total";
    /// Calendars disconnected
    pub const DELETED_TOTAL: &str = "calbridge_tokens_deleted_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const PROVIDER: &str = "provider";
    pub const OUTCOME: &str = "outcome";
    pub const REASON: &str = "reason";
    pub const SUCCESS: &str = "success";
}

/// Standard histogram buckets
pub mod buckets {
    /// HTTP request duration buckets (in seconds), 1ms to 30s
    pub const HTTP_DURATION: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
    ];
}
