//! Global recorder installation.

use tracing::info;

/// Options for [`init_metrics`].
#[derive(Debug, Clone)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
    /// Static labels added to every metric (e.g. `instance`).
    pub global_labels: Vec<(String, String)>,
}

impl Default for MetricsRecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_labels: Vec::new(),
        }
    }
}

/// Handle to the installed recorder, used to render the scrape output.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    inner: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.inner.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        if let Some(handle) = &self.inner {
            return handle.render();
        }
        String::new()
    }
}

/// Install the global metrics recorder.
///
/// Without the `prometheus` feature (or with `enabled = false`) the `metrics`
/// macros stay no-ops and the returned handle renders nothing.
pub fn init_metrics(config: MetricsRecorderConfig) -> anyhow::Result<MetricsHandle> {
    if !config.enabled {
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

        let mut builder = PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            crate::buckets::HTTP_DURATION,
        )?;
        for (key, value) in config.global_labels {
            builder = builder.add_global_label(key, value);
        }
        let handle = builder.install_recorder()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            inner: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics enabled without an exporter, recording is a no-op");
        Ok(MetricsHandle::default())
    }
}
