use crate::application::AnalyticsService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub analytics_service: Arc<AnalyticsService>,
    /// Renders `/metrics`; `None` when no recorder was installed (tests).
    pub metrics_handle: Option<PrometheusHandle>,
}
