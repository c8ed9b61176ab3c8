use kumawise_engine::TaskPublisher;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::config::AllowList;

pub struct AppState {
    pub publisher: Arc<dyn TaskPublisher>,
    // None when no recorder was installed, e.g. in tests
    pub prometheus: Option<PrometheusHandle>,
    pub webhook_token: Option<String>,
    pub allow_list: AllowList,
}
