//! # Application State
//!
//! Shared state handed to every route handler through `State`. The care
//! runtime owns all lifecycle data; cloning the state clones handles, not
//! data.

use std::sync::Arc;

use hearth_care::adapters::InMemoryChildDirectory;
use hearth_care::{CareConfig, CareRuntime, Clock, PolicyError, SystemClock};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub runtime: CareRuntime,
    /// Stand-in child registry backing the runtime's directory port.
    pub children: Arc<InMemoryChildDirectory>,
    pub config: Arc<AppConfig>,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("runtime", &self.runtime)
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: AppConfig, care: &CareConfig) -> Result<Self, PolicyError> {
        Self::with_clock(config, care, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AppConfig,
        care: &CareConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        let children = Arc::new(InMemoryChildDirectory::new());
        let runtime = CareRuntime::builder()
            .policy(care.policy.clone())
            .clock(clock)
            .children(children.clone())
            .build()?;
        Ok(Self {
            runtime,
            children,
            config: Arc::new(config),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
