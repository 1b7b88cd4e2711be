use crate::clock::Clock;
use crate::config::Config;
use crate::metrics::ReconcileCounters;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ControllerContext {
    pub(crate) kube_client: kube::Client,
    pub(crate) config: Arc<Config>,
    pub(crate) http_client: reqwest::Client,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) counters: Arc<ReconcileCounters>,
    /// Set once the first controller pass finished
    pub(crate) ready: Arc<AtomicBool>,
    pub(crate) shutdown: CancellationToken,
}

/// State shared with the web server.
#[derive(Clone)]
pub struct AppState {
    pub(crate) registry: prometheus::Registry,
    pub(crate) ready: Arc<AtomicBool>,
}
