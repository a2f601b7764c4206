//! Shared reconciler state, split into `State` (cloneable, owned by the
//! HTTP server), `Context` (the read-only view handed to each reconcile
//! call), and `Diagnostics` (the bit of state the web server reads back
//! out).

use crate::fetch::cache::FetchCache;
use crate::util::metrics::Metrics;
use chrono::{DateTime, Utc};
use kube::runtime::events::Reporter;
use kube::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const FIELD_MANAGER: &str = "capi-provider-operator";

#[derive(Clone, Default)]
pub struct State {
    diagnostics: Arc<RwLock<Diagnostics>>,
    registry: prometheus::Registry,
    fetch_cache: Arc<FetchCache>,
}

impl State {
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    pub fn to_context(&self, client: Client) -> Arc<Context> {
        Arc::new(Context {
            client,
            metrics: Metrics::default().register(&self.registry).expect("metrics registration"),
            diagnostics: self.diagnostics.clone(),
            fetch_cache: self.fetch_cache.clone(),
        })
    }
}

pub struct Context {
    pub client: Client,
    pub metrics: Metrics,
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    pub fetch_cache: Arc<FetchCache>,
}

#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self { last_event: Utc::now(), reporter: "capi-provider-operator".into() }
    }
}

impl Diagnostics {
    pub fn recorder(&self, client: Client) -> kube::runtime::events::Recorder {
        kube::runtime::events::Recorder::new(client, self.reporter.clone())
    }
}
