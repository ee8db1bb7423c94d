use crate::{Context, Metrics, Settings, gateway::StorageConnector};
use chrono::{DateTime, Utc};
use kube::{
    client::Client as KubeClient,
    runtime::events::{Recorder, Reporter},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "bucket-operator".into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: KubeClient) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

/// State shared between the controller and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics
    metrics: Arc<Metrics>,
    /// Settings
    settings: Arc<Settings>,
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new(settings: Settings) -> State {
        State {
            settings: Arc::new(settings),
            diagnostics: Arc::new(RwLock::new(Diagnostics::default())),
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Settings getter
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Metrics getter
    pub fn metrics(&self) -> String {
        let mut buffer = String::new();
        let registry = &*self.metrics.registry;
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, registry) {
            tracing::error!("failed to encode metrics: {e}");
        }
        buffer
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub async fn to_context(
        &self,
        kube_client: KubeClient,
        connector: Arc<dyn StorageConnector>,
    ) -> Arc<Context> {
        Arc::new(Context {
            kube_client: kube_client.clone(),
            recorder: self.diagnostics.read().await.recorder(kube_client),
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
            settings: self.settings.clone(),
            connector,
        })
    }
}
