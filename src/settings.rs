use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// How the gateway decides whether a backend call is needed
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Always call the backend and treat already-exists / not-found as success
    #[default]
    Idempotent,
    /// List buckets first and only call the backend when the listing disagrees
    ExistenceChecked,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
    pub endpoint: String,
    pub region: String,
    pub strategy: Strategy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub namespace: String,
    pub secret: String,
    pub config_key: String,
    pub admin_identity: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Reconcile {
    pub timeout_seconds: u64,
    pub transient_backoff_seconds: u64,
    pub conflict_backoff_seconds: u64,
    pub configuration_backoff_seconds: u64,
}

impl Reconcile {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub storage: Storage,
    pub credentials: Credentials,
    pub reconcile: Reconcile,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("settings").required(false))
            .add_source(File::with_name("/etc/bucket-operator/settings").required(false))
            .add_source(
                Environment::with_prefix("BUCKETOPERATOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default(
                "storage.endpoint",
                "http://seaweedfs-s3.seaweedfs-system.svc.cluster.local:8333",
            )?
            // Not geographically meaningful, SeaweedFS accepts any region
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.strategy", "idempotent")?
            .set_default("credentials.namespace", "seaweedfs-system")?
            .set_default("credentials.secret", "seaweedfs-s3-secret")?
            .set_default("credentials.config_key", "seaweedfs_s3_config")?
            .set_default("credentials.admin_identity", "anvAdmin")?
            .set_default("reconcile.timeout_seconds", 30)?
            .set_default("reconcile.transient_backoff_seconds", 30)?
            .set_default("reconcile.conflict_backoff_seconds", 1)?
            .set_default("reconcile.configuration_backoff_seconds", 5 * 60)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn reconcile(&self) -> &Reconcile {
        &self.reconcile
    }
}

#[cfg(test)]
impl Default for Settings {
    fn default() -> Self {
        Self::builder()
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("default settings deserialize")
    }
}
