use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Conflict: {0}")]
    // Stale resourceVersion on persist, the next pass starts from a fresh fetch
    Conflict(#[source] kube::Error),

    #[error("CRDS are not installed in cluster")]
    MissingCrds,

    #[error("CredentialsError: {0}")]
    CredentialsError(#[from] crate::credentials::Error),

    #[error("StorageError: {0}")]
    StorageError(#[from] crate::seaweedfs::Error),

    #[error("Reconcile timed out after {0:?}")]
    Timeout(std::time::Duration),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How the controller should back off from a failed reconcile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network or API failure, retried with the regular backoff
    Transient,
    /// Missing or malformed credentials, retried slowly and surfaced as an event
    Configuration,
    /// Optimistic concurrency failure, retried quickly from a fresh fetch
    Conflict,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Conflict(_) => ErrorClass::Conflict,
            Error::MissingCrds => ErrorClass::Configuration,
            Error::CredentialsError(e) if e.is_configuration() => ErrorClass::Configuration,
            _ => ErrorClass::Transient,
        }
    }

    pub fn metric_label(&self) -> String {
        match self {
            Error::KubeError(_) => "kubeerror",
            Error::Conflict(_) => "conflict",
            Error::MissingCrds => "missingcrds",
            Error::CredentialsError(_) => "credentialserror",
            Error::StorageError(_) => "storageerror",
            Error::Timeout(_) => "timeout",
        }
        .to_string()
    }
}

/// Expose all controller components used by main
pub mod controller;
pub use crate::controller::*;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;

/// Resources
pub mod resources;

/// Settings
mod settings;
pub use settings::Settings;

/// State
mod state;
pub use state::*;

/// Context
mod context;
pub use context::*;

/// Administrative credentials for the object storage backend
pub mod credentials;

/// Finalizer token bookkeeping
pub mod finalizer;

/// SeaweedFS S3 client
pub mod seaweedfs;

/// Idempotent bucket gateway
pub mod gateway;

/// Bucket resource persistence
pub mod store;

#[cfg(test)]
mod fixtures;
