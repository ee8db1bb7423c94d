//! Idempotent create/delete of buckets.
//!
//! Both strategies give the reconciler the same contract: creating a bucket that
//! exists and deleting one that does not are successes.
use crate::{
    Result,
    credentials::CredentialResolver,
    seaweedfs::{self, Backend, SeaweedFs},
    settings::{Storage, Strategy},
};
use async_trait::async_trait;
use tracing::*;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Ensure the bucket exists
    async fn create_bucket(&self, name: &str) -> Result<()>;
    /// Ensure the bucket does not exist
    async fn delete_bucket(&self, name: &str) -> Result<()>;
}

/// Calls the backend unconditionally and collapses already-exists / not-found
pub struct Idempotent<B> {
    backend: B,
}

impl<B: Backend> Idempotent<B> {
    pub fn new(backend: B) -> Self {
        Idempotent { backend }
    }
}

#[async_trait]
impl<B: Backend> ObjectStorage for Idempotent<B> {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        match self.backend.create_bucket(name).await {
            Err(seaweedfs::Error::AlreadyExists(_)) => {
                debug!("Bucket {name} already exists");
                Ok(())
            }
            res => Ok(res?),
        }
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        match self.backend.delete_bucket(name).await {
            Err(seaweedfs::Error::NotFound(_)) => {
                debug!("Bucket {name} already gone");
                Ok(())
            }
            res => Ok(res?),
        }
    }
}

/// Lists buckets first and only acts when the listing disagrees.
///
/// A concurrent create or delete between list and act still surfaces as
/// already-exists / not-found from the backend, which is tolerated the same way.
pub struct ExistenceChecked<B> {
    inner: Idempotent<B>,
}

impl<B: Backend> ExistenceChecked<B> {
    pub fn new(backend: B) -> Self {
        ExistenceChecked {
            inner: Idempotent::new(backend),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let buckets = self.inner.backend.list_buckets().await?;
        Ok(buckets.iter().any(|b| b == name))
    }
}

#[async_trait]
impl<B: Backend> ObjectStorage for ExistenceChecked<B> {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        if self.exists(name).await? {
            debug!("Bucket {name} listed, skipping create");
            return Ok(());
        }
        self.inner.create_bucket(name).await
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            debug!("Bucket {name} not listed, skipping delete");
            return Ok(());
        }
        self.inner.delete_bucket(name).await
    }
}

/// Wrap a backend in the configured strategy
pub fn with_strategy<B: Backend + 'static>(
    strategy: Strategy,
    backend: B,
) -> Box<dyn ObjectStorage> {
    match strategy {
        Strategy::Idempotent => Box::new(Idempotent::new(backend)),
        Strategy::ExistenceChecked => Box::new(ExistenceChecked::new(backend)),
    }
}

/// Builds a ready-to-use gateway, resolving credentials on every call
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ObjectStorage>>;
}

/// Connects to SeaweedFS with the admin credentials from its secret.
///
/// No client is cached between calls, so rotated credentials are picked up
/// by the next reconcile.
#[derive(Clone)]
pub struct SeaweedFsConnector {
    resolver: CredentialResolver,
    settings: Storage,
}

impl SeaweedFsConnector {
    pub fn new(resolver: CredentialResolver, settings: Storage) -> Self {
        SeaweedFsConnector { resolver, settings }
    }
}

#[async_trait]
impl StorageConnector for SeaweedFsConnector {
    async fn connect(&self) -> Result<Box<dyn ObjectStorage>> {
        let credentials = self.resolver.resolve().await?;
        let backend = SeaweedFs::new(&self.settings, &credentials)?;
        Ok(with_strategy(self.settings.strategy, backend))
    }
}
