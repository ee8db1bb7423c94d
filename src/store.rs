use crate::{Error, Result, resources::objectstorage::bucket::Bucket};
use async_trait::async_trait;
use kube::api::{Api, PostParams, ResourceExt};

#[cfg(test)]
use mockall::automock;

/// Read and write access to Bucket resources.
///
/// `persist` must be a compare-and-set on `metadata.resourceVersion` and report
/// a stale copy as [`Error::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetch the current state, `None` if the object is gone
    async fn fetch(&self, name: &str) -> Result<Option<Bucket>>;
    /// Replace the stored object with `bucket`
    async fn persist(&self, bucket: &Bucket) -> Result<Bucket>;
}

#[async_trait]
impl BucketStore for Api<Bucket> {
    async fn fetch(&self, name: &str) -> Result<Option<Bucket>> {
        self.get_opt(name).await.map_err(Error::KubeError)
    }

    async fn persist(&self, bucket: &Bucket) -> Result<Bucket> {
        self.replace(&bucket.name_any(), &PostParams::default(), bucket)
            .await
            .map_err(|e| {
                if matches!(&e, kube::Error::Api(ae) if ae.code == 409) {
                    Error::Conflict(e)
                } else {
                    Error::KubeError(e)
                }
            })
    }
}
