use crate::{credentials::Credentials, settings};
use async_trait::async_trait;
use s3::{Bucket, bucket_ops::BucketConfiguration, creds, error::S3Error, region::Region};
use thiserror::Error;
use tracing::*;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Request: {0}")]
    Request(#[source] S3Error),

    #[error("BadStatusCode: {status} for bucket {bucket}: {body}")]
    BadStatusCode {
        bucket: String,
        status: u16,
        body: String,
    },

    #[error("bucket {0} already exists")]
    AlreadyExists(String),

    #[error("bucket {0} not found")]
    NotFound(String),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Raw bucket operations against an S3 compatible backend.
///
/// Errors are classified but never swallowed, collapsing them into success is
/// up to the gateway.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_bucket(&self, name: &str) -> Result<()>;
    async fn delete_bucket(&self, name: &str) -> Result<()>;
    async fn list_buckets(&self) -> Result<Vec<String>>;
}

/// Path-style S3 client for the in-cluster SeaweedFS gateway
#[derive(Clone)]
pub struct SeaweedFs {
    region: Region,
    credentials: creds::Credentials,
}

impl SeaweedFs {
    pub fn new(settings: &settings::Storage, credentials: &Credentials) -> Result<SeaweedFs> {
        let credentials = creds::Credentials::new(
            Some(&credentials.access_key),
            Some(&credentials.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Request(S3Error::from(e)))?;

        Ok(SeaweedFs {
            region: Region::Custom {
                region: settings.region.clone(),
                endpoint: settings.endpoint.clone(),
            },
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(Error::Request)?;
        Ok(bucket.with_path_style())
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn classify(name: &str, status: u16, body: String) -> Error {
    match status {
        404 => Error::NotFound(name.to_string()),
        _ => Error::BadStatusCode {
            bucket: name.to_string(),
            status,
            body,
        },
    }
}

#[async_trait]
impl Backend for SeaweedFs {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        let response = Bucket::create_with_path_style(
            name,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        let (status, body) = match response {
            Ok(res) => (res.response_code, res.response_text),
            Err(S3Error::HttpFailWithBody(status, body)) => (status, body),
            Err(err) => return Err(Error::Request(err)),
        };

        match status {
            s if is_success(s) => {
                info!("Created bucket {name}");
                Ok(())
            }
            // BucketAlreadyOwnedByYou or BucketAlreadyExists
            409 => Err(Error::AlreadyExists(name.to_string())),
            s => Err(classify(name, s, body)),
        }
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let (status, body) = match self.bucket(name)?.delete().await {
            Ok(status) if is_success(status) => {
                info!("Deleted bucket {name}");
                return Ok(());
            }
            Ok(status) => (status, String::new()),
            Err(S3Error::HttpFailWithBody(status, body)) => (status, body),
            Err(err) => return Err(Error::Request(err)),
        };

        // 409 here is BucketNotEmpty, a real failure
        Err(classify(name, status, body))
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone())
            .await
            .map_err(Error::Request)?;
        Ok(response.bucket_names().collect())
    }
}
