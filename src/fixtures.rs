//! Helper methods only available for tests
use crate::{
    Context, FINALIZER, Settings, State,
    gateway::StorageConnector,
    resources::objectstorage::bucket::{Bucket, BucketSpec},
};
use assert_json_diff::assert_json_include;
use http::{Request, Response};
use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::Time};
use kube::{Client, Resource, ResourceExt, client::Body};
use serde_json::json;
use std::sync::Arc;

impl Bucket {
    /// A normal test bucket
    pub fn test(name: &str) -> Self {
        let mut b = Bucket::new(name, BucketSpec::default());
        b.meta_mut().resource_version = Some("1".into());
        b
    }

    /// Modify bucket to be set to deleted
    pub fn needs_delete(mut self) -> Self {
        let now: Time = serde_json::from_value(json!("2026-10-18T12:00:00Z")).unwrap();
        self.meta_mut().deletion_timestamp = Some(now);
        self
    }

    /// Modify bucket to carry our finalizer
    pub fn finalized(mut self) -> Self {
        self.finalizers_mut().push(FINALIZER.to_string());
        self
    }
}

/// Controller context on top of a mock client, passes give up after one second
pub async fn context(client: Client, connector: Arc<dyn StorageConnector>) -> Arc<Context> {
    let mut settings = Settings::default();
    settings.reconcile.timeout_seconds = 1;
    State::new(settings).to_context(client, connector).await
}

/// Any kube error, for paths that only care about the class of failure
pub fn kube_error() -> kube::Error {
    kube::Error::SerdeError(serde_json::from_str::<u8>("not a number").unwrap_err())
}

// We wrap tower_test::mock::Handle
type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;
pub struct ApiServerVerifier(ApiServerHandle);

/// Scenarios we test for in ApiServerVerifier
pub enum Scenario {
    /// GET of the admin secret succeeds
    SecretFound(Secret),
    /// GET of the admin secret returns 404
    SecretMissing,
    /// GET of a bucket returns 404
    BucketMissing(String),
    /// PUT of a bucket succeeds
    BucketPersisted(Bucket),
    /// PUT of a bucket fails with a stale resourceVersion
    BucketConflict(Bucket),
    /// GET of a bucket succeeds and nothing else is expected
    BucketFound(Bucket),
    /// GET of a bucket succeeds, then one event about it is posted
    EventPublished {
        bucket: Bucket,
        type_: &'static str,
        reason: &'static str,
        code: u16,
    },
}

pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}

fn status(code: u16, reason: &str, message: &str) -> Response<Body> {
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code,
    });
    Response::builder()
        .status(code)
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

impl ApiServerVerifier {
    pub fn new() -> (Client, ApiServerVerifier) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let client = Client::new(mock_service, "default");
        (client, ApiServerVerifier(handle))
    }

    /// Tests only get to run specific scenarios that has matching handlers
    ///
    /// NB: If the controller is making more calls than we are handling in the scenario,
    /// you then typically see a `KubeError(Service(Closed(())))` from the reconciler.
    pub fn run(self, scenario: Scenario) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match scenario {
                Scenario::SecretFound(secret) => self.handle_secret_get(Some(secret)).await,
                Scenario::SecretMissing => self.handle_secret_get(None).await,
                Scenario::BucketMissing(name) => self.handle_bucket_get_missing(&name).await,
                Scenario::BucketPersisted(bucket) => self.handle_bucket_replace(bucket, 200).await,
                Scenario::BucketConflict(bucket) => self.handle_bucket_replace(bucket, 409).await,
                Scenario::BucketFound(bucket) => self.handle_bucket_get(bucket).await,
                Scenario::EventPublished {
                    bucket,
                    type_,
                    reason,
                    code,
                } => {
                    let name = bucket.name_any();
                    self.handle_bucket_get(bucket)
                        .await
                        .unwrap()
                        .handle_event_create(&name, type_, reason, code)
                        .await
                }
            }
            .expect("scenario completed without errors");
        })
    }

    async fn handle_secret_get(mut self, secret: Option<Secret>) -> Result<Self, String> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(
            request.uri().path(),
            "/api/v1/namespaces/seaweedfs-system/secrets/seaweedfs-s3-secret"
        );
        let response = match secret {
            Some(mut secret) => {
                secret.metadata.name = Some("seaweedfs-s3-secret".into());
                secret.metadata.namespace = Some("seaweedfs-system".into());
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&secret).unwrap()))
                    .unwrap()
            }
            None => status(404, "NotFound", "secrets \"seaweedfs-s3-secret\" not found"),
        };
        send.send_response(response);
        Ok(self)
    }

    async fn handle_bucket_get_missing(mut self, name: &str) -> Result<Self, String> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(
            request.uri().path(),
            format!("/apis/objectstorage.mystorage.sh/v1alpha1/buckets/{name}")
        );
        send.send_response(status(404, "NotFound", "bucket not found"));
        Ok(self)
    }

    async fn handle_bucket_replace(mut self, bucket: Bucket, code: u16) -> Result<Self, String> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::PUT);
        assert_eq!(
            request.uri().path(),
            format!(
                "/apis/objectstorage.mystorage.sh/v1alpha1/buckets/{}",
                bucket.name_any()
            )
        );
        let req_body = request.into_body().collect_bytes().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&req_body).expect("valid bucket");
        assert_json_include!(
            actual: json,
            expected: json!({
                "metadata": {
                    "name": bucket.name_any(),
                    "resourceVersion": "1",
                    "finalizers": bucket.finalizers(),
                }
            })
        );

        let response = if code == 409 {
            status(
                409,
                "Conflict",
                "the object has been modified; please apply your changes to the latest version and try again",
            )
        } else {
            let mut stored = bucket;
            stored.meta_mut().resource_version = Some("2".into());
            Response::builder()
                .body(Body::from(serde_json::to_vec(&stored).unwrap()))
                .unwrap()
        };
        send.send_response(response);
        Ok(self)
    }

    async fn handle_bucket_get(mut self, bucket: Bucket) -> Result<Self, String> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(
            request.uri().path(),
            format!(
                "/apis/objectstorage.mystorage.sh/v1alpha1/buckets/{}",
                bucket.name_any()
            )
        );
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&bucket).unwrap()))
                .unwrap(),
        );
        Ok(self)
    }

    async fn handle_event_create(
        mut self,
        name: &str,
        type_: &str,
        reason: &str,
        code: u16,
    ) -> Result<Self, String> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::POST);
        let path = request.uri().path().to_string();
        assert!(
            path.starts_with("/apis/events.k8s.io/v1/") && path.ends_with("/events"),
            "unexpected event path {path}"
        );
        let req_body = request.into_body().collect_bytes().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&req_body).expect("valid event");
        assert_json_include!(
            actual: json,
            expected: json!({
                "type": type_,
                "reason": reason,
                "regarding": {
                    "kind": "Bucket",
                    "name": name,
                }
            })
        );

        let response = if code == 403 {
            status(403, "Forbidden", "events.events.k8s.io is forbidden")
        } else {
            Response::builder()
                .status(code)
                .body(Body::from(req_body.to_vec()))
                .unwrap()
        };
        send.send_response(response);
        Ok(self)
    }
}
