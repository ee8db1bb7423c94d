use crate::{
    Context, Error, ErrorClass, FINALIZER, Result, finalizer,
    gateway::StorageConnector,
    store::BucketStore,
    telemetry,
};
use chrono::Utc;
use futures::StreamExt;
use kube::{
    api::{Api, ListParams, ResourceExt},
    client::Client as KubeClient,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType},
        reflector::ObjectRef,
        watcher::Config,
    },
    CustomResource, Resource,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

/// Bucket on the object storage backend.
///
/// The resource name is the bucket name, which is why the resource is cluster
/// scoped: bucket names are global on the backend.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "Bucket",
    group = "objectstorage.mystorage.sh",
    version = "v1alpha1",
    shortname = "bkt",
    status = "BucketStatus"
)]
pub struct BucketSpec {}

/// Reserved, the controller does not write it
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct BucketStatus {}

/// Result of a successful reconcile pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The resource no longer exists, nothing to do
    Absent,
    /// Finalizer present and the bucket exists
    Converged,
    /// Bucket removed and the finalizer released
    Deleted,
}

impl Outcome {
    pub fn action(self) -> Action {
        // Level triggered: any change to the resource wakes us up again
        Action::await_change()
    }
}

/// One reconcile pass for the bucket called `name`.
///
/// Always starts from a fresh fetch, nothing is carried over between passes.
pub async fn reconcile_bucket(
    store: &dyn BucketStore,
    connector: &dyn StorageConnector,
    name: &str,
) -> Result<Outcome> {
    let Some(mut bucket) = store.fetch(name).await? else {
        debug!("Bucket \"{name}\" is gone");
        return Ok(Outcome::Absent);
    };

    if bucket.meta().deletion_timestamp.is_some() {
        info!("Deleting bucket \"{name}\"");
        let storage = connector.connect().await?;
        storage.delete_bucket(name).await?;

        if finalizer::remove_token(&mut bucket, FINALIZER) {
            store.persist(&bucket).await?;
            info!("Released finalizer of bucket \"{name}\"");
        }
        return Ok(Outcome::Deleted);
    }

    // The token must be stored before the bucket can exist, otherwise a delete
    // racing this pass would remove the resource without ever cleaning up.
    if finalizer::add_token(&mut bucket, FINALIZER) {
        store.persist(&bucket).await?;
        info!("Added finalizer to bucket \"{name}\"");
    }

    let storage = connector.connect().await?;
    storage.create_bucket(name).await?;
    Ok(Outcome::Converged)
}

impl Bucket {
    /// Events are informational, a failed publish never changes the result of a pass
    async fn publish(&self, ctx: &Context, event: Event) {
        if let Err(e) = ctx.recorder.publish(&event, &self.object_ref(&())).await {
            warn!(
                "failed to publish {} event for bucket \"{}\": {e}",
                event.reason,
                self.name_any()
            );
        }
    }

    pub async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let name = self.name_any();
        let buckets: Api<Bucket> = Api::all(ctx.kube_client.clone());
        let deleting = self.meta().deletion_timestamp.is_some();
        let timeout = ctx.settings.reconcile().timeout();

        let pass = reconcile_bucket(&buckets, ctx.connector.as_ref(), &name);
        let outcome = match tokio::time::timeout(timeout, pass).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(timeout)),
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.class() == ErrorClass::Configuration {
                    self.publish(
                        &ctx,
                        Event {
                            type_: EventType::Warning,
                            reason: "CredentialsInvalid".into(),
                            note: Some(err.to_string()),
                            action: if deleting { "Deleting" } else { "Creating" }.into(),
                            secondary: None,
                        },
                    )
                    .await;
                }
                return Err(err);
            }
        };
        ctx.metrics
            .reconcile
            .set_outcome(Bucket::kind(&()).to_string(), outcome);

        match outcome {
            Outcome::Converged => {
                self.publish(
                    &ctx,
                    Event {
                        type_: EventType::Normal,
                        reason: "Ready".into(),
                        note: Some(format!("Bucket `{name}` exists")),
                        action: "Creating".into(),
                        secondary: None,
                    },
                )
                .await
            }
            Outcome::Deleted => {
                self.publish(
                    &ctx,
                    Event {
                        type_: EventType::Normal,
                        reason: "Deleted".into(),
                        note: Some(format!("Deleted bucket `{name}`")),
                        action: "Deleting".into(),
                        secondary: None,
                    },
                )
                .await
            }
            Outcome::Absent => {}
        }

        Ok(outcome.action())
    }
}

#[instrument(skip(ctx, bucket), fields(trace_id))]
async fn reconcile(bucket: Arc<Bucket>, ctx: Arc<Context>) -> Result<Action> {
    let oref = bucket.object_ref(&());

    let trace_id = telemetry::get_trace_id();
    if trace_id != opentelemetry::trace::TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _timer = ctx.metrics.reconcile.count_and_measure(
        oref.api_version.unwrap_or_default(),
        oref.kind.unwrap_or_default(),
        &trace_id,
    );
    ctx.diagnostics.write().await.last_event = Utc::now();

    info!("Reconciling Bucket \"{}\"", bucket.name_any());
    bucket.reconcile(ctx.clone()).await
}

/// Backoff for a failed pass, chosen by what went wrong
pub fn backoff(error: &Error, settings: &crate::settings::Reconcile) -> Duration {
    Duration::from_secs(match error.class() {
        ErrorClass::Transient => settings.transient_backoff_seconds,
        ErrorClass::Conflict => settings.conflict_backoff_seconds,
        ErrorClass::Configuration => settings.configuration_backoff_seconds,
    })
}

fn error_policy(bucket: Arc<Bucket>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    let oref = bucket.object_ref(&());

    ctx.metrics.reconcile.set_failure(
        oref.api_version.unwrap_or_default(),
        oref.kind.unwrap_or_default(),
        bucket.name_any(),
        error,
    );
    Action::requeue(backoff(error, ctx.settings.reconcile()))
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(context: Arc<Context>, kube_client: KubeClient) -> Result<(), Error> {
    let buckets = Api::<Bucket>::all(kube_client.clone());
    if buckets
        .list(&ListParams::default().limit(1))
        .await
        .is_err()
    {
        return Err(Error::MissingCrds);
    }

    info!("Starting controller");

    Controller::new(buckets, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|(obj, _): (ObjectRef<Bucket>, Action)| {
            debug!("Reconciled {obj}");
            futures::future::ready(())
        })
        .await;

    Ok(())
}
