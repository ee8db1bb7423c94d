use crate::{
    Error, State,
    credentials::CredentialResolver,
    gateway::{SeaweedFsConnector, StorageConnector},
    resources,
};
use kube::client::Client;
use std::sync::Arc;

pub static FINALIZER: &str = "objectstorage.mystorage.sh/finalizer";

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State) -> Result<(), Error> {
    let kube_client = Client::try_default().await.map_err(Error::KubeError)?;

    let connector: Arc<dyn StorageConnector> = Arc::new(SeaweedFsConnector::new(
        CredentialResolver::new(kube_client.clone(), state.settings().credentials().clone()),
        state.settings().storage().clone(),
    ));

    resources::objectstorage::bucket::run(
        state.to_context(kube_client.clone(), connector).await,
        kube_client,
    )
    .await
}
