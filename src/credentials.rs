use crate::settings;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, client::Client as KubeClient};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::*;

pub static ACCESS_KEY_FIELD: &str = "admin_access_key_id";
pub static SECRET_KEY_FIELD: &str = "admin_secret_access_key";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("secret {namespace}/{name} not found")]
    MissingSecret { namespace: String, name: String },

    #[error("secret {secret} has no field {field}")]
    MissingField { secret: String, field: String },

    #[error("field {field} of secret {secret} is not valid utf-8")]
    InvalidField { secret: String, field: String },

    #[error("malformed s3 config in secret {secret}: {source}")]
    MalformedDocument {
        secret: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("identity {0} not present in s3 config")]
    MissingIdentity(String),

    #[error("identity {0} has no credentials")]
    EmptyIdentity(String),
}

impl Error {
    /// Everything except a failed API call is a problem with the secret itself
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::KubeError(_))
    }
}

/// Administrative access to the object storage backend
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityCredentials {
    access_key: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct Identity {
    name: String,
    #[serde(default)]
    credentials: Vec<IdentityCredentials>,
}

#[derive(Deserialize)]
struct S3Config {
    #[serde(default)]
    identities: Vec<Identity>,
}

impl Credentials {
    /// Extract credentials from either the flat or the structured secret layout.
    ///
    /// The flat layout is used whenever `admin_access_key_id` is present.
    pub fn from_secret(secret: &Secret, settings: &settings::Credentials) -> Result<Self, Error> {
        let secret_name = settings.secret.clone();
        let field = |key: &str| -> Result<Option<String>, Error> {
            let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) else {
                return Ok(None);
            };
            String::from_utf8(value.0.clone())
                .map(Some)
                .map_err(|_| Error::InvalidField {
                    secret: secret_name.clone(),
                    field: key.to_string(),
                })
        };

        if let Some(access_key) = field(ACCESS_KEY_FIELD)? {
            let secret_key = field(SECRET_KEY_FIELD)?.ok_or_else(|| Error::MissingField {
                secret: secret_name.clone(),
                field: SECRET_KEY_FIELD.to_string(),
            })?;
            return Ok(Credentials {
                access_key,
                secret_key,
            });
        }

        let Some(document) = secret
            .data
            .as_ref()
            .and_then(|d| d.get(&settings.config_key))
        else {
            return Err(Error::MissingField {
                secret: secret_name,
                field: format!("{ACCESS_KEY_FIELD} or {}", settings.config_key),
            });
        };

        let config: S3Config =
            serde_json::from_slice(&document.0).map_err(|source| Error::MalformedDocument {
                secret: secret_name,
                source,
            })?;

        config
            .identities
            .into_iter()
            .find(|identity| identity.name == settings.admin_identity)
            .ok_or_else(|| Error::MissingIdentity(settings.admin_identity.clone()))?
            .credentials
            .into_iter()
            .next()
            .map(|c| Credentials {
                access_key: c.access_key,
                secret_key: c.secret_key,
            })
            .ok_or_else(|| Error::EmptyIdentity(settings.admin_identity.clone()))
    }
}

/// Reads the backend credentials from their fixed secret location
#[derive(Clone)]
pub struct CredentialResolver {
    secrets: Api<Secret>,
    settings: settings::Credentials,
}

impl CredentialResolver {
    pub fn new(kube_client: KubeClient, settings: settings::Credentials) -> Self {
        CredentialResolver {
            secrets: Api::namespaced(kube_client, &settings.namespace),
            settings,
        }
    }

    pub async fn resolve(&self) -> Result<Credentials, Error> {
        let secret = self
            .secrets
            .get_opt(&self.settings.secret)
            .await
            .map_err(Error::KubeError)?
            .ok_or_else(|| Error::MissingSecret {
                namespace: self.settings.namespace.clone(),
                name: self.settings.secret.clone(),
            })?;

        let credentials = Credentials::from_secret(&secret, &self.settings)?;
        debug!(
            "Resolved credentials from secret {}/{}",
            self.settings.namespace, self.settings.secret
        );
        Ok(credentials)
    }
}
