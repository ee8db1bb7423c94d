//! Finalizer token bookkeeping on an in-memory copy of a resource.
//!
//! Nothing here talks to the API server. A mutation only counts once the caller
//! has persisted the object.
use kube::{Resource, ResourceExt};

pub fn has_token<K: Resource>(obj: &K, token: &str) -> bool {
    obj.finalizers().iter().any(|f| f == token)
}

/// Appends `token` unless present. Returns true if the object changed.
pub fn add_token<K: Resource>(obj: &mut K, token: &str) -> bool {
    if has_token(obj, token) {
        return false;
    }
    obj.finalizers_mut().push(token.to_string());
    true
}

/// Removes every occurrence of `token`, keeping the order of the rest.
/// Returns true if the object changed.
pub fn remove_token<K: Resource>(obj: &mut K, token: &str) -> bool {
    if !has_token(obj, token) {
        return false;
    }
    obj.finalizers_mut().retain(|f| f != token);
    true
}
