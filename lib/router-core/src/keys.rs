//! Projection key derivation
//!
//! Keys have the form `<kind>.<namespace>.<name>` with the kind lowercased.
//! Kinds and namespaces never contain `.`, so the first two separators
//! split a key unambiguously and distinct triples always give distinct keys.

use kube::Resource;
use sha2::{Digest, Sha256};

/// Longest key a Secret data entry accepts
pub const MAX_KEY_LEN: usize = 253;

/// Marks a name segment replaced by its digest; `_` never appears in object names
const HASHED_NAME_PREFIX: &str = "_sha256_";

pub fn key_for(kind: &str, namespace: &str, name: &str) -> String {
    let kind = kind.to_ascii_lowercase();
    let key = format!("{}.{}.{}", kind, namespace, name);
    if key.len() <= MAX_KEY_LEN {
        return key;
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{}.{}.{}{}", kind, namespace, HASHED_NAME_PREFIX, digest)
}

/// Key for a cluster object, using its kind, namespace and name
pub fn key_for_object<K: Resource<DynamicType = ()>>(object: &K) -> String {
    let meta = object.meta();
    key_for(
        &K::kind(&()),
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}
