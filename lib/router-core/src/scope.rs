//! Decides whether an Ingress belongs to this controller

use router_api::INGRESS_CLASS_ANNOTATION;
use std::collections::BTreeMap;

pub fn is_managed(annotations: Option<&BTreeMap<String, String>>, ingress_class: &str) -> bool {
    annotations
        .and_then(|annotations| annotations.get(INGRESS_CLASS_ANNOTATION))
        .map(|class| class.trim() == ingress_class)
        .unwrap_or(false)
}
