//! Keyword-based interpretation of free-text queries.
//!
//! `interpret` turns text such as "show pods in namespace prod with label
//! app=web" into a read-only `ResourceRequest`. It does no I/O; the caller
//! decides what to run.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Attributes, ResourceKind, ResourceRequest};

static POD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:pods?|po)\b").expect("valid pod pattern"));

static DEPLOYMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:deployments?|deploy)\b").expect("valid deployment pattern")
});

static NAMESPACE_KIND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:namespaces?|ns)\b").expect("valid namespace pattern"));

/// "in namespace X", "namespace X", "-n X", "--namespace=X".
static NAMESPACE_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bin\s+(?:the\s+)?namespace|\bnamespace|(?:^|\s)-n|--namespace)(?:\s+|=)([A-Za-z0-9][A-Za-z0-9_.-]*)")
        .expect("valid namespace argument pattern")
});

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:named|called)\s+([A-Za-z0-9][A-Za-z0-9_.-]*)").expect("valid name pattern")
});

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blabels?\s+([A-Za-z0-9./_-]+=[A-Za-z0-9._-]*)").expect("valid label pattern")
});

/// Interprets a query. Returns `None` when no resource kind is mentioned.
///
/// The request has a name when the query names one (a get), and is a
/// collection request otherwise (a list). Captured names keep their case so
/// that validation can reject them.
pub fn interpret(query: &str, default_namespace: &str) -> Option<ResourceRequest> {
    let kind = detect_kind(query)?;
    let name = capture(&NAME, query);
    let namespace_arg = capture(&NAMESPACE_ARG, query);
    let selector = capture(&LABEL, query);

    let mut request = match kind {
        // "namespace X" names the namespace itself.
        ResourceKind::Namespace => {
            ResourceRequest::namespace(name.or(namespace_arg).unwrap_or_default())
        }
        _ => ResourceRequest::new(
            kind,
            name.unwrap_or_default(),
            namespace_arg.unwrap_or_else(|| default_namespace.to_string()),
        ),
    };

    request.attributes = Attributes {
        label_selector: selector,
        ..Attributes::default()
    };
    Some(request)
}

/// Pods and deployments win over namespaces, which usually only scope them.
/// Between pods and deployments the earliest mention wins.
fn detect_kind(query: &str) -> Option<ResourceKind> {
    let pod = POD.find(query).map(|m| m.start());
    let deployment = DEPLOYMENT.find(query).map(|m| m.start());

    match (pod, deployment) {
        (Some(p), Some(d)) if d < p => Some(ResourceKind::Deployment),
        (Some(_), _) => Some(ResourceKind::Pod),
        (None, Some(_)) => Some(ResourceKind::Deployment),
        (None, None) => NAMESPACE_KIND
            .is_match(query)
            .then_some(ResourceKind::Namespace),
    }
}

fn capture(pattern: &Regex, query: &str) -> Option<String> {
    pattern
        .captures(query)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
