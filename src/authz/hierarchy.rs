//! Namespace Hierarchy
//!
//! Namespaces are absolute URIs. The hierarchy of a namespace runs from
//! the global root through the scheme+authority node and each cumulative
//! path prefix down to the namespace itself.

use crate::error::{Result, SecurityError};
use url::Url;

/// The ancestor chain of `namespace`, least specific first.
///
/// The first key is always `None` (the global root); the rest are
/// namespace URIs of increasing specificity ending at the namespace's
/// own node. A namespace must carry a scheme, an authority, and at least
/// one non-empty path segment.
pub fn hierarchy_keys(namespace: &str) -> Result<Vec<Option<String>>> {
    let url = Url::parse(namespace).map_err(|e| SecurityError::InvalidNamespace {
        uri: namespace.to_string(),
        reason: e.to_string(),
    })?;

    if !url.has_authority() || url.host_str().is_none() {
        return Err(SecurityError::InvalidNamespace {
            uri: namespace.to_string(),
            reason: "missing authority".to_string(),
        });
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.is_empty() {
        return Err(SecurityError::InvalidNamespace {
            uri: namespace.to_string(),
            reason: "no path segments".to_string(),
        });
    }

    let mut authority = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        authority.push_str(&format!(":{port}"));
    }

    let mut keys = Vec::with_capacity(segments.len() + 2);
    keys.push(None);
    keys.push(Some(authority.clone()));

    let mut current = authority;
    for segment in segments {
        current.push('/');
        current.push_str(segment);
        keys.push(Some(current.clone()));
    }
    Ok(keys)
}
