//! Label partitioning and validation
//!
//! Cluster labels are split into system labels (keys under one of the
//! configured prefixes) and user labels (everything else). Tenants only ever
//! see and edit user labels; system labels are written by the cluster manager
//! and preserved verbatim across user edits.

use std::collections::BTreeMap;

use crate::Error;

/// Maximum length of a label name or value
const MAX_LABEL_NAME_LEN: usize = 63;

/// Maximum length of a label key prefix (DNS subdomain)
const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Key prefixes that mark a label as system-owned
pub const DEFAULT_SYSTEM_LABEL_PREFIXES: &[&str] = &[
    "edge-orchestrator.intel.com/",
    "cluster.x-k8s.io/",
    "topology.cluster.x-k8s.io/",
    "prometheusMetricsURL",
    "trusted-compute-compatible",
];

/// Prefixes that classify a label key as system-owned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemLabelPrefixes {
    prefixes: Vec<String>,
}

impl Default for SystemLabelPrefixes {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_LABEL_PREFIXES.iter().map(|p| p.to_string()))
    }
}

impl SystemLabelPrefixes {
    /// Build from an explicit prefix list; empty entries are dropped
    pub fn new(prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    /// The configured prefixes
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// True if `key` is owned by the system
    pub fn is_system(&self, key: &str) -> bool {
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Project the user labels out of a label map
    pub fn user_labels(&self, labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        labels
            .iter()
            .filter(|(k, _)| !self.is_system(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the user labels of `current` with `new_user_labels`
    ///
    /// System labels of `current` are kept verbatim. Entries of
    /// `new_user_labels` with system keys are ignored.
    pub fn replace_user_labels(
        &self,
        current: &BTreeMap<String, String>,
        new_user_labels: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut result: BTreeMap<String, String> = current
            .iter()
            .filter(|(k, _)| self.is_system(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in new_user_labels {
            if !self.is_system(k) {
                result.insert(k.clone(), v.clone());
            }
        }
        result
    }
}

/// Merge label layers; later layers take precedence over earlier ones
pub fn merge_labels<'a>(
    layers: impl IntoIterator<Item = &'a BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for layer in layers {
        for (k, v) in layer {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// Validate a label key (`[prefix/]name`)
pub fn is_valid_label_key(key: &str) -> bool {
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if !is_dns_subdomain(prefix) {
            return false;
        }
    }
    !name.is_empty() && is_qualified_name_part(name)
}

/// Validate a label value (may be empty)
pub fn is_valid_label_value(value: &str) -> bool {
    value.is_empty() || is_qualified_name_part(value)
}

/// Validate every key and value of a label map
pub fn validate_labels(labels: &BTreeMap<String, String>) -> Result<(), Error> {
    for (k, v) in labels {
        if !is_valid_label_key(k) {
            return Err(Error::validation_for_field(
                "metadata.labels",
                format!("invalid label key: {}", k),
            ));
        }
        if !is_valid_label_value(v) {
            return Err(Error::validation_for_field(
                "metadata.labels",
                format!("invalid value for label {}: {}", k, v),
            ));
        }
    }
    Ok(())
}

/// Validate a cluster name: `^[A-Za-z0-9][A-Za-z0-9.-]*[A-Za-z0-9]$`
pub fn is_valid_cluster_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.'))
}

/// `([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]`, at most 63 characters
fn is_qualified_name_part(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_LABEL_NAME_LEN {
        return false;
    }
    let bytes = s.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_alphanumeric();
    edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1])
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Lowercase RFC 1123 subdomain, at most 253 characters
fn is_dns_subdomain(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_LABEL_PREFIX_LEN {
        return false;
    }
    s.split('.').all(|part| {
        let bytes = part.as_bytes();
        !bytes.is_empty()
            && bytes.len() <= MAX_LABEL_NAME_LEN
            && is_lower_alnum(bytes[0])
            && is_lower_alnum(bytes[bytes.len() - 1])
            && bytes.iter().all(|b| is_lower_alnum(*b) || *b == b'-')
    })
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
