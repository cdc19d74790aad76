//! Supporting types shared by the Cluster API resources

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Cluster API condition as reported by the CAPI controllers
///
/// Unlike conditions we author ourselves, CAPI leaves reason, message and
/// even the transition time empty on some conditions, so every field but
/// type and status is optional.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., Ready, ControlPlaneReady)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Severity reported by CAPI for False conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            severity: None,
            reason: Some(reason.into()),
            message: Some(message.into()),
            last_transition_time: Some(Utc::now()),
        }
    }

    /// Transition time in UTC seconds, 0 when unset
    pub fn transition_unix(&self) -> i64 {
        self.last_transition_time
            .map(|t| t.timestamp())
            .unwrap_or_default()
    }

    /// Reason, or the empty string when unset
    pub fn reason_or_empty(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }

    /// Message, or the empty string when unset
    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// Find the first condition of a given type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Reference to another object, as used by CAPI for infrastructure refs
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Kind of the referent
    #[serde(default)]
    pub kind: String,
    /// Name of the referent
    #[serde(default)]
    pub name: String,
    /// Namespace of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// CIDR ranges for a cluster network
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    /// CIDR blocks
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

/// Pod and service networks of a cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetwork {
    /// Pod network ranges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<NetworkRanges>,
    /// Service network ranges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<NetworkRanges>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_condition_deserializes_sparse_capi_fields() {
        let json = r#"{"type":"Ready","status":"True"}"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.type_, "Ready");
        assert_eq!(cond.status, ConditionStatus::True);
        assert!(cond.reason.is_none());
        assert_eq!(cond.transition_unix(), 0);
    }

    #[test]
    fn test_condition_transition_unix() {
        let cond = Condition {
            type_: "Ready".into(),
            status: ConditionStatus::False,
            last_transition_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert_eq!(cond.transition_unix(), 1_704_067_200);
    }

    #[test]
    fn test_find_condition_returns_first_match() {
        let conditions = vec![
            Condition::new("Ready", ConditionStatus::False, "A", "first"),
            Condition::new("Ready", ConditionStatus::True, "B", "second"),
        ];
        let found = find_condition(&conditions, "Ready").unwrap();
        assert_eq!(found.reason_or_empty(), "A");
        assert!(find_condition(&conditions, "Missing").is_none());
    }

    #[test]
    fn test_condition_status_display() {
        assert_eq!(ConditionStatus::True.to_string(), "True");
        assert_eq!(ConditionStatus::Unknown.to_string(), "Unknown");
    }
}
